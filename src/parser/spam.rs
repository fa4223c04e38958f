//! Vendor anti-spam headers reduced to a single score.

use tracing::warn;

use crate::parser::header::RawHeaderMap;

/// Header the serializer writes the score back to.
pub const GMX_SPAM_HEADER: &str = "X-GMX-Antispam";

/// A known anti-spam header and how to read a score from its value.
struct Convention {
    header: &'static str,
    score: fn(&str) -> u32,
}

const CONVENTIONS: &[Convention] = &[
    Convention {
        header: GMX_SPAM_HEADER,
        score: leading_score,
    },
    Convention {
        header: "X-Watney-Antispam",
        score: leading_score,
    },
    Convention {
        header: "X-Spam-Level",
        score: star_score,
    },
];

/// Highest score among all recognized spam headers (0 = not spam).
pub fn parse_spam_score(headers: &RawHeaderMap) -> u32 {
    CONVENTIONS
        .iter()
        .filter_map(|c| headers.first(c.header).map(|value| (c.score)(value)))
        .max()
        .unwrap_or(0)
}

/// Score of a value starting with an integer token, e.g.
/// `"6 (nemesis text pattern profiler); Detail=V3;"`.
///
/// Negative scores count as 0.
pub fn leading_score(value: &str) -> u32 {
    let token = value.split_whitespace().next().unwrap_or("");
    match token.parse::<i64>() {
        Ok(score) => u32::try_from(score.max(0)).unwrap_or(u32::MAX),
        Err(e) => {
            warn!(value, error = %e, "Unreadable spam score, assuming 0");
            0
        }
    }
}

/// SpamAssassin style: one `*` per point.
fn star_score(value: &str) -> u32 {
    value.trim().chars().take_while(|&c| c == '*').count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(text: &str) -> RawHeaderMap {
        RawHeaderMap::from_text(text)
    }

    #[test]
    fn test_gmx_split_tokens() {
        let spam = ["6", "(nemesis text pattern profiler);", "Detail=V3;"];
        assert_eq!(leading_score(&spam.join(" ")), 6);
        let ham = ["0", "(Mail was not recognized as spam);", "Detail=V3;"];
        assert_eq!(leading_score(&ham.join(" ")), 0);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let h = headers("X-Gmx-Antispam: 6 (nemesis text pattern profiler); Detail=V3;\n");
        assert_eq!(parse_spam_score(&h), 6);
    }

    #[test]
    fn test_unparseable_score_is_zero() {
        let h = headers("X-GMX-Antispam: high (looks bad)\n");
        assert_eq!(parse_spam_score(&h), 0);
    }

    #[test]
    fn test_negative_score_clamps() {
        assert_eq!(leading_score("-3 (whitelisted)"), 0);
    }

    #[test]
    fn test_maximum_of_conventions() {
        let h = headers("X-GMX-Antispam: 2 (x)\nX-Spam-Level: *****\nX-Watney-Antispam: 4\n");
        assert_eq!(parse_spam_score(&h), 5);
    }

    #[test]
    fn test_no_spam_headers() {
        assert_eq!(parse_spam_score(&headers("Subject: Hi\n")), 0);
    }
}

//! RFC 5322 header parsing: tokenizing with folding, encoded-words (RFC 2047),
//! and date parsing.

use base64::Engine as _;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use crate::error::{MailError, Result};
use crate::model::header::Header;
use crate::parser::{mime, spam, BASE64_LENIENT};

/// Ordered mapping from lower-cased field name to the raw values of that field.
///
/// A field may repeat (`Received`), so every name maps to a list. Fields keep
/// the order of their first appearance. A missing name means the field was
/// absent; values are never synthesized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawHeaderMap {
    fields: Vec<(String, Vec<String>)>,
}

impl RawHeaderMap {
    /// Build a map from header text, skipping lines it cannot interpret.
    ///
    /// Reading stops at the first empty line. Empty text gives an empty map.
    pub fn from_text(text: &str) -> Self {
        let mut map = Self::default();
        for (name, value) in unfold_headers(text) {
            map.push(name, value);
        }
        map
    }

    fn push(&mut self, name: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((name, vec![value])),
        }
    }

    /// All raw values of a field (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// The first raw value of a field (case-insensitive).
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of distinct field names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, values)` in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Split a raw header block into a [`RawHeaderMap`].
///
/// Fails only when the block is empty.
pub fn tokenize(raw_headers: &[u8]) -> Result<RawHeaderMap> {
    if raw_headers.is_empty() {
        return Err(MailError::EmptyHeader);
    }
    Ok(RawHeaderMap::from_text(&decode_raw_text(raw_headers)))
}

/// Parse a raw header block into a [`Header`].
///
/// `size` and `folder` are left empty; they are not part of the header text.
pub fn parse_header(raw_headers: &[u8]) -> Result<Header> {
    let headers = tokenize(raw_headers)?;
    Ok(parse_header_map(&headers))
}

/// Interpret a tokenized header.
///
/// Never fails: every field that cannot be read falls back to its default.
pub fn parse_header_map(headers: &RawHeaderMap) -> Header {
    Header {
        size: 0,
        folder: String::new(),
        date: parse_date_header(headers),
        subject: decode_field(headers, "subject"),
        sender: decode_field(headers, "from"),
        receiver: decode_field(headers, "to"),
        spam_indicator: spam::parse_spam_score(headers),
        mime: mime::parse_mime_metadata(headers),
    }
}

/// Decode the first value of a display field such as `Subject`, `From` or `To`.
///
/// An absent field yields an empty string.
pub fn decode_field(headers: &RawHeaderMap, name: &str) -> String {
    match headers.first(name) {
        Some(value) => decode_encoded_words(value.strip_prefix(' ').unwrap_or(value)),
        None => String::new(),
    }
}

/// Resolve the `Date` field, falling back to the Unix epoch.
pub fn parse_date_header(headers: &RawHeaderMap) -> DateTime<Utc> {
    headers
        .first("date")
        .and_then(parse_date)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Decode raw header or body bytes to a string, dropping a UTF-8 BOM.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub(crate) fn decode_raw_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs, ending at the first empty line.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                let continuation = line.trim();
                if !continuation.is_empty() {
                    if !last.1.is_empty() {
                        last.1.push(' ');
                    }
                    last.1.push_str(continuation);
                }
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text of that token is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded words is not part of the text (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => BASE64_LENIENT.decode(encoded_text.trim()).ok()?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some(DecodedWord {
        text: decode_charset(charset, &bytes)?,
        consumed: total_consumed,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
///
/// Returns `None` for charsets `encoding_rs` does not know, so the caller keeps
/// the encoded word as it was.
pub(crate) fn decode_charset(charset: &str, bytes: &[u8]) -> Option<String> {
    // RFC 2231 language suffix: "utf-8*en"
    let label = charset.split('*').next().unwrap_or(charset).trim();
    match label.to_lowercase().as_str() {
        "utf-8" | "utf8" => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(encoding) => {
                let (decoded, _, _) = encoding.decode(bytes);
                Some(decoded.into_owned())
            }
            None => {
                warn!(charset = label, "Unknown charset, keeping encoded text");
                None
            }
        },
    }
}

/// Date layouts tried in order once the weekday has been removed.
///
/// Two-digit-year layouts precede the four-digit ones: `%Y` would also
/// accept "13" as the year 13.
const DATE_FORMATS: &[&str] = &[
    "%d %b %y %H:%M:%S %z",
    "%d %b %y %H:%M %z",
    // RFC 1123 with numeric zone
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    // IMAP INTERNALDATE
    "%d-%b-%Y %H:%M:%S %z",
];

/// Parse an email date string.
///
/// Grammars are tried in a fixed order and the first match wins: RFC 1123
/// with numeric zone, the same with a trailing `(CET)` style comment, IMAP
/// internal dates, named zones, and finally RFC 2822/3339, zone-less dates
/// (taken as UTC) and `mail-parser`'s lenient parser.
///
/// The weekday name is ignored, a mismatch with the date does not reject it.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    let no_dow = strip_day_of_week(trimmed);
    let no_comment = strip_zone_comment(&no_dow);

    for candidate in [no_dow.as_str(), no_comment] {
        for fmt in DATE_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }
    }

    // Replace named timezones with offsets and try again
    let replaced = replace_named_tz(no_comment);
    for fmt in DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%d %b %Y %H:%M:%S", "%d-%b-%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(no_comment, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parser = MessageParser::default();
    let parsed = parser.parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            if let Some(rest) = rest.strip_prefix(',').or_else(|| rest.strip_prefix(' ')) {
                return rest.trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Remove a trailing parenthesized comment such as `(CET)`.
fn strip_zone_comment(s: &str) -> &str {
    if s.ends_with(')') {
        if let Some(open) = s.rfind('(') {
            return s[..open].trim_end();
        }
    }
    s
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(&format!(" {name}")) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}

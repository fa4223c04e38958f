//! Header serialization for composed and re-appended messages.

use base64::Engine as _;

use crate::model::content::{DEFAULT_CHARSET, PLAIN_TEXT};
use crate::model::header::{Header, MimeMetadata, DEFAULT_TRANSFER_ENCODING};
use crate::parser::spam::GMX_SPAM_HEADER;

/// RFC 1123 date with numeric zone, e.g. `Wed, 06 Mar 2013 01:05:26 +0000`.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Render a [`Header`] as protocol header text (CRLF line endings, no
/// trailing line break).
///
/// MIME fields come first and only for MIME mail (`mime_version > 0`). The
/// boundary is written on a folded continuation line for multipart types,
/// the charset only for `text/plain`. `Content-Transfer-Encoding` is left out
/// when it is the default, and multipart types only carry an identity
/// encoding. Non-ASCII text is written as UTF-8 encoded words; in `To` and
/// `From` only the display names are encoded.
///
/// Parsing the result gives back the same subject, sender, receiver, date,
/// spam indicator and MIME descriptor.
pub fn serialize_header(header: &Header) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mime = &header.mime;

    if mime.mime_version > 0.0 {
        lines.push(format!("MIME-Version: {:.1}", mime.mime_version));
        if !mime.content_type.is_empty() {
            let mut content_type = format!("Content-Type: {};", mime.content_type);
            if mime.is_multipart() {
                content_type.push_str(&format!(
                    "\r\n\tboundary={}",
                    quote(&mime.multipart_boundary)
                ));
            } else if mime.content_type == PLAIN_TEXT {
                content_type.push_str(&format!(" charset={}", quote(DEFAULT_CHARSET)));
            }
            lines.push(content_type);
        }
        if let Some(encoding) = transfer_encoding_field(&header.mime) {
            lines.push(format!("Content-Transfer-Encoding: {encoding}"));
        }
    }

    lines.push(format!("Date: {}", header.date.format(DATE_FORMAT)));
    lines.push(format!("To: {}", encode_addresses(&header.receiver)));
    lines.push(format!("From: {}", encode_addresses(&header.sender)));
    lines.push(format!("Subject: {}", encode_text(&one_line(&header.subject))));
    lines.push(format!("{GMX_SPAM_HEADER}: {}", header.spam_indicator));

    lines.join("\r\n").trim().to_string()
}

/// Quote a parameter value, escaping backslashes and quotes.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in one_line(value).chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Replace line breaks so a value cannot start a new header field.
fn one_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Transfer encoding worth writing, `None` for the default.
fn transfer_encoding_field(mime: &MimeMetadata) -> Option<String> {
    let encoding = one_line(mime.transfer_encoding.trim());
    if encoding.is_empty() || encoding.eq_ignore_ascii_case(DEFAULT_TRANSFER_ENCODING) {
        return None;
    }
    // RFC 2045 6.4: multipart entities only take identity encodings
    let identity = ["7bit", "8bit", "binary"]
        .iter()
        .any(|e| encoding.eq_ignore_ascii_case(e));
    if mime.is_multipart() && !identity {
        return None;
    }
    Some(encoding)
}

/// Longest chunk of UTF-8 put into one encoded word (60 base64 characters).
const WORD_CHUNK: usize = 45;

/// Text as-is when ASCII, else as UTF-8 `B` encoded words of at most 75
/// characters separated by spaces.
fn encode_text(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    let mut words = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = rest.len().min(WORD_CHUNK);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        words.push(format!(
            "=?UTF-8?B?{}?=",
            base64::engine::general_purpose::STANDARD.encode(&rest.as_bytes()[..end])
        ));
        rest = &rest[end..];
    }
    words.join(" ")
}

/// Encode the display names of an address list, leaving the addresses ASCII.
fn encode_addresses(value: &str) -> String {
    let value = one_line(value);
    if value.is_ascii() {
        return value;
    }
    split_addresses(&value)
        .into_iter()
        .map(|mailbox| encode_mailbox(mailbox.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn encode_mailbox(mailbox: &str) -> String {
    match mailbox.rfind('<') {
        Some(open) if mailbox.ends_with('>') => {
            let phrase = mailbox[..open].trim();
            let address = &mailbox[open..];
            if phrase.is_empty() {
                address.to_string()
            } else if phrase.is_ascii() {
                format!("{phrase} {address}")
            } else {
                format!("{} {address}", encode_text(phrase.trim_matches('"')))
            }
        }
        _ => encode_text(mailbox),
    }
}

/// Split on commas outside quoted strings and angle brackets.
fn split_addresses(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

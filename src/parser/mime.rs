//! MIME handling: metadata from `Content-*` fields, multipart decomposition,
//! and transfer-encoding decoding of content parts.

use base64::Engine as _;
use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::error::{MailError, Result};
use crate::model::content::{Content, ContentPart, DEFAULT_CHARSET, PLAIN_TEXT};
use crate::model::header::{MimeMetadata, DEFAULT_TRANSFER_ENCODING};
use crate::parser::eml::split_message;
use crate::parser::header::{decode_charset, decode_raw_text, RawHeaderMap};
use crate::parser::BASE64_LENIENT;

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
pub const MAX_DEPTH: usize = 10;

/// Options for body decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Multipart levels that are descended into; deeper parts are skipped.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
        }
    }
}

impl From<&ParserConfig> for ParseOptions {
    fn from(config: &ParserConfig) -> Self {
        Self {
            max_depth: config.max_multipart_depth,
        }
    }
}

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lower-cased `type/subtype`.
    pub essence: String,
    /// Parameters with lower-cased names, in order of appearance.
    pub params: Vec<(String, String)>,
}

impl MediaType {
    /// Value of a parameter (name is case-insensitive).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.essence.contains("multipart")
    }
}

/// Parse a `Content-Type` value such as `multipart/mixed; boundary="B1"`.
pub fn parse_media_type(value: &str) -> Result<MediaType> {
    let (essence, rest) = match value.find(';') {
        Some(pos) => (&value[..pos], &value[pos..]),
        None => (value, ""),
    };
    let essence = essence.trim().to_lowercase();

    let (main, sub) = essence
        .split_once('/')
        .ok_or_else(|| MailError::media_type(value, "missing '/'"))?;
    if !is_token(main) || !is_token(sub) {
        return Err(MailError::media_type(value, "invalid type or subtype"));
    }

    Ok(MediaType {
        params: parse_params(rest, value)?,
        essence,
    })
}

fn parse_params(mut rest: &str, value: &str) -> Result<Vec<(String, String)>> {
    let mut params: Vec<(String, String)> = Vec::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }

        let eq = rest
            .find('=')
            .ok_or_else(|| MailError::media_type(value, "parameter without value"))?;
        let name = rest[..eq].trim().to_lowercase();
        if !is_token(&name) {
            return Err(MailError::media_type(value, "invalid parameter name"));
        }
        rest = rest[eq + 1..].trim_start();

        let param_value = if let Some(quoted) = rest.strip_prefix('"') {
            let (unquoted, tail) = parse_quoted(quoted)
                .ok_or_else(|| MailError::media_type(value, "unterminated quoted string"))?;
            rest = &tail[tail.find(';').unwrap_or(tail.len())..];
            unquoted
        } else {
            let end = rest.find(';').unwrap_or(rest.len());
            let token = rest[..end].trim().to_string();
            rest = &rest[end..];
            token
        };

        if !params.iter().any(|(k, _)| *k == name) {
            params.push((name, param_value));
        }
    }
    Ok(params)
}

/// Read a quoted string whose opening quote was already consumed.
///
/// Returns the unescaped text and the input following the closing quote.
fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &s[i + 1..])),
            '\\' => out.push(chars.next()?.1),
            c => out.push(c),
        }
    }
    None
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c))
}

/// Interpret the `Content-Type`, `Content-Transfer-Encoding` and
/// `MIME-Version` fields of a header.
///
/// Never fails: malformed fields degrade to their defaults with a warning.
pub fn parse_mime_metadata(headers: &RawHeaderMap) -> MimeMetadata {
    read_mime(headers).0
}

/// Like [`parse_mime_metadata`], also returning the parsed media type for
/// access to parameters other than the boundary.
fn read_mime(headers: &RawHeaderMap) -> (MimeMetadata, Option<MediaType>) {
    let mut meta = MimeMetadata::default();
    let mut media = None;

    if let Some(value) = headers.first("content-type") {
        match parse_media_type(value) {
            Ok(parsed) => {
                if parsed.is_multipart() {
                    meta.multipart_boundary = parsed.param("boundary").unwrap_or("").to_string();
                }
                meta.content_type = parsed.essence.clone();
                media = Some(parsed);
            }
            Err(e) => warn!(error = %e, "Failed to parse the media type of mail"),
        }
    }

    if let Some(value) = headers.first("content-transfer-encoding") {
        meta.transfer_encoding = value.trim().to_string();
    }

    if let Some(value) = headers.first("mime-version") {
        meta.mime_version = parse_mime_version(value);
    }

    (meta, media)
}

/// Parse a `MIME-Version` value; a trailing comment like `1.0 (produced by X)` is ignored.
fn parse_mime_version(value: &str) -> f32 {
    let number = value.split('(').next().unwrap_or("").trim();
    match number.parse::<f32>() {
        Ok(version) if version.is_finite() && version >= 0.0 => version,
        _ => {
            warn!(value, "Failed to parse the MIME version of mail, assuming non-MIME");
            0.0
        }
    }
}

/// Decompose a raw body into content parts keyed by media type.
///
/// Fails only when no body was supplied.
pub fn parse_content(body: Option<&str>, mime: &MimeMetadata) -> Result<Content> {
    parse_content_with(body.map(str::as_bytes), mime, &ParseOptions::default())
}

/// [`parse_content`] on raw body bytes with explicit options.
///
/// Multipart bodies are split before any text decoding, so every leaf part
/// is converted with its own `charset` parameter.
pub fn parse_content_with(
    body: Option<&[u8]>,
    mime: &MimeMetadata,
    options: &ParseOptions,
) -> Result<Content> {
    let body = body.ok_or(MailError::MissingBody)?;
    let mut parts = Content::new();

    // Non-MIME mail is taken to be plain text
    if mime.mime_version == 0.0 {
        parts.insert(
            PLAIN_TEXT.to_string(),
            ContentPart::new(DEFAULT_TRANSFER_ENCODING, decode_raw_text(body)),
        );
        return Ok(parts);
    }

    if !mime.is_multipart() {
        let media_type = if mime.content_type.is_empty() {
            PLAIN_TEXT
        } else {
            &mime.content_type
        };
        parts.insert(
            media_type.to_string(),
            ContentPart::new(mime.transfer_encoding.clone(), decode_raw_text(body)),
        );
        return Ok(parts);
    }

    if mime.multipart_boundary.is_empty() {
        warn!(
            content_type = %mime.content_type,
            "Multipart mail without boundary, treating body as plain text"
        );
        parts.insert(
            PLAIN_TEXT.to_string(),
            ContentPart::new(mime.transfer_encoding.clone(), decode_raw_text(body)),
        );
        return Ok(parts);
    }

    Ok(parse_multipart_content(
        body,
        &mime.multipart_boundary,
        options,
    ))
}

/// Split a multipart body on `boundary` and flatten all parts, including
/// those of nested multiparts, into one [`Content`].
///
/// Parts that cannot be read are skipped with a warning.
pub fn parse_multipart_content(body: &[u8], boundary: &str, options: &ParseOptions) -> Content {
    let mut content = Content::new();
    collect_parts(body, boundary, 1, options, &mut content);
    content
}

fn collect_parts(
    body: &[u8],
    boundary: &str,
    depth: usize,
    options: &ParseOptions,
    content: &mut Content,
) {
    for raw_part in split_multipart(body, boundary) {
        let Some((head, part_body)) = split_part(raw_part) else {
            warn!(boundary, "Couldn't parse multipart part header, skipping part");
            continue;
        };

        let headers = RawHeaderMap::from_text(&head);
        let (meta, media) = read_mime(&headers);

        if meta.content_type.is_empty() {
            // Overwrites any earlier text/plain part
            debug!("Multipart part without content type, filing as text/plain");
            content.insert(
                PLAIN_TEXT.to_string(),
                ContentPart::new(meta.transfer_encoding, decode_raw_text(part_body)),
            );
        } else if meta.is_multipart() {
            if depth >= options.max_depth {
                warn!(depth, "Multipart nesting too deep, skipping part");
                continue;
            }
            if meta.multipart_boundary.is_empty() {
                warn!(content_type = %meta.content_type, "Inner multipart without boundary, skipping part");
                continue;
            }
            collect_parts(
                part_body,
                &meta.multipart_boundary,
                depth + 1,
                options,
                content,
            );
        } else {
            let declared = media
                .as_ref()
                .and_then(|m| m.param("charset"))
                .filter(|c| !c.is_empty());
            let body = declared
                .and_then(|charset| decode_charset(charset, part_body))
                .unwrap_or_else(|| decode_raw_text(part_body));
            content.insert(
                meta.content_type,
                ContentPart {
                    charset: declared.unwrap_or(DEFAULT_CHARSET).to_string(),
                    encoding: meta.transfer_encoding,
                    body,
                },
            );
        }
    }
}

/// Cut a multipart body into the raw bytes of its parts.
///
/// The preamble before the first delimiter and the epilogue after the closing
/// delimiter are dropped. The line break in front of a delimiter belongs to
/// the delimiter. A final part without closing delimiter is skipped.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let line_start = offset;
        offset += line.len();

        let Some(rest) = line.trim_ascii_end().strip_prefix(delimiter.as_bytes()) else {
            continue;
        };
        let closing = rest == b"--";
        if !rest.is_empty() && !closing {
            continue;
        }

        if let Some(start) = part_start.take() {
            parts.push(strip_line_break(&body[start..line_start]));
        }
        if closing {
            return parts;
        }
        part_start = Some(offset);
    }

    if part_start.is_some() {
        warn!(boundary, "Multipart body ended without closing boundary, skipping last part");
    }
    parts
}

fn strip_line_break(s: &[u8]) -> &[u8] {
    s.strip_suffix(b"\r\n")
        .or_else(|| s.strip_suffix(b"\n"))
        .unwrap_or(s)
}

/// Separate the header block of a part from its body.
///
/// A part without blank line is all header with an empty body, provided
/// every line is a header field.
fn split_part(raw: &[u8]) -> Option<(String, &[u8])> {
    if raw.is_empty() {
        return None;
    }
    // No headers: the part starts with the blank line
    if let Some(body) = raw.strip_prefix(b"\r\n").or_else(|| raw.strip_prefix(b"\n")) {
        return Some((String::new(), body));
    }
    match split_message(raw) {
        (head, Some(body)) => Some((decode_raw_text(head), body)),
        (head, None) => {
            let head = decode_raw_text(head);
            let all_fields = head.lines().all(is_header_line);
            all_fields.then_some((head, &raw[raw.len()..]))
        }
    }
}

fn is_header_line(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with([' ', '\t'])
        || line
            .split_once(':')
            .is_some_and(|(name, _)| is_token(name.trim_end()))
}

/// Decode the transfer encoding of every part into UTF-8 display text.
///
/// Quoted-printable parts and base64 `text/*` parts are decoded and converted
/// from their charset; decoded parts are labelled `8bit`/`UTF-8`. Everything
/// else is returned unchanged.
pub fn decode_content(content: &Content) -> Content {
    content
        .iter()
        .map(|(media_type, part)| (media_type.clone(), decode_part(media_type, part)))
        .collect()
}

fn decode_part(media_type: &str, part: &ContentPart) -> ContentPart {
    let decoded = match part.encoding.trim().to_ascii_lowercase().as_str() {
        "quoted-printable" => {
            quoted_printable::decode(part.body.as_bytes(), quoted_printable::ParseMode::Robust)
                .map_err(|e| e.to_string())
        }
        "base64" if media_type.starts_with("text/") => {
            let compact: String = part.body.split_whitespace().collect();
            BASE64_LENIENT.decode(compact).map_err(|e| e.to_string())
        }
        _ => return part.clone(),
    };

    let bytes = match decoded {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(media_type, encoding = %part.encoding, error = %error, "Failed to decode content, keeping it encoded");
            return part.clone();
        }
    };

    let body = decode_charset(&part.charset, &bytes)
        .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());

    ContentPart {
        charset: DEFAULT_CHARSET.to_string(),
        encoding: "8bit".to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(text: &str) -> MimeMetadata {
        parse_mime_metadata(&RawHeaderMap::from_text(text))
    }

    const TWO_PARTS: &str = "------=_Part_414413_206767080.1441196149087
Content-Type: text/plain; charset=\"UTF-8\"
Content-Transfer-Encoding: quoted-printable

Some test text!
------=_Part_414413_206767080.1441196149087
Content-Type: text/html; charset=\"UTF-8\"
Content-Transfer-Encoding: quoted-printable

<b>Some test text!</b>
<br>
------=_Part_414413_206767080.1441196149087--";

    #[test]
    fn test_metadata_multipart() {
        let meta = metadata(
            "MIME-Version: 1.0\nContent-Type: multipart/mixed;\n\tboundary=\"B1\"\n",
        );
        assert_eq!(meta.mime_version, 1.0);
        assert_eq!(meta.content_type, "multipart/mixed");
        assert_eq!(meta.multipart_boundary, "B1");
        assert_eq!(meta.transfer_encoding, "quoted-printable");
    }

    #[test]
    fn test_metadata_boundary_only_for_multipart() {
        let meta = metadata("Content-Type: text/plain; boundary=xyz\n");
        assert_eq!(meta.content_type, "text/plain");
        assert!(meta.multipart_boundary.is_empty());
    }

    #[test]
    fn test_metadata_invalid_mime_version() {
        let meta = metadata("MIME-Version: abc\nContent-Type: text/html\n");
        assert_eq!(meta.mime_version, 0.0);
        assert_eq!(meta.content_type, "text/html");
    }

    #[test]
    fn test_metadata_mime_version_with_comment() {
        assert_eq!(metadata("Mime-Version: 1.0 (1.0)\n").mime_version, 1.0);
    }

    #[test]
    fn test_metadata_bad_content_type() {
        let meta = metadata("Content-Type: garbage\nContent-Transfer-Encoding:  base64 \n");
        assert!(meta.content_type.is_empty());
        assert_eq!(meta.transfer_encoding, "base64");
    }

    #[test]
    fn test_parse_media_type_params() {
        let media = parse_media_type("Text/Plain; Charset=\"ISO-8859-1\"; format=flowed;").unwrap();
        assert_eq!(media.essence, "text/plain");
        assert_eq!(media.param("charset"), Some("ISO-8859-1"));
        assert_eq!(media.param("FORMAT"), Some("flowed"));
    }

    #[test]
    fn test_parse_media_type_escaped_quote() {
        let media = parse_media_type(r#"multipart/mixed; boundary="a\"b""#).unwrap();
        assert_eq!(media.param("boundary"), Some("a\"b"));
    }

    #[test]
    fn test_parse_media_type_errors() {
        assert!(parse_media_type("text").is_err());
        assert!(parse_media_type("text/plain; charset").is_err());
        assert!(parse_media_type("multipart/mixed; boundary=\"open").is_err());
    }

    #[test]
    fn test_two_part_body() {
        let content = parse_multipart_content(
            TWO_PARTS.as_bytes(),
            "----=_Part_414413_206767080.1441196149087",
            &ParseOptions::default(),
        );
        assert_eq!(content.len(), 2);
        assert_eq!(
            content["text/plain"],
            ContentPart::new("quoted-printable", "Some test text!")
        );
        assert_eq!(
            content["text/html"],
            ContentPart::new("quoted-printable", "<b>Some test text!</b>\n<br>")
        );
    }

    #[test]
    fn test_base64_part_keeps_encoding() {
        let body = "----==_mimepart_55e5934148e33_35c43fd168003a1018622b
Content-Type: text/plain;
 charset=UTF-8
Content-Transfer-Encoding: base64

T3VyIG5ldyBLaWNrc3RhcnRlciBpcyBMSVZFISAKClRoZSBLaWNrc3RhcnR=
----==_mimepart_55e5934148e33_35c43fd168003a1018622b--";
        let content = parse_multipart_content(
            body.as_bytes(),
            "--==_mimepart_55e5934148e33_35c43fd168003a1018622b",
            &ParseOptions::default(),
        );
        assert_eq!(content.len(), 1);
        assert_eq!(
            content["text/plain"],
            ContentPart::new(
                "base64",
                "T3VyIG5ldyBLaWNrc3RhcnRlciBpcyBMSVZFISAKClRoZSBLaWNrc3RhcnR="
            )
        );
    }

    #[test]
    fn test_nested_multipart_flattens_and_overwrites() {
        let body = "preamble\r\n--outer\r\n\r\nfirst unlabeled\r\n--outer\r\nContent-Type: multipart/alternative; boundary=inner\r\n\r\n--inner\r\nContent-Type: text/plain\r\n\r\ninner plain\r\n--inner\r\nContent-Type: text/html; charset=ISO-8859-1\r\n\r\n<p>inner</p>\r\n--inner--\r\n--outer--\r\nepilogue";
        let content = parse_multipart_content(body.as_bytes(), "outer", &ParseOptions::default());
        assert_eq!(content.len(), 2);
        assert_eq!(content["text/plain"].body, "inner plain");
        assert_eq!(content["text/html"].charset, "ISO-8859-1");
        assert_eq!(content["text/html"].body, "<p>inner</p>");
    }

    #[test]
    fn test_depth_limit_skips_inner_parts() {
        let body = "--outer\nContent-Type: multipart/alternative; boundary=inner\n\n--inner\nContent-Type: text/html\n\n<p>deep</p>\n--inner--\n--outer\nContent-Type: text/plain\n\nshallow\n--outer--\n";
        let content = parse_multipart_content(body.as_bytes(), "outer", &ParseOptions { max_depth: 1 });
        assert_eq!(content.len(), 1);
        assert_eq!(content["text/plain"].body, "shallow");
    }

    #[test]
    fn test_malformed_parts_are_skipped() {
        let body = "--b\nContent-Type: text/plain\nno blank line here\n--b\nContent-Type: text/html\n\n<i>ok</i>\n--b\nContent-Type: image/png\n\nunterminated";
        let content = parse_multipart_content(body.as_bytes(), "b", &ParseOptions::default());
        assert_eq!(content.len(), 1);
        assert_eq!(content["text/html"].body, "<i>ok</i>");
    }

    #[test]
    fn test_parse_content_non_mime() {
        let content = parse_content(Some("hello"), &MimeMetadata::default()).unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(
            content["text/plain"],
            ContentPart::new("quoted-printable", "hello")
        );
    }

    #[test]
    fn test_parse_content_single_part() {
        let meta = metadata(
            "MIME-Version: 1.0\nContent-Type: text/html\nContent-Transfer-Encoding: base64\n",
        );
        let content = parse_content(Some("PGI+aGk8L2I+"), &meta).unwrap();
        assert_eq!(content["text/html"], ContentPart::new("base64", "PGI+aGk8L2I+"));
    }

    #[test]
    fn test_parse_content_missing_body() {
        let result = parse_content(None, &MimeMetadata::default());
        assert!(matches!(result, Err(MailError::MissingBody)));
    }

    #[test]
    fn test_header_only_part_has_empty_body() {
        let body = "--b\r\nContent-Type: text/plain\r\n\r\nhi\r\n--b\r\nContent-Type: text/html\r\n\r\n--b--\r\n";
        let content = parse_multipart_content(body.as_bytes(), "b", &ParseOptions::default());
        let keys: Vec<&str> = content.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["text/html", "text/plain"]);
        assert_eq!(content["text/html"].body, "");
        assert_eq!(content["text/plain"].body, "hi");
    }

    #[test]
    fn test_mixed_charset_8bit_parts() {
        let mut body = b"--b\nContent-Type: text/plain; charset=UTF-8\nContent-Transfer-Encoding: 8bit\n\nSch\xc3\xb6n\n".to_vec();
        body.extend_from_slice(b"--b\nContent-Type: text/html; charset=ISO-8859-1\nContent-Transfer-Encoding: 8bit\n\n<p>Gr\xfc\xdfe</p>\n--b--\n");
        let content = parse_multipart_content(&body, "b", &ParseOptions::default());
        assert_eq!(content["text/plain"].body, "Schön");
        assert_eq!(content["text/html"].body, "<p>Grüße</p>");
        assert_eq!(content["text/html"].charset, "ISO-8859-1");
    }

    #[test]
    fn test_decode_quoted_printable() {
        let decode = |body: &str| {
            decode_content(&Content::from([(
                "text/plain".to_string(),
                ContentPart::new("quoted-printable", body),
            )]))["text/plain"]
                .body
                .clone()
        };
        assert_eq!(decode("hello world"), "hello world");
        assert_eq!(decode("caf=C3=A9"), "café");
        assert_eq!(decode("foo=\r\nbar"), "foobar");
        // Soft line break followed by transport padding
        assert_eq!(decode("foo=  \r\nbar"), "foobar");
        assert_eq!(decode("foo=()bar"), "foo=()bar");
    }

    #[test]
    fn test_decode_content() {
        let mut content = Content::new();
        content.insert(
            "text/plain".into(),
            ContentPart {
                charset: "ISO-8859-1".into(),
                encoding: "quoted-printable".into(),
                body: "R=E9sum=E9".into(),
            },
        );
        content.insert(
            "text/html".into(),
            ContentPart::new("base64", "PGI+\r\naGk8L2I+"),
        );
        content.insert("image/png".into(), ContentPart::new("base64", "iVBORw0K"));

        let decoded = decode_content(&content);
        assert_eq!(decoded["text/plain"].body, "Résumé");
        assert_eq!(decoded["text/plain"].encoding, "8bit");
        assert_eq!(decoded["text/plain"].charset, "UTF-8");
        assert_eq!(decoded["text/html"].body, "<b>hi</b>");
        assert_eq!(decoded["image/png"], content["image/png"]);
    }
}

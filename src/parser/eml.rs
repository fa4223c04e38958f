//! Assembly of whole messages: from fetched mailbox records, from raw RFC 5322
//! bytes, and from `.eml` files on disk.

use std::path::Path;

use tracing::debug;

use crate::error::{MailError, Result};
use crate::model::flags::Flags;
use crate::model::mail::{FetchedMessage, Message, RetrievalMode};
use crate::parser::header;
use crate::parser::mime::{self, ParseOptions};

/// Build a [`Message`] from the raw record delivered by the mailbox layer.
///
/// The header is always parsed; the body only in [`RetrievalMode::Full`].
/// A record without header, or without body in full mode, is an error for
/// this message only.
pub fn parse_fetched(
    fetched: &FetchedMessage,
    folder: &str,
    mode: RetrievalMode,
    options: &ParseOptions,
) -> Result<Message> {
    let raw_header = fetched
        .header
        .as_deref()
        .ok_or(MailError::MissingHeader { uid: fetched.uid })?;

    let mut header = header::parse_header(raw_header)?;
    header.size = fetched.size;
    header.folder = folder.to_string();

    let content = match mode {
        RetrievalMode::Overview => None,
        RetrievalMode::Full => {
            Some(mime::parse_content_with(
                fetched.body.as_deref(),
                &header.mime,
                options,
            )?)
        }
    };

    Ok(Message {
        uid: fetched.uid,
        header,
        flags: Flags::from_symbols(&fetched.flags),
        content,
    })
}

/// Parse a complete raw message (header block, blank line, body).
///
/// A message without blank line is all header and gets an empty body.
pub fn parse_message(raw: &[u8], options: &ParseOptions) -> Result<Message> {
    let (raw_header, raw_body) = split_message(raw);

    let mut header = header::parse_header(raw_header)?;
    header.size = u32::try_from(raw.len()).unwrap_or(u32::MAX);

    let body = raw_body.unwrap_or_default();
    let content = mime::parse_content_with(Some(body), &header.mime, options)?;

    Ok(Message {
        uid: 0,
        header,
        flags: Flags::default(),
        content: Some(content),
    })
}

/// Parse a single `.eml` file.
///
/// The folder is left empty and the UID is 0; the size is the file length.
pub fn parse_eml(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Message> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MailError::FileNotFound(path.to_path_buf())
        } else {
            MailError::io(path, e)
        }
    })?;

    debug!(path = %path.display(), bytes = data.len(), "Parsing eml file");
    parse_message(&data, options)
}

/// Split raw message bytes into the header block and the body.
///
/// The body is `None` when there is no blank line.
pub fn split_message(raw: &[u8]) -> (&[u8], Option<&[u8]>) {
    match find_header_end(raw) {
        Some(end) => (&raw[..end], Some(&raw[body_start(raw, end)..])),
        None => (raw, None),
    }
}

fn body_start(data: &[u8], header_end: usize) -> usize {
    if data[header_end] == b'\n' {
        header_end + 2
    } else {
        header_end + 4
    }
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    // Look for \n\n or \r\n\r\n
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(header: Option<&str>, body: Option<&str>) -> FetchedMessage {
        FetchedMessage {
            uid: 42,
            size: 1234,
            header: header.map(|h| h.as_bytes().to_vec()),
            body: body.map(|b| b.as_bytes().to_vec()),
            flags: vec!["\\Seen".to_string(), "\\Flagged".to_string()],
        }
    }

    #[test]
    fn test_find_header_end() {
        // "From: a@b.com\n" = 14 bytes, "Subject: Hi\n" = 12 bytes
        // The \n\n starts at offset 25 (the \n ending "Subject: Hi")
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        assert_eq!(find_header_end(data), Some(25));
    }

    #[test]
    fn test_find_header_end_crlf() {
        // "From: a@b.com\r\n" = 15 bytes, "Subject: Hi\r\n" = 13 bytes
        // The \r\n\r\n starts at offset 26
        let data = b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n";
        assert_eq!(find_header_end(data), Some(26));
    }

    #[test]
    fn test_split_message() {
        let (head, body) = split_message(b"Subject: Hi\r\n\r\nBody\r\n");
        assert_eq!(head, b"Subject: Hi");
        assert_eq!(body, Some(&b"Body\r\n"[..]));

        let (head, body) = split_message(b"Subject: Hi\n");
        assert_eq!(head, b"Subject: Hi\n");
        assert!(body.is_none());
    }

    #[test]
    fn test_parse_fetched_overview() {
        let record = fetched(Some("Subject: Hello\nTo: a@b.org\n"), None);
        let msg =
            parse_fetched(&record, "INBOX", RetrievalMode::Overview, &ParseOptions::default())
                .unwrap();
        assert_eq!(msg.uid, 42);
        assert_eq!(msg.header.size, 1234);
        assert_eq!(msg.header.folder, "INBOX");
        assert_eq!(msg.header.subject, "Hello");
        assert!(msg.flags.seen && msg.flags.flagged && !msg.flags.deleted);
        assert!(msg.content.is_none());
    }

    #[test]
    fn test_parse_fetched_full() {
        let record = fetched(
            Some("MIME-Version: 1.0\nContent-Type: text/html\n"),
            Some("<p>hi</p>"),
        );
        let msg = parse_fetched(&record, "", RetrievalMode::Full, &ParseOptions::default())
            .unwrap();
        let content = msg.content.unwrap();
        assert_eq!(content["text/html"].body, "<p>hi</p>");
    }

    #[test]
    fn test_parse_fetched_full_mixed_charsets() {
        let mut body = b"--b\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Transfer-Encoding: 8bit\r\n\r\nSch\xc3\xb6n\r\n".to_vec();
        body.extend_from_slice(b"--b\r\nContent-Type: text/html; charset=ISO-8859-1\r\nContent-Transfer-Encoding: 8bit\r\n\r\n<p>Gr\xfc\xdfe</p>\r\n--b--\r\n");
        let record = FetchedMessage {
            uid: 9,
            size: 0,
            header: Some(b"MIME-Version: 1.0\r\nContent-Type: multipart/alternative; boundary=b\r\n".to_vec()),
            body: Some(body),
            flags: Vec::new(),
        };

        let msg = parse_fetched(&record, "", RetrievalMode::Full, &ParseOptions::default())
            .unwrap();
        let content = mime::decode_content(&msg.content.unwrap());
        assert_eq!(content["text/plain"].body, "Schön");
        assert_eq!(content["text/html"].body, "<p>Grüße</p>");
    }

    #[test]
    fn test_parse_fetched_missing_header() {
        let record = fetched(None, Some("body"));
        let result =
            parse_fetched(&record, "", RetrievalMode::Full, &ParseOptions::default());
        assert!(matches!(result, Err(MailError::MissingHeader { uid: 42 })));
    }

    #[test]
    fn test_parse_fetched_full_missing_body() {
        let record = fetched(Some("Subject: x\n"), None);
        let result =
            parse_fetched(&record, "", RetrievalMode::Full, &ParseOptions::default());
        assert!(matches!(result, Err(MailError::MissingBody)));
    }

    #[test]
    fn test_parse_message_without_body() {
        let msg = parse_message(b"Subject: only headers\n", &ParseOptions::default()).unwrap();
        assert_eq!(msg.header.subject, "only headers");
        assert_eq!(msg.content.unwrap()["text/plain"].body, "");
    }

    #[test]
    fn test_parse_message_empty_is_error() {
        let result = parse_message(b"", &ParseOptions::default());
        assert!(matches!(result, Err(MailError::EmptyHeader)));
    }
}

//! Append payloads for the mailbox layer, including the "Sent" copy of an
//! outgoing mail.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::compose::header::serialize_header;
use crate::config::ComposeConfig;
use crate::model::flags::Flags;
use crate::model::header::Header;

/// Folder that receives copies of sent mail.
pub const SENT_FOLDER: &str = "Sent";

/// Everything the mailbox layer needs to store one message.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRequest {
    /// Full mailbox path, e.g. `INBOX.Sent`.
    pub mailbox: String,
    /// System flag symbols, e.g. `["\\Seen"]`.
    pub flags: Vec<&'static str>,
    /// Internal date of the stored message.
    pub date: DateTime<Utc>,
    /// Header block, blank line, content and a final line break.
    pub message: String,
}

/// Serialize `header` and join it with `content` into RFC 5322 text.
pub fn build_append_message(header: &Header, content: &str) -> String {
    [serialize_header(header).as_str(), "", content, ""].join("\r\n")
}

/// Path of `folder` below `mailbox`; the mailbox itself when `folder` is empty.
pub fn mailbox_path(mailbox: &str, delimiter: &str, folder: &str) -> String {
    if folder.is_empty() {
        mailbox.to_string()
    } else {
        format!("{mailbox}{delimiter}{folder}")
    }
}

/// Build the append payload for a message going to `header.folder`.
pub fn prepare_append(
    header: &Header,
    flags: &Flags,
    content: &str,
    config: &ComposeConfig,
) -> AppendRequest {
    let mailbox = mailbox_path(&config.mailbox, &config.delimiter, &header.folder);
    let message = build_append_message(header, content);
    debug!(mailbox, bytes = message.len(), "Prepared append");

    AppendRequest {
        mailbox,
        flags: flags.to_symbols(),
        date: header.date,
        message,
    }
}

/// Header and flags of the copy filed after sending a mail.
///
/// Receivers are joined with `", "`; the copy is marked as seen and has no
/// MIME descriptor (the body is stored as plain text).
pub fn sent_copy(
    from: &str,
    to: &[String],
    subject: &str,
    date: DateTime<Utc>,
    config: &ComposeConfig,
) -> (Header, Flags) {
    let header = Header {
        folder: config.sent_folder.clone(),
        date,
        subject: subject.to_string(),
        sender: from.to_string(),
        receiver: to.join(", "),
        ..Header::default()
    };
    let flags = Flags {
        seen: true,
        ..Flags::default()
    };
    (header, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::eml::parse_message;
    use crate::parser::mime::ParseOptions;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 4, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_mailbox_path() {
        assert_eq!(mailbox_path("INBOX", ".", "Sent"), "INBOX.Sent");
        assert_eq!(mailbox_path("INBOX", "/", ""), "INBOX");
    }

    #[test]
    fn test_build_append_message_layout() {
        let header = Header {
            subject: "Hi".to_string(),
            ..Header::default()
        };
        let text = build_append_message(&header, "body");
        assert!(text.ends_with("X-GMX-Antispam: 0\r\n\r\nbody\r\n"));
    }

    #[test]
    fn test_sent_copy() {
        let config = ComposeConfig::default();
        let to = vec!["a@example.org".to_string(), "b@example.org".to_string()];
        let (header, flags) = sent_copy("me@example.org", &to, "Report", date(), &config);

        assert_eq!(header.folder, SENT_FOLDER);
        assert_eq!(header.receiver, "a@example.org, b@example.org");
        assert_eq!(header.sender, "me@example.org");
        assert!(flags.seen && !flags.answered);

        let request = prepare_append(&header, &flags, "Hello there", &config);
        assert_eq!(request.mailbox, "INBOX.Sent");
        assert_eq!(request.flags, vec!["\\Seen"]);
        assert_eq!(request.date, date());
    }

    #[test]
    fn test_append_message_parses_back() {
        let config = ComposeConfig::default();
        let (header, flags) = sent_copy(
            "me@example.org",
            &["you@example.org".to_string()],
            "Report",
            date(),
            &config,
        );
        let request = prepare_append(&header, &flags, "Hello there", &config);

        let msg = parse_message(request.message.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(msg.header.subject, "Report");
        assert_eq!(msg.header.receiver, "you@example.org");
        assert_eq!(msg.header.date, date());
        assert_eq!(msg.content.unwrap()["text/plain"].body, "Hello there\r\n");
    }
}

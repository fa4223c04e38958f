//! Message aggregate and the raw record it is built from.

use serde::{Deserialize, Serialize};

use super::content::Content;
use super::flags::Flags;
use super::header::Header;

/// A message as handed to callers (mail listing, search, display).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique ID of the message as reported by the server.
    pub uid: u32,

    /// Parsed header.
    pub header: Header,

    /// System flags.
    pub flags: Flags,

    /// Content parts, `None` when only an overview was retrieved.
    pub content: Option<Content>,
}

/// Raw per-message data delivered by the mailbox-access layer.
#[derive(Debug, Clone, Default)]
pub struct FetchedMessage {
    /// Unique ID of the message.
    pub uid: u32,
    /// Size of the whole message in bytes.
    pub size: u32,
    /// Raw header block.
    pub header: Option<Vec<u8>>,
    /// Raw body (everything after the header block).
    pub body: Option<Vec<u8>>,
    /// Currently active flag symbols.
    pub flags: Vec<String>,
}

/// How much of a message to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// UID, header and flags.
    #[default]
    Overview,
    /// Overview plus content parts.
    Full,
}

/// Sort messages by date, newest first.
///
/// Messages with an unknown (epoch) date end up last.
pub fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.header.date.cmp(&a.header.date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(uid: u32, year: i32) -> Message {
        let mut header = Header::default();
        if year > 0 {
            header.date = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
        }
        Message {
            uid,
            header,
            flags: Flags::default(),
            content: None,
        }
    }

    #[test]
    fn test_sort_newest_first() {
        let mut messages = vec![message(1, 2013), message(2, 0), message(3, 2020)];
        sort_newest_first(&mut messages);
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        assert_eq!(uids, vec![3, 1, 2]);
    }
}

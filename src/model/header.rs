//! Parsed header types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transfer encoding assumed when a message or part declares none.
pub const DEFAULT_TRANSFER_ENCODING: &str = "quoted-printable";

/// Compact descriptor of the MIME fields of a header block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MimeMetadata {
    /// Value of `MIME-Version` (0 when absent or unparseable, i.e. non-MIME mail).
    pub mime_version: f32,

    /// Lower-cased media type from `Content-Type` (empty if absent).
    pub content_type: String,

    /// `Content-Transfer-Encoding`, defaulting to [`DEFAULT_TRANSFER_ENCODING`].
    pub transfer_encoding: String,

    /// Multipart boundary.
    ///
    /// Non-empty only when `content_type` is a multipart type and the
    /// `boundary` parameter was present.
    pub multipart_boundary: String,
}

impl MimeMetadata {
    /// Whether `content_type` denotes a multipart media type.
    pub fn is_multipart(&self) -> bool {
        self.content_type.contains("multipart")
    }
}

impl Default for MimeMetadata {
    fn default() -> Self {
        Self {
            mime_version: 0.0,
            content_type: String::new(),
            transfer_encoding: DEFAULT_TRANSFER_ENCODING.to_string(),
            multipart_boundary: String::new(),
        }
    }
}

/// Structured header of one message.
///
/// A fresh value is produced for every parse and for every composed message;
/// nothing here refers back into the raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Size of the whole message in bytes (0 if unknown).
    pub size: u32,

    /// Mailbox folder the message was read from ("" = root).
    pub folder: String,

    /// Parsed `Date:` header.
    ///
    /// Falls back to the Unix epoch, which callers must read as "unknown".
    pub date: DateTime<Utc>,

    /// Decoded `Subject:`.
    pub subject: String,

    /// Decoded `From:`.
    pub sender: String,

    /// Decoded `To:`.
    // TODO: split into an address list once the web layer can render several receivers.
    pub receiver: String,

    /// Vendor spam score (0 = not spam).
    pub spam_indicator: u32,

    /// MIME descriptor of the message.
    pub mime: MimeMetadata,
}

impl Header {
    /// Whether the date could not be determined and holds the epoch fallback.
    pub fn has_unknown_date(&self) -> bool {
        self.date == DateTime::UNIX_EPOCH
    }
}

impl Default for Header {
    fn default() -> Self {
        Self {
            size: 0,
            folder: String::new(),
            date: DateTime::UNIX_EPOCH,
            subject: String::new(),
            sender: String::new(),
            receiver: String::new(),
            spam_indicator: 0,
            mime: MimeMetadata::default(),
        }
    }
}

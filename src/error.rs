//! Centralized error types for watney.
//!
//! Only structural failures surface here. A field that cannot be interpreted
//! (date, MIME version, spam score, a single body part) degrades to its
//! default inside the parser and never becomes a `MailError`.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the watney library.
#[derive(Error, Debug)]
pub enum MailError {
    /// The raw header block has zero length.
    #[error("Header block is empty")]
    EmptyHeader,

    /// The fetched message record carries no header block at all.
    #[error("No header was provided for message {uid}")]
    MissingHeader { uid: u32 },

    /// A body decomposition was requested but no body was supplied.
    #[error("Cannot parse mail content: no body was provided")]
    MissingBody,

    /// A `Content-Type` value could not be parsed as `type/subtype; params`.
    #[error("Invalid media type '{value}': {reason}")]
    InvalidMediaType { value: String, reason: String },

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Mail file not found: {0}")]
    FileNotFound(PathBuf),
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn media_type(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMediaType {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `MailError::io`).
impl From<std::io::Error> for MailError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

//! Body content types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Charset assumed for parts that do not declare one.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Media type used for non-MIME bodies and for parts without a `Content-Type`.
pub const PLAIN_TEXT: &str = "text/plain";

/// One content part of a message (e.g. `text/plain`, `text/html`).
///
/// The body is kept exactly as transferred; see
/// [`decode_content`](crate::parser::mime::decode_content) for display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Charset of the body (default `UTF-8`).
    pub charset: String,

    /// Transfer encoding of this part, e.g. `quoted-printable`, `base64`.
    pub encoding: String,

    /// Raw, still-encoded body.
    pub body: String,
}

impl ContentPart {
    /// Build a part with the default charset.
    pub fn new(encoding: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            charset: DEFAULT_CHARSET.to_string(),
            encoding: encoding.into(),
            body: body.into(),
        }
    }
}

/// Content parts of a message keyed by media type.
///
/// Inserting a media type that is already present replaces the earlier part.
/// Nested multiparts are flattened into this single map, so a later
/// `text/plain` (including unlabeled parts) silently wins over an earlier one.
pub type Content = BTreeMap<String, ContentPart>;

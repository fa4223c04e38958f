//! Core data model types: headers, MIME metadata, content parts, flags and messages.

pub mod content;
pub mod flags;
pub mod header;
pub mod mail;

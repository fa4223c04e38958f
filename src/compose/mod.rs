//! Outgoing direction: header serialization and append payloads for composed mail.

pub mod header;
pub mod message;

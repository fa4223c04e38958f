//! `watney` — the message core of a webmail client.
//!
//! This crate turns raw mail handed over by the mailbox layer into structured
//! messages (header tokenizing, encoded words, dates, spam scores, multipart
//! bodies, flags) and builds the text appended back to a mailbox.

pub mod compose;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;

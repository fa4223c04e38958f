//! Message flags and their protocol symbols.

use serde::{Deserialize, Serialize};

pub const SEEN: &str = "\\Seen";
pub const DELETED: &str = "\\Deleted";
pub const ANSWERED: &str = "\\Answered";
pub const FLAGGED: &str = "\\Flagged";
pub const DRAFT: &str = "\\Draft";
pub const RECENT: &str = "\\Recent";

/// System flags of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flags {
    /// The message has been read.
    pub seen: bool,
    /// Marked for removal by a later expunge.
    pub deleted: bool,
    /// The message was answered.
    pub answered: bool,
    /// Flagged for urgent or special attention.
    pub flagged: bool,
    /// Composition is not finished.
    pub draft: bool,
    /// Recently arrived in this mailbox.
    pub recent: bool,
}

impl Flags {
    /// Encode the set flags as protocol symbols.
    ///
    /// Unset flags are omitted; there is no negative marker.
    pub fn to_symbols(&self) -> Vec<&'static str> {
        [
            (self.seen, SEEN),
            (self.deleted, DELETED),
            (self.answered, ANSWERED),
            (self.flagged, FLAGGED),
            (self.draft, DRAFT),
            (self.recent, RECENT),
        ]
        .into_iter()
        .filter_map(|(set, symbol)| set.then_some(symbol))
        .collect()
    }

    /// Decode the active symbols reported by the server.
    ///
    /// Symbols are matched case-insensitively; keywords that are not system
    /// flags are ignored.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = Self::default();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim();
            let slot = if symbol.eq_ignore_ascii_case(SEEN) {
                &mut flags.seen
            } else if symbol.eq_ignore_ascii_case(DELETED) {
                &mut flags.deleted
            } else if symbol.eq_ignore_ascii_case(ANSWERED) {
                &mut flags.answered
            } else if symbol.eq_ignore_ascii_case(FLAGGED) {
                &mut flags.flagged
            } else if symbol.eq_ignore_ascii_case(DRAFT) {
                &mut flags.draft
            } else if symbol.eq_ignore_ascii_case(RECENT) {
                &mut flags.recent
            } else {
                tracing::debug!(symbol, "Ignoring non-system flag");
                continue;
            };
            *slot = true;
        }
        flags
    }
}

/// Whether a flag update adds or removes the given flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Add,
    Remove,
}

impl StoreMode {
    /// The data item name of a silent STORE command for this mode.
    pub fn item(self) -> &'static str {
        match self {
            StoreMode::Add => "+FLAGS.SILENT",
            StoreMode::Remove => "-FLAGS.SILENT",
        }
    }
}

//! Last-write-wins registers
//!
//! Account state that is mirrored from relays (relay list, mute list,
//! bookmarks, ...) arrives out of order. Each field is kept as a value plus
//! the `created_at` of the event it came from, and only a strictly newer
//! timestamp may replace it.

use serde::{Deserialize, Serialize};

/// A value paired with the timestamp of its last accepted update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Current value
    pub item: T,

    /// Timestamp of the update that produced `item`
    pub timestamp: u64,
}

impl<T> Versioned<T> {
    /// Create a register holding `item` at `timestamp`
    pub fn new(item: T, timestamp: u64) -> Self {
        Self { item, timestamp }
    }

    /// Apply an update if it is strictly newer than the stored one.
    ///
    /// Returns `true` when the register changed. Equal or older timestamps
    /// are ignored, which makes the merge idempotent and order independent.
    pub fn update(&mut self, item: T, timestamp: u64) -> bool {
        if timestamp <= self.timestamp {
            return false;
        }
        self.item = item;
        self.timestamp = timestamp;
        true
    }

    /// Replace the value unconditionally, pinning the timestamp
    pub fn force(&mut self, item: T, timestamp: u64) {
        self.item = item;
        self.timestamp = timestamp;
    }
}

/// The list-valued versioned fields of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListField {
    Tags,
    Muted,
    Blocked,
    Pinned,
    Bookmarked,
}

impl ListField {
    /// All list fields, in storage order
    pub const ALL: [ListField; 5] = [
        ListField::Tags,
        ListField::Muted,
        ListField::Blocked,
        ListField::Pinned,
        ListField::Bookmarked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListField::Tags => "tags",
            ListField::Muted => "muted",
            ListField::Blocked => "blocked",
            ListField::Pinned => "pinned",
            ListField::Bookmarked => "bookmarked",
        }
    }
}

impl std::fmt::Display for ListField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

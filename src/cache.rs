//! Gift-wrap cache
//!
//! Unwrapped NIP-59 gifts are private to the logged-in identity, so the
//! whole cache is dropped on logout.

use dashmap::DashMap;
use tracing::debug;

use crate::event::NostrEvent;

/// In-memory cache of received gift-wrapped events, keyed by event id
#[derive(Debug, Default)]
pub struct GiftsCache {
    entries: DashMap<String, NostrEvent>,
}

impl GiftsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event; returns `false` if it was already cached
    pub fn insert(&self, event: NostrEvent) -> bool {
        self.entries.insert(event.id.clone(), event).is_none()
    }

    pub fn get(&self, id: &str) -> Option<NostrEvent> {
        self.entries.get(id).map(|e| e.clone())
    }

    /// Cached events, newest first
    pub fn snapshot(&self) -> Vec<NostrEvent> {
        let mut events: Vec<NostrEvent> = self.entries.iter().map(|e| e.clone()).collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "Cleared gifts cache");
    }
}

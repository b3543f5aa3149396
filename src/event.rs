//! Nostr event model (NIP-01)
//!
//! Plain serde structs for the events the login layer handles. Ids,
//! signatures and verification are delegated to the `nostr` crate.

use nostr::{EventBuilder, Keys, Kind, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

use crate::types::{LoginError, Result};

/// Event kinds used by the login layer
pub mod kind {
    pub const METADATA: u16 = 0;
    pub const CONTACT_LIST: u16 = 3;
    pub const RATES: u16 = 1009;
    pub const RELAY_LIST: u16 = 10002;
    pub const APP_DATA: u16 = 30078;
}

/// A tag is an array of strings, first element is the tag name
pub type Tag = Vec<String>;

/// Event fields before the id and signature are attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Tag>,
    pub content: String,
}

impl UnsignedEvent {
    /// Build an unsigned event stamped with the current time
    pub fn new(pubkey: impl Into<String>, kind: u16, tags: Vec<Tag>, content: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            created_at: unix_now(),
            kind,
            tags,
            content: content.into(),
        }
    }

    /// Convert to the `nostr` crate's unsigned event
    pub fn to_nostr(&self) -> Result<nostr::UnsignedEvent> {
        let pubkey = PublicKey::from_hex(&self.pubkey)?;
        let tags = self
            .tags
            .iter()
            .map(|t| nostr::Tag::parse(t.as_slice()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LoginError::Signer(format!("Bad tag: {e}")))?;

        Ok(EventBuilder::new(Kind::from(self.kind), &self.content)
            .tags(tags)
            .custom_created_at(Timestamp::from(self.created_at))
            .build(pubkey))
    }

    /// Compute the id and sign with `keys`
    pub fn sign_with_keys(&self, keys: &Keys) -> Result<NostrEvent> {
        let signed = self
            .to_nostr()?
            .sign_with_keys(keys)
            .map_err(|e| LoginError::Signer(format!("Signing failed: {e}")))?;
        NostrEvent::from_nostr(&signed)
    }
}

/// A signed event as sent to relays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NostrEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Tag>,
    pub content: String,
    pub sig: String,
}

impl NostrEvent {
    /// Convert from the `nostr` crate's event (same NIP-01 JSON shape)
    pub fn from_nostr(event: &nostr::Event) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::to_value(event)?)?)
    }

    /// Convert to the `nostr` crate's event
    pub fn to_nostr(&self) -> Result<nostr::Event> {
        serde_json::from_value(serde_json::to_value(self)?)
            .map_err(|e| LoginError::Signer(format!("Malformed event {}: {e}", self.id)))
    }

    /// Strip id and signature
    pub fn unsigned(&self) -> UnsignedEvent {
        UnsignedEvent {
            pubkey: self.pubkey.clone(),
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
        }
    }

    /// Check the id matches the content and the signature matches the id
    pub fn verify(&self) -> Result<()> {
        self.to_nostr()?
            .verify()
            .map_err(|e| LoginError::Crypto(format!("Event {} failed verification: {e}", self.id)))
    }

    /// First value of the first tag with the given name
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Current unix time in milliseconds
pub fn unix_now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Newest event by `created_at`
pub fn newest<'a, I>(events: I) -> Option<&'a NostrEvent>
where
    I: IntoIterator<Item = &'a NostrEvent>,
{
    events.into_iter().max_by_key(|e| e.created_at)
}

//! Login sessions
//!
//! One [`LoginSession`] per logged-in identity, held in a [`LoginStore`]
//! and persisted through a [`KeyValueStorage`] backend.

pub mod storage;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::keys::KeyStorage;
use crate::relay::RelayMap;
use crate::versioned::{ListField, Versioned};

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{LoginStore, SessionStoreStats};

/// How a session signs events. Fixed for the lifetime of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginSessionType {
    /// Private key held locally
    PrivateKey,
    /// NIP-46 remote bunker
    Nip46,
    /// NIP-07 browser extension
    Nip7,
    /// OS level signer
    Nip7Os,
}

impl LoginSessionType {
    /// Whether signing is done outside this process
    pub fn is_external(&self) -> bool {
        !matches!(self, LoginSessionType::PrivateKey)
    }
}

/// A paid subscription attached to the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub id: String,
    pub tier: String,
    /// Unix seconds
    pub start: u64,
    /// Unix seconds
    pub end: u64,
}

impl SubscriptionEvent {
    pub fn is_active(&self, now: u64) -> bool {
        self.start <= now && now < self.end
    }
}

/// Local state of one authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSession {
    /// Hex public key of the identity
    pub id: String,

    #[serde(rename = "type")]
    pub session_type: LoginSessionType,

    /// Declared public key (hex)
    pub public_key: Option<String>,

    /// Private key for `PrivateKey` sessions, local client key for `Nip46`
    #[serde(default)]
    pub private_key_data: Option<KeyStorage>,

    /// Relays of the remote bunker (`Nip46` only)
    #[serde(default)]
    pub remote_signer_relays: Option<Vec<String>>,

    /// Hex BIP-39 entropy of a generated account, until backed up
    #[serde(default)]
    pub generated_entropy: Option<String>,

    /// Unix milliseconds of the last "mark all read"
    #[serde(default)]
    pub read_notifications: i64,

    #[serde(default)]
    pub relays: Versioned<RelayMap>,
    #[serde(default)]
    pub tags: Versioned<Vec<String>>,
    #[serde(default)]
    pub muted: Versioned<Vec<String>>,
    #[serde(default)]
    pub blocked: Versioned<Vec<String>>,
    #[serde(default)]
    pub pinned: Versioned<Vec<String>>,
    #[serde(default)]
    pub bookmarked: Versioned<Vec<String>>,

    /// Application data blob (mirrored from kind 30078)
    #[serde(default)]
    pub app_data: Versioned<serde_json::Value>,

    /// Unique by `id`
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionEvent>,
}

impl LoginSession {
    /// Empty session for `id`
    pub fn new(id: impl Into<String>, session_type: LoginSessionType) -> Self {
        let id = id.into();
        Self {
            public_key: Some(id.clone()),
            id,
            session_type,
            private_key_data: None,
            remote_signer_relays: None,
            generated_entropy: None,
            read_notifications: 0,
            relays: Versioned::default(),
            tags: Versioned::default(),
            muted: Versioned::default(),
            blocked: Versioned::default(),
            pinned: Versioned::default(),
            bookmarked: Versioned::default(),
            app_data: Versioned::default(),
            subscriptions: Vec::new(),
        }
    }

    /// Borrow a list field
    pub fn list(&self, field: ListField) -> &Versioned<Vec<String>> {
        match field {
            ListField::Tags => &self.tags,
            ListField::Muted => &self.muted,
            ListField::Blocked => &self.blocked,
            ListField::Pinned => &self.pinned,
            ListField::Bookmarked => &self.bookmarked,
        }
    }

    /// Mutably borrow a list field
    pub fn list_mut(&mut self, field: ListField) -> &mut Versioned<Vec<String>> {
        match field {
            ListField::Tags => &mut self.tags,
            ListField::Muted => &mut self.muted,
            ListField::Blocked => &mut self.blocked,
            ListField::Pinned => &mut self.pinned,
            ListField::Bookmarked => &mut self.bookmarked,
        }
    }

    /// Whether the stored key must be unlocked with a PIN first
    pub fn needs_pin(&self) -> bool {
        self.private_key_data
            .as_ref()
            .map(KeyStorage::should_unlock)
            .unwrap_or(false)
    }
}

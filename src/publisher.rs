//! Event publisher bound to one identity
//!
//! Builds the standard account events (profile, contact list, relay list,
//! app data) and signs them through whatever [`Signer`] the session uses.

use std::sync::Arc;

use nostr::Keys;
use serde::{Deserialize, Serialize};

use crate::event::{kind, NostrEvent, Tag, UnsignedEvent};
use crate::relay::RelayMap;
use crate::signer::{PrivateKeySigner, Signer};
use crate::types::Result;

/// Kind 0 profile metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nip05: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lud16: Option<String>,
}

/// Signs and builds events for a single public key
#[derive(Clone)]
pub struct EventPublisher {
    signer: Arc<dyn Signer>,
    pubkey: String,
}

impl EventPublisher {
    pub fn new(signer: Arc<dyn Signer>, pubkey: impl Into<String>) -> Self {
        Self {
            signer,
            pubkey: pubkey.into(),
        }
    }

    /// Publisher backed by an in-memory private key
    pub fn private_key(keys: Keys) -> Self {
        let signer = PrivateKeySigner::new(keys);
        let pubkey = signer.public_key();
        Self::new(Arc::new(signer), pubkey)
    }

    /// Public key (hex) events are signed for
    pub fn pubkey(&self) -> &str {
        &self.pubkey
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Sign an arbitrary event
    pub async fn generic(&self, kind: u16, tags: Vec<Tag>, content: impl Into<String>) -> Result<NostrEvent> {
        let unsigned = UnsignedEvent::new(self.pubkey.clone(), kind, tags, content);
        self.signer.sign(unsigned).await
    }

    /// Kind 3 contact list; relays go in the content as legacy clients expect
    pub async fn contact_list(&self, follows: Vec<Tag>, relays: &RelayMap) -> Result<NostrEvent> {
        let content = serde_json::to_string(relays)?;
        self.generic(kind::CONTACT_LIST, follows, content).await
    }

    /// Kind 10002 relay list (NIP-65)
    pub async fn relay_list(&self, relays: &RelayMap) -> Result<NostrEvent> {
        let tags = relays
            .iter()
            .map(|(url, settings)| {
                let mut tag = vec!["r".to_string(), url.clone()];
                if let Some(marker) = settings.marker() {
                    tag.push(marker.to_string());
                }
                tag
            })
            .collect();
        self.generic(kind::RELAY_LIST, tags, "").await
    }

    /// Kind 0 profile metadata
    pub async fn metadata(&self, profile: &UserMetadata) -> Result<NostrEvent> {
        let content = serde_json::to_string(profile)?;
        self.generic(kind::METADATA, Vec::new(), content).await
    }

    /// Kind 30078 application data addressed by `d` tag
    pub async fn app_data(&self, d_tag: &str, data: &serde_json::Value) -> Result<NostrEvent> {
        let tags = vec![vec!["d".to_string(), d_tag.to_string()]];
        self.generic(kind::APP_DATA, tags, data.to_string()).await
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("pubkey", &self.pubkey)
            .finish()
    }
}

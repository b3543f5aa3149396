//! nostr.band API client

use std::sync::Arc;

use serde::Deserialize;

use super::fetch::{decode, CachedFetch};
use crate::event::NostrEvent;
use crate::keys::public_key_to_npub;
use crate::types::Result;

#[derive(Debug, Deserialize)]
struct SuggestedProfiles {
    #[serde(default)]
    profiles: Vec<SuggestedProfile>,
}

#[derive(Debug, Deserialize)]
struct SuggestedProfile {
    pubkey: String,
}

#[derive(Debug, Deserialize)]
struct TrendingNotes {
    #[serde(default)]
    notes: Vec<TrendingNote>,
}

#[derive(Debug, Deserialize)]
struct TrendingNote {
    event: NostrEvent,
}

/// Client for api.nostr.band
#[derive(Clone)]
pub struct NostrBandApi {
    base_url: String,
    fetch: Arc<CachedFetch>,
}

impl NostrBandApi {
    pub fn new(base_url: impl Into<String>, fetch: Arc<CachedFetch>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fetch,
        }
    }

    /// Suggested follows endpoint for an `npub`
    pub fn suggested_follows_url(&self, npub: &str) -> String {
        format!("{}/v0/suggested/profiles/{}", self.base_url, npub)
    }

    pub fn trending_notes_url(&self) -> String {
        format!("{}/v0/trending/notes", self.base_url)
    }

    /// Cache key used for a request URL
    pub fn cache_key(url: &str) -> String {
        format!("nostr-band-{url}")
    }

    /// Pubkeys suggested for `pubkey` (hex or npub). Empty when the
    /// provider has no suggestions; callers fall back to trending users.
    pub async fn suggested_profiles(&self, pubkey: &str) -> Result<Vec<String>> {
        let url = self.suggested_follows_url(&public_key_to_npub(pubkey)?);
        let key = Self::cache_key(&url);
        self.fetch
            .fetch(&url, &key, |data| {
                let parsed: SuggestedProfiles = decode(data)?;
                Ok(parsed.profiles.into_iter().map(|p| p.pubkey).collect())
            })
            .await
    }

    /// Currently trending notes
    pub async fn trending_notes(&self) -> Result<Vec<NostrEvent>> {
        let url = self.trending_notes_url();
        let key = Self::cache_key(&url);
        self.fetch
            .fetch(&url, &key, |data| {
                let parsed: TrendingNotes = decode(data)?;
                Ok(parsed.notes.into_iter().map(|n| n.event).collect())
            })
            .await
    }

    /// Drop cached suggestions so the next call refetches
    pub fn retry_suggested(&self, pubkey: &str) -> Result<()> {
        let url = self.suggested_follows_url(&public_key_to_npub(pubkey)?);
        self.fetch.retry(&Self::cache_key(&url));
        Ok(())
    }
}

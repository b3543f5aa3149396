//! Snort API client (relay directory)

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::fetch::decode;
use crate::relay::sanitize_relay_url;
use crate::types::Result;

/// A relay near a location, as reported by the directory
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloseRelay {
    pub url: String,
    /// Distance in meters
    pub distance: f64,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub users: Option<u64>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Source of nearby relays
#[async_trait]
pub trait RelayDirectory: Send + Sync {
    async fn close_relays(&self, lat: f64, lon: f64, count: usize) -> Result<Vec<CloseRelay>>;
}

/// Client for api.snort.social
pub struct SnortApi {
    base_url: String,
    http_client: reqwest::Client,
}

impl SnortApi {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn close_relays_url(&self, lat: f64, lon: f64, count: usize) -> String {
        format!(
            "{}/api/v1/relays?count={}&lat={}&lon={}",
            self.base_url, count, lat, lon
        )
    }
}

#[async_trait]
impl RelayDirectory for SnortApi {
    async fn close_relays(&self, lat: f64, lon: f64, count: usize) -> Result<Vec<CloseRelay>> {
        let url = self.close_relays_url(lat, lon, count);
        debug!(url = %url, "Looking up close relays");
        let data = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        decode(data)
    }
}

/// Nearest free relays, closest first, at most `limit`
pub fn pick_close_relays(mut relays: Vec<CloseRelay>, limit: usize) -> Vec<String> {
    relays.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let mut picked: Vec<String> = Vec::new();
    for relay in relays.into_iter().filter(|r| !r.is_paid) {
        if picked.len() >= limit {
            break;
        }
        if let Some(url) = sanitize_relay_url(&relay.url) {
            if !picked.contains(&url) {
                picked.push(url);
            }
        }
    }
    picked
}

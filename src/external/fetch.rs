//! Cached JSON fetch
//!
//! Responses from third-party APIs are kept under a caller supplied cache
//! key until they go stale. A failed fetch is reported as-is; retrying is
//! left to the caller (see [`CachedFetch::retry`]).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::types::{LoginError, Result};

/// A cached response body
#[derive(Debug, Clone)]
struct CachedResponse {
    data: JsonValue,
    fetched_at: Instant,
}

/// HTTP JSON fetcher with a keyed response cache
pub struct CachedFetch {
    http_client: reqwest::Client,
    cache: DashMap<String, CachedResponse>,
    ttl: Duration,
}

impl CachedFetch {
    /// Build the fetcher. Fails when the HTTP client cannot be configured,
    /// e.g. for a user agent that is not a valid header value.
    pub fn new(ttl: Duration, request_timeout: Duration, user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| LoginError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            cache: DashMap::new(),
            ttl,
        })
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Fetch `url` as JSON, served from cache under `key` while fresh
    pub async fn fetch_json(&self, url: &str, key: &str) -> Result<JsonValue> {
        if let Some(data) = self.get_fresh(key) {
            debug!(key = %key, "Fetch served from cache");
            return Ok(data);
        }

        debug!(key = %key, url = %url, "Fetching");
        let data = self.download(url).await.inspect_err(|e| {
            warn!(key = %key, url = %url, error = %e, "Fetch failed");
        })?;

        self.cache.insert(
            key.to_string(),
            CachedResponse {
                data: data.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(data)
    }

    /// Fetch and transform. Transform errors are reported as fetch errors.
    pub async fn fetch<T, F>(&self, url: &str, key: &str, transform: F) -> Result<T>
    where
        F: FnOnce(JsonValue) -> Result<T>,
    {
        let data = self.fetch_json(url, key).await?;
        transform(data)
    }

    /// Forget the cached response so the next fetch goes to the network
    pub fn retry(&self, key: &str) {
        self.cache.remove(key);
    }

    /// Seed the cache (e.g. from a previous run)
    pub fn prime(&self, key: &str, data: JsonValue) {
        self.cache.insert(
            key.to_string(),
            CachedResponse {
                data,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn get_fresh(&self, key: &str) -> Option<JsonValue> {
        self.cache.get(key).and_then(|cached| {
            if cached.fetched_at.elapsed() < self.ttl {
                Some(cached.data.clone())
            } else {
                None
            }
        })
    }

    async fn download(&self, url: &str) -> Result<JsonValue> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoginError::Fetch(format!("{url} returned {status}")));
        }
        Ok(response.json().await?)
    }
}

/// Decode a JSON body into `T`, mapping failures to fetch errors
pub fn decode<T: serde::de::DeserializeOwned>(data: JsonValue) -> Result<T> {
    serde_json::from_value(data).map_err(|e| LoginError::Fetch(format!("Unexpected response: {e}")))
}

//! Remote signing through a NIP-46 bunker
//!
//! The wire transport (encrypted kind 24133 messages over the bunker's
//! relays) lives outside this crate behind [`RemoteSignerTransport`]. This
//! module builds requests, follows the `auth_url` challenge flow and checks
//! what comes back.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::{PrivateKeySigner, Signer};
use crate::event::{NostrEvent, UnsignedEvent};
use crate::types::{LoginError, Result};

/// Result value a bunker returns when the user must authorize in a browser
pub const AUTH_URL_RESULT: &str = "auth_url";

/// How many authorization rounds a single request may go through
const MAX_AUTH_ROUNDS: usize = 3;

// =============================================================================
// Bunker URL
// =============================================================================

/// `bunker://<remote-pubkey>?relay=<url>&relay=<url>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BunkerUrl {
    pub remote_pubkey: String,
    pub relays: Vec<String>,
}

impl BunkerUrl {
    pub fn new(remote_pubkey: impl Into<String>, relays: Vec<String>) -> Self {
        Self {
            remote_pubkey: remote_pubkey.into(),
            relays,
        }
    }

    /// Parse a `bunker://` URI
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| LoginError::Config(format!("Bad bunker URL: {e}")))?;
        if url.scheme() != "bunker" {
            return Err(LoginError::Config(format!(
                "Expected bunker:// scheme, got {}",
                url.scheme()
            )));
        }

        let remote_pubkey = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LoginError::Config("Bunker URL has no pubkey".into()))?
            .to_string();

        let relays = url
            .query_pairs()
            .filter(|(k, _)| k == "relay")
            .map(|(_, v)| v.into_owned())
            .collect();

        Ok(Self {
            remote_pubkey,
            relays,
        })
    }
}

impl std::fmt::Display for BunkerUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let relay_args: Vec<String> = self
            .relays
            .iter()
            .map(|r| format!("relay={}", urlencoding::encode(r)))
            .collect();
        write!(f, "bunker://{}?{}", self.remote_pubkey, relay_args.join("&"))
    }
}

// =============================================================================
// Messages
// =============================================================================

/// JSON-RPC style request sent to the bunker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nip46Request {
    pub id: String,
    pub method: String,
    pub params: Vec<String>,
}

impl Nip46Request {
    pub fn new(method: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Response from the bunker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nip46Response {
    pub id: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Collaborator traits
// =============================================================================

/// Delivers NIP-46 requests to a bunker and returns its responses
#[async_trait]
pub trait RemoteSignerTransport: Send + Sync {
    /// Send a request and wait for the first response to it
    async fn send(
        &self,
        bunker: &BunkerUrl,
        client: &PrivateKeySigner,
        request: &Nip46Request,
    ) -> Result<Nip46Response>;

    /// Wait for a further response to an earlier request (after `auth_url`)
    async fn wait_for_response(
        &self,
        bunker: &BunkerUrl,
        client: &PrivateKeySigner,
        request_id: &str,
    ) -> Result<Nip46Response>;
}

/// Receives authorization URLs the user has to open.
///
/// Called inline from the signing task, so implementations must hand the
/// URL off and return immediately.
pub trait AuthUrlHandler: Send + Sync {
    fn on_auth_url(&self, url: &str);
}

/// Logs authorization URLs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuthUrl;

impl AuthUrlHandler for LogAuthUrl {
    fn on_auth_url(&self, url: &str) {
        info!(url = %url, "Remote signer requests authorization, open this URL to continue");
    }
}

/// Forwards authorization URLs to a channel (e.g. a UI task)
#[derive(Debug, Clone)]
pub struct ChannelAuthUrl {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelAuthUrl {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AuthUrlHandler for ChannelAuthUrl {
    fn on_auth_url(&self, url: &str) {
        if self.tx.send(url.to_string()).is_err() {
            warn!(url = %url, "Auth URL receiver dropped");
        }
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Signer that forwards requests to a remote bunker
pub struct Nip46Signer {
    bunker: BunkerUrl,
    client: PrivateKeySigner,
    transport: Arc<dyn RemoteSignerTransport>,
    auth: Arc<dyn AuthUrlHandler>,
}

impl Nip46Signer {
    pub fn new(
        bunker: BunkerUrl,
        client: PrivateKeySigner,
        transport: Arc<dyn RemoteSignerTransport>,
        auth: Arc<dyn AuthUrlHandler>,
    ) -> Self {
        Self {
            bunker,
            client,
            transport,
            auth,
        }
    }

    pub fn bunker(&self) -> &BunkerUrl {
        &self.bunker
    }

    /// Run one request through the bunker, following auth challenges
    pub async fn request(&self, method: &str, params: Vec<String>) -> Result<String> {
        let request = Nip46Request::new(method, params);
        debug!(id = %request.id, method = %method, bunker = %self.bunker.remote_pubkey, "NIP-46 request");

        let mut response = self.transport.send(&self.bunker, &self.client, &request).await?;

        let mut rounds = 0;
        while response.result == AUTH_URL_RESULT {
            rounds += 1;
            if rounds > MAX_AUTH_ROUNDS {
                return Err(LoginError::Signer(format!(
                    "Remote signer kept asking for authorization ({} rounds)",
                    MAX_AUTH_ROUNDS
                )));
            }
            match response.error.as_deref() {
                Some(url) => self.auth.on_auth_url(url),
                None => warn!(id = %request.id, "auth_url response without a URL"),
            }
            response = self
                .transport
                .wait_for_response(&self.bunker, &self.client, &request.id)
                .await?;
        }

        if let Some(error) = response.error.filter(|e| !e.is_empty()) {
            return Err(LoginError::Signer(format!("{method} rejected: {error}")));
        }
        Ok(response.result)
    }
}

#[async_trait]
impl Signer for Nip46Signer {
    async fn get_public_key(&self) -> Result<String> {
        self.request("get_public_key", Vec::new()).await
    }

    async fn sign(&self, event: UnsignedEvent) -> Result<NostrEvent> {
        let expected = event.pubkey.clone();
        let raw = self
            .request("sign_event", vec![serde_json::to_string(&event)?])
            .await?;

        let signed: NostrEvent = serde_json::from_str(&raw)
            .map_err(|e| LoginError::Signer(format!("Bad signed event from bunker: {e}")))?;
        if signed.pubkey != expected {
            return Err(LoginError::Signer(format!(
                "Bunker signed as {} instead of {}",
                signed.pubkey, expected
            )));
        }
        signed.verify()?;
        Ok(signed)
    }
}

//! Signers provided by the environment (NIP-07 extension, OS signer)

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Signer;
use crate::event::{NostrEvent, UnsignedEvent};
use crate::types::{LoginError, Result};

/// Where an external signer comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalOrigin {
    /// `window.nostr` style browser extension (NIP-07)
    BrowserExtension,
    /// Signer exposed by the operating system / host app
    OsSigner,
}

impl std::fmt::Display for ExternalOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalOrigin::BrowserExtension => f.write_str("browser extension"),
            ExternalOrigin::OsSigner => f.write_str("OS signer"),
        }
    }
}

/// An externally provided signing capability
#[async_trait]
pub trait SignerProvider: Send + Sync {
    async fn get_public_key(&self) -> Result<String>;

    async fn sign_event(&self, event: UnsignedEvent) -> Result<NostrEvent>;
}

/// Delegates signing to a [`SignerProvider`] and checks its output
#[derive(Clone)]
pub struct ExternalSigner {
    origin: ExternalOrigin,
    provider: Arc<dyn SignerProvider>,
}

impl ExternalSigner {
    pub fn new(origin: ExternalOrigin, provider: Arc<dyn SignerProvider>) -> Self {
        Self { origin, provider }
    }

    pub fn origin(&self) -> ExternalOrigin {
        self.origin
    }
}

#[async_trait]
impl Signer for ExternalSigner {
    async fn get_public_key(&self) -> Result<String> {
        self.provider.get_public_key().await
    }

    async fn sign(&self, event: UnsignedEvent) -> Result<NostrEvent> {
        let expected = event.pubkey.clone();
        let signed = self.provider.sign_event(event).await?;
        if signed.pubkey != expected {
            return Err(LoginError::Signer(format!(
                "{} signed as {} instead of {}",
                self.origin, signed.pubkey, expected
            )));
        }
        signed.verify()?;
        Ok(signed)
    }
}

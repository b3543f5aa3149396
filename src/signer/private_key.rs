//! Local signer holding the secret key in memory

use async_trait::async_trait;
use nostr::Keys;

use super::Signer;
use crate::event::{NostrEvent, UnsignedEvent};
use crate::keys::keys_from_hex;
use crate::types::{LoginError, Result};

/// Signs with a secp256k1 key held in process memory
#[derive(Clone)]
pub struct PrivateKeySigner {
    keys: Keys,
}

impl PrivateKeySigner {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }

    /// Build from a hex (or nsec) private key
    pub fn from_hex(private_key: &str) -> Result<Self> {
        Ok(Self::new(keys_from_hex(private_key)?))
    }

    /// Public key as hex
    pub fn public_key(&self) -> String {
        self.keys.public_key().to_hex()
    }

    /// Sign synchronously
    pub fn sign_now(&self, event: UnsignedEvent) -> Result<NostrEvent> {
        let pubkey = self.public_key();
        if event.pubkey != pubkey {
            return Err(LoginError::Signer(format!(
                "Event pubkey {} does not match signer {}",
                event.pubkey, pubkey
            )));
        }

        event.sign_with_keys(&self.keys)
    }
}

impl std::fmt::Debug for PrivateKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeySigner")
            .field("public_key", &self.public_key())
            .finish()
    }
}

#[async_trait]
impl Signer for PrivateKeySigner {
    async fn get_public_key(&self) -> Result<String> {
        Ok(self.public_key())
    }

    async fn sign(&self, event: UnsignedEvent) -> Result<NostrEvent> {
        self.sign_now(event)
    }
}

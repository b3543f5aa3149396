//! Private key material attached to a session.
//!
//! A key is either stored as plain hex or encrypted under a PIN. Encrypted
//! keys are serialized without their plaintext, so a session loaded from
//! storage starts locked and must be unlocked before a signer can be built.

use std::fmt;

use nostr::Keys;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::crypto::{
    decrypt_private_key, derive_key_encryption_key, encrypt_private_key, generate_random_bytes,
    keys_from_hex, NONCE_LEN, PRIVATE_KEY_LEN, SALT_LEN,
};
use crate::types::{LoginError, Result};

/// Stored private key
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyStorage {
    /// Hex key kept as-is
    NotEncrypted { key: String },

    /// Key encrypted with a PIN-derived key (all fields hex)
    PinEncrypted {
        ciphertext: String,
        salt: String,
        nonce: String,
        #[serde(skip)]
        unlocked: Option<Zeroizing<String>>,
    },
}

impl KeyStorage {
    /// Wrap a hex key without encryption
    pub fn plain(private_key: impl Into<String>) -> Self {
        Self::NotEncrypted {
            key: private_key.into(),
        }
    }

    /// Encrypt a hex key under `pin`. The returned storage starts unlocked.
    pub fn with_pin(private_key: &str, pin: &str) -> Result<Self> {
        let raw = decode_private_key(private_key)?;
        let salt: [u8; SALT_LEN] = generate_random_bytes();
        let nonce: [u8; NONCE_LEN] = generate_random_bytes();

        let kek = Zeroizing::new(derive_key_encryption_key(pin.as_bytes(), &salt)?);
        let ciphertext = encrypt_private_key(&raw, &kek, &nonce)?;

        Ok(Self::PinEncrypted {
            ciphertext: hex::encode(ciphertext),
            salt: hex::encode(salt),
            nonce: hex::encode(nonce),
            unlocked: Some(Zeroizing::new(private_key.to_lowercase())),
        })
    }

    /// Whether the key must be unlocked before use
    pub fn should_unlock(&self) -> bool {
        matches!(self, Self::PinEncrypted { unlocked: None, .. })
    }

    /// Decrypt the key with `pin` and keep the plaintext in memory
    pub fn unlock(&mut self, pin: &str) -> Result<()> {
        let Self::PinEncrypted {
            ciphertext,
            salt,
            nonce,
            unlocked,
        } = self
        else {
            return Ok(());
        };

        let salt = hex::decode(salt).map_err(|e| LoginError::Crypto(format!("Bad salt: {e}")))?;
        let nonce: [u8; NONCE_LEN] = hex::decode(nonce)
            .ok()
            .and_then(|n| n.try_into().ok())
            .ok_or_else(|| LoginError::Crypto("Bad nonce".into()))?;
        let ciphertext = hex::decode(ciphertext)
            .map_err(|e| LoginError::Crypto(format!("Bad ciphertext: {e}")))?;

        let kek = Zeroizing::new(derive_key_encryption_key(pin.as_bytes(), &salt)?);
        let key = Zeroizing::new(decrypt_private_key(&ciphertext, &kek, &nonce)?);

        *unlocked = Some(Zeroizing::new(hex::encode(key.as_slice())));
        debug!("Unlocked PIN protected key");
        Ok(())
    }

    /// Drop the in-memory plaintext of an encrypted key
    pub fn lock(&mut self) {
        if let Self::PinEncrypted { unlocked, .. } = self {
            *unlocked = None;
        }
    }

    /// Hex private key, if available
    pub fn value(&self) -> Result<&str> {
        match self {
            Self::NotEncrypted { key } => Ok(key),
            Self::PinEncrypted {
                unlocked: Some(key),
                ..
            } => Ok(key.as_str()),
            Self::PinEncrypted { unlocked: None, .. } => Err(LoginError::KeyLocked),
        }
    }

    /// Parsed key pair
    pub fn keys(&self) -> Result<Keys> {
        keys_from_hex(self.value()?)
    }
}

impl fmt::Debug for KeyStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEncrypted { .. } => f.write_str("KeyStorage::NotEncrypted(..)"),
            Self::PinEncrypted { unlocked, .. } => f
                .debug_struct("KeyStorage::PinEncrypted")
                .field("locked", &unlocked.is_none())
                .finish(),
        }
    }
}

fn decode_private_key(private_key: &str) -> Result<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    let bytes = Zeroizing::new(
        hex::decode(private_key).map_err(|e| LoginError::InvalidKey(format!("Not hex: {e}")))?,
    );
    if bytes.len() != PRIVATE_KEY_LEN {
        return Err(LoginError::InvalidKey(format!(
            "Expected {} bytes, got {}",
            PRIVATE_KEY_LEN,
            bytes.len()
        )));
    }
    let mut raw = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    raw.copy_from_slice(&bytes);
    Ok(raw)
}

//! Key generation and PIN-protected key storage
//!
//! New accounts are created from BIP-39 entropy so the user can back up a
//! mnemonic; the signing key is derived from it with NIP-06. Keys at rest
//! may be encrypted under a PIN (Argon2id + ChaCha20-Poly1305).

pub mod crypto;
pub mod storage;

use bip39::Mnemonic;
use nostr::nips::nip06::FromMnemonic;
use nostr::Keys;
use zeroize::Zeroizing;

use crate::types::{LoginError, Result};

pub use crypto::{generate_random_bytes, generate_secret_key, keys_from_hex};
pub use storage::KeyStorage;

/// Entropy size for generated accounts (24 word mnemonic)
pub const ENTROPY_LEN: usize = 32;

/// A freshly generated key pair, hex encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKey {
    pub private_key: String,
    pub public_key: String,
}

/// Generate a random key pair
pub fn generate_random_key() -> GeneratedKey {
    let (secret, keys) = generate_secret_key();
    GeneratedKey {
        private_key: hex::encode(secret),
        public_key: keys.public_key().to_hex(),
    }
}

/// Generate BIP-39 entropy for a new account
pub fn generate_bip39_entropy() -> Zeroizing<[u8; ENTROPY_LEN]> {
    Zeroizing::new(generate_random_bytes())
}

/// Mnemonic phrase for the given entropy
pub fn entropy_to_mnemonic(entropy: &[u8]) -> Result<Zeroizing<String>> {
    let mnemonic = Mnemonic::from_entropy(entropy)
        .map_err(|e| LoginError::InvalidKey(format!("Bad entropy: {e}")))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Derive the account key (NIP-06, account 0) from BIP-39 entropy
pub fn entropy_to_keys(entropy: &[u8]) -> Result<Keys> {
    let phrase = entropy_to_mnemonic(entropy)?;
    Keys::from_mnemonic(phrase.as_str(), None)
        .map_err(|e| LoginError::InvalidKey(format!("NIP-06 derivation failed: {e}")))
}

/// Convert a hex or `npub` public key to hex
pub fn public_key_to_hex(key: &str) -> Result<String> {
    Ok(nostr::PublicKey::parse(key)?.to_hex())
}

/// Convert a hex public key to `npub`
pub fn public_key_to_npub(key: &str) -> Result<String> {
    use nostr::nips::nip19::ToBech32;

    nostr::PublicKey::parse(key)?
        .to_bech32()
        .map_err(|e| LoginError::InvalidKey(e.to_string()))
}

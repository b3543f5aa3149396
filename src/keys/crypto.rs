//! Cryptographic primitives for PIN-protected key storage.
//!
//! # Algorithms
//!
//! - **Key Generation**: secp256k1 (BIP-340 schnorr keys, as used by Nostr)
//! - **Key Derivation**: Argon2id over the user's PIN
//! - **Encryption**: ChaCha20-Poly1305 (authenticated encryption)
//!
//! # Security Parameters
//!
//! A PIN is short, so the Argon2id cost is what stands between a stolen
//! storage file and the key:
//! - 64 MB memory
//! - 3 iterations
//! - 4 parallelism threads

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use nostr::{Keys, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::types::{LoginError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Argon2id memory cost in KiB (64 MB)
pub const ARGON2_MEMORY_KB: u32 = 65536;

/// Argon2id iteration count
pub const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id parallelism (threads)
pub const ARGON2_PARALLELISM: u32 = 4;

/// Salt length for key derivation (16 bytes)
pub const SALT_LEN: usize = 16;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// secp256k1 private key length (32 bytes)
pub const PRIVATE_KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

// =============================================================================
// Key Generation
// =============================================================================

/// Generate cryptographically secure random bytes.
pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generate a new secp256k1 secret key.
///
/// Returns the raw key bytes together with the parsed key pair. Bytes
/// outside the curve order are rejected and redrawn.
pub fn generate_secret_key() -> ([u8; PRIVATE_KEY_LEN], Keys) {
    loop {
        let bytes: [u8; PRIVATE_KEY_LEN] = generate_random_bytes();
        if let Ok(secret) = SecretKey::from_slice(&bytes) {
            return (bytes, Keys::new(secret));
        }
    }
}

/// Parse a hex encoded secret key into a key pair
pub fn keys_from_hex(private_key: &str) -> Result<Keys> {
    Ok(Keys::parse(private_key)?)
}

// =============================================================================
// Key Derivation
// =============================================================================

/// Derive a 256-bit encryption key from a PIN using Argon2id.
pub fn derive_key_encryption_key(pin: &[u8], salt: &[u8]) -> Result<[u8; 32]> {
    let params = Params::new(
        ARGON2_MEMORY_KB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(32),
    )
    .map_err(|e| LoginError::Crypto(format!("Invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(pin, salt, &mut key)
        .map_err(|e| LoginError::Crypto(format!("Key derivation failed: {e}")))?;

    Ok(key)
}

// =============================================================================
// Encryption / Decryption
// =============================================================================

/// Encrypt a private key using ChaCha20-Poly1305.
///
/// Returns 48 bytes: the encrypted key followed by the auth tag.
pub fn encrypt_private_key(
    private_key: &[u8; PRIVATE_KEY_LEN],
    encryption_key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(encryption_key));
    cipher
        .encrypt(Nonce::from_slice(nonce), private_key.as_slice())
        .map_err(|e| LoginError::Crypto(format!("Encryption failed: {e}")))
}

/// Decrypt a private key using ChaCha20-Poly1305.
///
/// Fails when the auth tag does not verify, which is what a wrong PIN
/// looks like.
pub fn decrypt_private_key(
    ciphertext: &[u8],
    encryption_key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
) -> Result<[u8; PRIVATE_KEY_LEN]> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(encryption_key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| LoginError::Crypto("Failed to decrypt key (wrong PIN?)".into()))?;

    if plaintext.len() != PRIVATE_KEY_LEN {
        return Err(LoginError::Crypto(format!(
            "Invalid decrypted key length: expected {}, got {}",
            PRIVATE_KEY_LEN,
            plaintext.len()
        )));
    }

    let mut key = [0u8; PRIVATE_KEY_LEN];
    key.copy_from_slice(&plaintext);
    Ok(key)
}

// =============================================================================
// Tests
// =============================================================================

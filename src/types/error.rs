//! Error types for nostr-login
//!
//! Fetch failures surface to callers as an "offline or error" state.
//! Everything else marks a violated precondition or a broken collaborator.

/// Main error type for login and session operations
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Missing key material for session {0}")]
    MissingKeyMaterial(String),

    #[error("Missing public key for session {0}")]
    MissingPublicKey(String),

    #[error("Key is locked, unlock with PIN first")]
    KeyLocked,

    #[error("No signer available: {0}")]
    MissingSigner(String),

    #[error("Already logged in as {0}")]
    AlreadyLoggedIn(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoginError {
    /// Whether this error came from an external fetch (retryable by the user)
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Whether this error is an unrecoverable construction precondition
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingKeyMaterial(_)
                | Self::MissingPublicKey(_)
                | Self::KeyLocked
                | Self::MissingSigner(_)
        )
    }
}

impl From<std::io::Error> for LoginError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LoginError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for LoginError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

impl From<nostr::key::Error> for LoginError {
    fn from(err: nostr::key::Error) -> Self {
        Self::InvalidKey(err.to_string())
    }
}

/// Result type alias for nostr-login operations
pub type Result<T> = std::result::Result<T, LoginError>;

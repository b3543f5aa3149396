//! Signers
//!
//! A session signs events through exactly one of four methods, fixed when
//! the session is created:
//!
//! | Session type    | Signer                 | Key material            |
//! |-----------------|------------------------|-------------------------|
//! | `PrivateKey`    | [`PrivateKeySigner`]   | stored private key      |
//! | `Nip46`         | [`Nip46Signer`]        | remote bunker + local key |
//! | `Nip7`          | [`ExternalSigner`]     | browser extension       |
//! | `Nip7Os`        | [`ExternalSigner`]     | OS level signer         |
//!
//! [`dispatch::create_publisher`] picks the implementation for a session.

pub mod dispatch;
pub mod external;
pub mod nip46;
pub mod private_key;

use async_trait::async_trait;

use crate::event::{NostrEvent, UnsignedEvent};
use crate::types::Result;

pub use dispatch::{create_publisher, SignerContext};
pub use external::{ExternalOrigin, ExternalSigner, SignerProvider};
pub use nip46::{
    AuthUrlHandler, BunkerUrl, ChannelAuthUrl, LogAuthUrl, Nip46Request, Nip46Response,
    Nip46Signer, RemoteSignerTransport,
};
pub use private_key::PrivateKeySigner;

/// Capability to sign events on behalf of a public key
#[async_trait]
pub trait Signer: Send + Sync {
    /// Public key (hex) this signer signs for
    async fn get_public_key(&self) -> Result<String>;

    /// Sign an event, returning it with id and signature attached
    async fn sign(&self, event: UnsignedEvent) -> Result<NostrEvent>;
}

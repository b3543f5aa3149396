//! nostr-login - Login sessions for Nostr clients
//!
//! Keeps the local state of every logged-in identity and turns it into
//! something that can sign events.
//!
//! ## Modules
//!
//! - **Versioned**: last-write-wins fields keyed by event `created_at`
//! - **Session**: the session store and its persistence
//! - **Signer**: private key, NIP-46 bunker, NIP-07 extension and OS signers
//! - **Login**: relay lists, muted/pinned/bookmarked lists, app data, logout
//!   and new-account bootstrap
//! - **External**: nearby relay directory and nostr.band suggestions
//! - **Rates**: exchange rate events

pub mod cache;
pub mod config;
pub mod event;
pub mod external;
pub mod keys;
pub mod login;
pub mod publisher;
pub mod rates;
pub mod relay;
pub mod session;
pub mod signer;
pub mod system;
pub mod types;
pub mod versioned;

pub use config::{Args, ClientConfig};
pub use session::{LoginSession, LoginSessionType, LoginStore};
pub use types::{LoginError, Result};

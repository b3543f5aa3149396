//! Third-party HTTP APIs
//!
//! - **Snort API**: nearby relays for new accounts
//! - **nostr.band**: suggested profiles and trending notes
//!
//! Both go through [`CachedFetch`] so repeated views do not refetch.

pub mod fetch;
pub mod nostr_band;
pub mod snort_api;

pub use fetch::CachedFetch;
pub use nostr_band::NostrBandApi;
pub use snort_api::{pick_close_relays, CloseRelay, RelayDirectory, SnortApi};

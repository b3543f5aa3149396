//! Login operations
//!
//! Free functions over a [`LoginStore`] and the session being changed.
//! Each accepted mutation is written back through the store; rejected
//! last-write-wins updates leave both the session and storage untouched.

use std::future::Future;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::GiftsCache;
use crate::config::ClientConfig;
use crate::event::{unix_now_ms, NostrEvent, Tag};
use crate::external::{pick_close_relays, RelayDirectory};
use crate::keys::{
    entropy_to_keys, generate_bip39_entropy, public_key_to_hex, KeyStorage,
};
use crate::publisher::{EventPublisher, UserMetadata};
use crate::relay::{filter_websocket_relays, RelayMap, RelaySettings};
use crate::session::{LoginSession, LoginStore, SubscriptionEvent};
use crate::system::SystemInterface;
use crate::types::Result;
use crate::versioned::ListField;

pub use crate::keys::generate_random_key;
pub use crate::signer::create_publisher;

/// Storage key of the referral code
pub const REF_CODE_KEY: &str = "refCode";

/// Timestamp the single-relay override is pinned at
const SINGLE_RELAY_TIMESTAMP: u64 = 100;

/// Approximate location used to pick nearby relays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoHint {
    pub lat: f64,
    pub lon: f64,
}

// =============================================================================
// Relays
// =============================================================================

/// Replace the relay list if `created_at` is newer than the stored one.
///
/// With a single-relay override configured the list is pinned to that relay
/// whatever the input. Otherwise non-websocket URLs are dropped and the rest
/// normalized.
pub fn set_relays(
    store: &LoginStore,
    config: &ClientConfig,
    state: &mut LoginSession,
    relays: &RelayMap,
    created_at: u64,
) -> Result<bool> {
    if let Some(ref single) = config.single_relay {
        let pinned: RelayMap = [(single.clone(), RelaySettings::read_write())]
            .into_iter()
            .collect();
        return apply(store, state, |s| {
            s.relays.force(pinned, SINGLE_RELAY_TIMESTAMP);
            true
        });
    }

    apply(store, state, |s| {
        if s.relays.timestamp >= created_at {
            return false;
        }
        let filtered = filter_websocket_relays(relays);
        debug!(id = %s.id, kept = filtered.len(), offered = relays.len(), "Updating relays");
        s.relays.update(filtered, created_at)
    })
}

/// Remove one relay from the list
pub fn remove_relay(store: &LoginStore, state: &mut LoginSession, addr: &str) -> Result<()> {
    apply(store, state, |s| s.relays.item.remove(addr).is_some())?;
    Ok(())
}

// =============================================================================
// Versioned lists
// =============================================================================

/// Last-write-wins update of a list field
pub fn set_list(
    store: &LoginStore,
    state: &mut LoginSession,
    field: ListField,
    items: Vec<String>,
    ts: u64,
) -> Result<bool> {
    apply(store, state, |s| {
        let updated = s.list_mut(field).update(items, ts);
        if updated {
            debug!(id = %s.id, field = %field, ts, "Updated list");
        }
        updated
    })
}

pub fn set_tags(store: &LoginStore, state: &mut LoginSession, tags: Vec<String>, ts: u64) -> Result<bool> {
    set_list(store, state, ListField::Tags, tags, ts)
}

pub fn set_muted(store: &LoginStore, state: &mut LoginSession, muted: Vec<String>, ts: u64) -> Result<bool> {
    set_list(store, state, ListField::Muted, muted, ts)
}

pub fn set_blocked(store: &LoginStore, state: &mut LoginSession, blocked: Vec<String>, ts: u64) -> Result<bool> {
    set_list(store, state, ListField::Blocked, blocked, ts)
}

pub fn set_pinned(store: &LoginStore, state: &mut LoginSession, pinned: Vec<String>, ts: u64) -> Result<bool> {
    set_list(store, state, ListField::Pinned, pinned, ts)
}

pub fn set_bookmarked(
    store: &LoginStore,
    state: &mut LoginSession,
    bookmarked: Vec<String>,
    ts: u64,
) -> Result<bool> {
    set_list(store, state, ListField::Bookmarked, bookmarked, ts)
}

// =============================================================================
// Session housekeeping
// =============================================================================

/// Log out `id`: drop the session, gift cache, referral code and local
/// storage. Other sessions are written back after the wipe.
pub fn logout(store: &LoginStore, gifts: &GiftsCache, id: &str) -> Result<()> {
    store.remove_session(id)?;
    gifts.clear();

    let storage = store.storage();
    storage.remove(REF_CODE_KEY)?;
    storage.clear()?;
    store.persist()?;

    info!(id = %id, remaining = store.len(), "Logged out");
    Ok(())
}

/// Mark every notification up to now as read
pub fn mark_notifications_read(store: &LoginStore, state: &mut LoginSession) -> Result<()> {
    let now = unix_now_ms();
    apply(store, state, |s| {
        s.read_notifications = now;
        true
    })?;
    Ok(())
}

/// Forget the generated entropy once the user has backed it up
pub fn clear_entropy(store: &LoginStore, state: &mut LoginSession) -> Result<()> {
    apply(store, state, |s| s.generated_entropy.take().is_some())?;
    Ok(())
}

/// Apply `f` to a stored session and persist. Unknown ids are ignored.
pub fn update_session<F>(store: &LoginStore, id: &str, f: F) -> Result<()>
where
    F: FnOnce(&mut LoginSession),
{
    store.modify(id, |s| {
        f(s);
        true
    })?;
    Ok(())
}

/// Add subscriptions, keeping the first record per id. Persists only when
/// something new was added.
pub fn add_subscription(
    store: &LoginStore,
    state: &mut LoginSession,
    subs: impl IntoIterator<Item = SubscriptionEvent>,
) -> Result<bool> {
    apply(store, state, |s| {
        let before = s.subscriptions.len();
        for sub in subs {
            if !s.subscriptions.iter().any(|existing| existing.id == sub.id) {
                s.subscriptions.push(sub);
            }
        }
        s.subscriptions.len() != before
    })
}

/// Whether the session's key must be unlocked with a PIN first
pub fn session_needs_pin(state: &LoginSession) -> bool {
    state.needs_pin()
}

/// Run `f` against the stored copy of `state` and refresh `state` from it.
/// A session missing from the store is left untouched.
fn apply<F>(store: &LoginStore, state: &mut LoginSession, f: F) -> Result<bool>
where
    F: FnOnce(&mut LoginSession) -> bool,
{
    match store.modify(&state.id, f)? {
        Some((changed, current)) => {
            *state = current;
            Ok(changed)
        }
        None => Ok(false),
    }
}

// =============================================================================
// App data
// =============================================================================

/// Publish new app data for the session and store it.
///
/// Does nothing when no publisher can be found for the session.
pub async fn set_app_data(
    store: &LoginStore,
    config: &ClientConfig,
    system: &dyn SystemInterface,
    state: &mut LoginSession,
    data: serde_json::Value,
) -> Result<bool> {
    let Some(publisher) = store.get_publisher(&state.id)? else {
        return Ok(false);
    };

    let ev = publisher.app_data(&config.app_name, &data).await?;
    system.broadcast_event(&ev).await?;

    // Our own write is the newest; equal seconds still replace
    apply(store, state, |s| {
        if ev.created_at < s.app_data.timestamp {
            return false;
        }
        s.app_data.force(data, ev.created_at);
        true
    })
}

/// Transform the stored app data of `id` and publish the result
pub async fn update_app_data<F>(
    store: &LoginStore,
    config: &ClientConfig,
    system: &dyn SystemInterface,
    id: &str,
    f: F,
) -> Result<bool>
where
    F: FnOnce(serde_json::Value) -> serde_json::Value,
{
    let Some(mut session) = store.get(id) else {
        return Ok(false);
    };
    let next = f(session.app_data.item.clone());
    set_app_data(store, config, system, &mut session, next).await
}

// =============================================================================
// Account bootstrap
// =============================================================================

/// Create a brand new account and log in with it.
///
/// Picks nearby relays (when a location is known) plus the configured
/// defaults, connects to all of them, publishes contact list, relay list and
/// profile, and stores the session with the key wrapped by `wrap_key`.
/// Returns the new session id.
pub async fn generate_new_login<W, Fut>(
    store: &LoginStore,
    config: &ClientConfig,
    system: &dyn SystemInterface,
    directory: &dyn RelayDirectory,
    location: Option<GeoHint>,
    profile: &UserMetadata,
    wrap_key: W,
) -> Result<String>
where
    W: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<KeyStorage>>,
{
    let entropy = generate_bip39_entropy();
    let keys = entropy_to_keys(entropy.as_slice())?;

    let mut relays = RelayMap::new();
    if let Some(GeoHint { lat, lon }) = location {
        match directory.close_relays(lat, lon, 20).await {
            Ok(close) => {
                for url in pick_close_relays(close, config.close_relay_count) {
                    relays.insert(url, RelaySettings::read_write());
                }
            }
            Err(e) => warn!(error = %e, "Close relay lookup failed, using defaults only"),
        }
    }
    for (url, settings) in &config.default_relays {
        relays.entry(url.clone()).or_insert(*settings);
    }

    connect_all(system, &relays).await;

    let publisher = EventPublisher::private_key(keys.clone());
    let pubkey = publisher.pubkey().to_string();

    let mut follows: Vec<Tag> = vec![vec!["p".to_string(), pubkey.clone()]];
    for follow in &config.default_follows {
        match public_key_to_hex(follow) {
            Ok(hex) => follows.push(vec!["p".to_string(), hex]),
            Err(e) => warn!(follow = %follow, error = %e, "Skipping bad default follow"),
        }
    }

    let contacts = publisher.contact_list(follows, &relays).await?;
    broadcast(system, &contacts).await;

    let relay_list = publisher.relay_list(&relays).await?;
    broadcast(system, &relay_list).await;
    write_to_blasters(system, &config.blasters, &relay_list).await;

    let metadata = publisher.metadata(profile).await?;
    broadcast(system, &metadata).await;
    write_to_blasters(system, &config.blasters, &metadata).await;

    let private_key = keys.secret_key().to_secret_hex();
    let key = wrap_key(private_key).await?;
    let id = store.login_with_private_key(key, Some(hex::encode(entropy.as_slice())), Some(relays))?;

    info!(id = %id, "Generated new login");
    Ok(id)
}

/// Connect to every relay at once. Failures are logged, not fatal.
pub async fn connect_all(system: &dyn SystemInterface, relays: &RelayMap) {
    let results = join_all(
        relays
            .iter()
            .map(|(url, settings)| async move { (url, system.connect_to_relay(url, *settings).await) }),
    )
    .await;

    for (url, result) in results {
        if let Err(e) = result {
            warn!(relay = %url, error = %e, "Relay connection failed");
        }
    }
}

/// Deliver an event once to each blaster relay concurrently.
/// One failing relay does not affect the others.
pub async fn write_to_blasters(system: &dyn SystemInterface, blasters: &[String], event: &NostrEvent) {
    let results = join_all(
        blasters
            .iter()
            .map(|url| async move { (url, system.write_once_to_relay(url, event).await) }),
    )
    .await;

    for (url, result) in results {
        if let Err(e) = result {
            warn!(relay = %url, event = %event.id, error = %e, "Blaster write failed");
        }
    }
}

async fn broadcast(system: &dyn SystemInterface, event: &NostrEvent) {
    if let Err(e) = system.broadcast_event(event).await {
        warn!(event = %event.id, kind = event.kind, error = %e, "Broadcast failed");
    }
}

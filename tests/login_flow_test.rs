//! Login flow integration tests: account bootstrap, LWW merging, app data
//! and logout against in-memory collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use nostr_login::cache::GiftsCache;
use nostr_login::config::ClientConfig;
use nostr_login::event::{kind, NostrEvent};
use nostr_login::external::{CloseRelay, RelayDirectory};
use nostr_login::keys::{entropy_to_keys, generate_random_key, public_key_to_hex, KeyStorage};
use nostr_login::login::{self, GeoHint};
use nostr_login::publisher::UserMetadata;
use nostr_login::relay::{RelayMap, RelaySettings};
use nostr_login::session::{LoginSessionType, LoginStore, MemoryStorage};
use nostr_login::system::{RecordingSystem, SystemInterface};
use nostr_login::{LoginError, Result};

struct FixedDirectory(Vec<CloseRelay>);

#[async_trait]
impl RelayDirectory for FixedDirectory {
    async fn close_relays(&self, _lat: f64, _lon: f64, count: usize) -> Result<Vec<CloseRelay>> {
        assert_eq!(count, 20);
        Ok(self.0.clone())
    }
}

struct OfflineDirectory;

#[async_trait]
impl RelayDirectory for OfflineDirectory {
    async fn close_relays(&self, _lat: f64, _lon: f64, _count: usize) -> Result<Vec<CloseRelay>> {
        Err(LoginError::Fetch("offline".into()))
    }
}

/// Runtime where every relay operation fails
#[derive(Default)]
struct BrokenSystem {
    attempts: Mutex<usize>,
}

#[async_trait]
impl SystemInterface for BrokenSystem {
    async fn connect_to_relay(&self, address: &str, _settings: RelaySettings) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(LoginError::Relay(format!("{address} unreachable")))
    }

    async fn broadcast_event(&self, _event: &NostrEvent) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(LoginError::Relay("no relays".into()))
    }

    async fn write_once_to_relay(&self, address: &str, _event: &NostrEvent) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(LoginError::Relay(format!("{address} unreachable")))
    }
}

fn close_relay(url: &str, distance: f64, is_paid: bool) -> CloseRelay {
    CloseRelay {
        url: url.into(),
        distance,
        is_paid,
        users: None,
        country: None,
    }
}

fn store() -> LoginStore {
    LoginStore::new(Arc::new(MemoryStorage::new()))
}

fn profile() -> UserMetadata {
    UserMetadata {
        name: Some("satoshi".into()),
        ..Default::default()
    }
}

async fn plain_key(key: String) -> Result<KeyStorage> {
    Ok(KeyStorage::plain(key))
}

#[tokio::test]
async fn test_generate_new_login_publishes_account() {
    let store = store();
    let config = ClientConfig::default();
    let system = RecordingSystem::new();
    let directory = FixedDirectory(vec![
        close_relay("wss://near.example", 5.0, false),
        close_relay("wss://paid.example", 1.0, true),
        close_relay("wss://nos.lol", 50.0, false),
    ]);

    let id = login::generate_new_login(
        &store,
        &config,
        &system,
        &directory,
        Some(GeoHint { lat: 51.5, lon: -0.1 }),
        &profile(),
        plain_key,
    )
    .await
    .unwrap();

    assert_eq!(store.active().as_deref(), Some(id.as_str()));
    let session = store.get(&id).unwrap();
    assert_eq!(session.session_type, LoginSessionType::PrivateKey);

    // Key derives from the stored entropy
    let entropy = hex::decode(session.generated_entropy.as_deref().unwrap()).unwrap();
    assert_eq!(entropy_to_keys(&entropy).unwrap().public_key().to_hex(), id);

    // Nearby free relays plus defaults, without duplicates
    let relays = &session.relays.item;
    assert!(relays.contains_key("wss://near.example/"));
    assert!(!relays.contains_key("wss://paid.example/"));
    assert_eq!(relays.len(), config.default_relays.len() + 1);
    assert_eq!(session.relays.timestamp, 1);
    assert_eq!(system.connected(), *relays);

    let broadcast = system.broadcast();
    let kinds: Vec<u16> = broadcast.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![kind::CONTACT_LIST, kind::RELAY_LIST, kind::METADATA]);
    assert!(broadcast.iter().all(|e| e.pubkey == id && e.verify().is_ok()));

    let contacts = &broadcast[0];
    assert!(contacts.tags.contains(&vec!["p".to_string(), id.clone()]));
    let default_follow = public_key_to_hex(&config.default_follows[0]).unwrap();
    assert!(contacts.tags.contains(&vec!["p".to_string(), default_follow]));

    // Relay list and profile also go to every blaster
    let written = system.written();
    assert_eq!(written.len(), 2 * config.blasters.len());
    assert!(written.iter().all(|(url, _)| config.blasters.contains(url)));
}

#[tokio::test]
async fn test_generate_new_login_survives_relay_failures() {
    let store = store();
    let config = ClientConfig::default();
    let system = BrokenSystem::default();

    let id = login::generate_new_login(
        &store,
        &config,
        &system,
        &OfflineDirectory,
        Some(GeoHint { lat: 0.0, lon: 0.0 }),
        &profile(),
        plain_key,
    )
    .await
    .unwrap();

    assert_eq!(store.get(&id).unwrap().relays.item, config.default_relays);
    let expected = config.default_relays.len() + 3 + 2 * config.blasters.len();
    assert_eq!(*system.attempts.lock().unwrap(), expected);
}

#[tokio::test]
async fn test_generate_new_login_with_pin() {
    let store = store();
    let config = ClientConfig::default();
    let system = RecordingSystem::new();

    let id = login::generate_new_login(
        &store,
        &config,
        &system,
        &OfflineDirectory,
        None,
        &profile(),
        |key| async move { KeyStorage::with_pin(&key, "4321") },
    )
    .await
    .unwrap();

    let session = store.get(&id).unwrap();
    assert!(matches!(
        session.private_key_data,
        Some(KeyStorage::PinEncrypted { .. })
    ));
    assert!(!login::session_needs_pin(&session));

    let reloaded = LoginStore::load(store.storage().clone()).unwrap();
    assert!(login::session_needs_pin(&reloaded.get(&id).unwrap()));
}

#[tokio::test]
async fn test_relay_list_event_beats_login_relays() {
    let store = store();
    let config = ClientConfig::default();
    let key = generate_random_key();
    let id = store
        .login_with_private_key(
            KeyStorage::plain(key.private_key),
            None,
            Some(config.default_relays.clone()),
        )
        .unwrap();

    let mut session = store.get(&id).unwrap();
    let mut from_event = RelayMap::new();
    from_event.insert("wss://mine.example".into(), RelaySettings::read_write());

    assert!(login::set_relays(&store, &config, &mut session, &from_event, 1_700_000_000).unwrap());
    let stored = store.get(&id).unwrap();
    assert_eq!(stored.relays.item.len(), 1);
    assert!(stored.relays.item.contains_key("wss://mine.example/"));
}

#[test]
fn test_final_value_has_max_timestamp() {
    let updates = [
        (vec!["a".to_string()], 30),
        (vec!["b".to_string()], 10),
        (vec!["c".to_string()], 50),
        (vec!["d".to_string()], 20),
    ];
    let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]];

    for order in orders {
        let store = store();
        let key = generate_random_key();
        let id = store
            .login_with_pubkey(&key.public_key, LoginSessionType::Nip7, None, None, None)
            .unwrap();
        let mut session = store.get(&id).unwrap();

        for i in order {
            let (items, ts) = updates[i].clone();
            login::set_pinned(&store, &mut session, items, ts).unwrap();
        }

        let stored = store.get(&id).unwrap();
        assert_eq!(stored.pinned.item, vec!["c".to_string()]);
        assert_eq!(stored.pinned.timestamp, 50);
    }
}

#[test]
fn test_lists_are_independent() {
    let store = store();
    let key = generate_random_key();
    let id = store
        .login_with_pubkey(&key.public_key, LoginSessionType::Nip46, None, None, None)
        .unwrap();
    let mut session = store.get(&id).unwrap();

    assert!(login::set_tags(&store, &mut session, vec!["nostr".into()], 100).unwrap());
    assert!(login::set_blocked(&store, &mut session, vec!["spam".into()], 50).unwrap());
    assert!(login::set_bookmarked(&store, &mut session, vec!["note1".into()], 10).unwrap());
    assert!(!login::set_tags(&store, &mut session, vec!["old".into()], 50).unwrap());

    let stored = store.get(&id).unwrap();
    assert_eq!(stored.tags.item, vec!["nostr".to_string()]);
    assert_eq!(stored.blocked.timestamp, 50);
    assert_eq!(stored.bookmarked.timestamp, 10);
    assert!(stored.muted.item.is_empty());
}

#[tokio::test]
async fn test_app_data_published_and_stored() {
    let store = store();
    let config = ClientConfig::default();
    let system = RecordingSystem::new();
    let key = generate_random_key();
    let id = store
        .login_with_private_key(KeyStorage::plain(key.private_key), None, None)
        .unwrap();

    let mut session = store.get(&id).unwrap();
    let data = serde_json::json!({"theme": "dark"});
    assert!(login::set_app_data(&store, &config, &system, &mut session, data.clone())
        .await
        .unwrap());

    let ev = &system.broadcast()[0];
    assert_eq!(ev.kind, kind::APP_DATA);
    assert_eq!(ev.tag_value("d"), Some(config.app_name.as_str()));

    let stored = store.get(&id).unwrap();
    assert_eq!(stored.app_data.item, data);
    assert_eq!(stored.app_data.timestamp, ev.created_at);

    assert!(login::update_app_data(&store, &config, &system, &id, |mut v| {
        v["lang"] = "en".into();
        v
    })
    .await
    .unwrap());
    assert_eq!(store.get(&id).unwrap().app_data.item["lang"], "en");
    assert_eq!(system.broadcast().len(), 2);
}

#[tokio::test]
async fn test_app_data_for_removed_session_is_noop() {
    let store = store();
    let config = ClientConfig::default();
    let system = RecordingSystem::new();
    let key = generate_random_key();
    let id = store
        .login_with_private_key(KeyStorage::plain(key.private_key), None, None)
        .unwrap();

    let mut session = store.get(&id).unwrap();
    store.remove_session(&id).unwrap();

    let changed = login::set_app_data(&store, &config, &system, &mut session, serde_json::json!(1))
        .await
        .unwrap();
    assert!(!changed);
    assert!(system.broadcast().is_empty());
}

#[test]
fn test_logout_keeps_other_sessions() {
    let store = store();
    let gifts = GiftsCache::new();
    let a = generate_random_key();
    let b = generate_random_key();

    let id_a = store
        .login_with_private_key(KeyStorage::plain(a.private_key), None, None)
        .unwrap();
    let id_b = store
        .login_with_pubkey(&b.public_key, LoginSessionType::Nip7, None, None, None)
        .unwrap();
    assert_eq!(store.active().as_deref(), Some(id_b.as_str()));
    store.get_publisher(&id_a).unwrap();

    login::logout(&store, &gifts, &id_b).unwrap();

    assert!(store.get(&id_b).is_none());
    assert_eq!(store.active().as_deref(), Some(id_a.as_str()));

    // Wiped storage still holds the surviving session
    let reloaded = LoginStore::load(store.storage().clone()).unwrap();
    assert!(reloaded.get(&id_a).is_some());
    assert!(reloaded.get(&id_b).is_none());

    login::logout(&store, &gifts, &id_a).unwrap();
    assert!(store.is_empty());
    assert!(store.active().is_none());
    assert!(store.get_publisher(&id_a).unwrap().is_none());
}

#[test]
fn test_stale_copy_cannot_roll_back_stored_session() {
    let store = store();
    let key = generate_random_key();
    let id = store
        .login_with_pubkey(&key.public_key, LoginSessionType::Nip7, None, None, None)
        .unwrap();
    let mut a = store.get(&id).unwrap();
    let mut b = store.get(&id).unwrap();

    assert!(login::set_muted(&store, &mut a, vec!["new".into()], 200).unwrap());
    assert!(!login::set_muted(&store, &mut b, vec!["old".into()], 150).unwrap());
    assert_eq!(store.get(&id).unwrap().muted.timestamp, 200);

    // An unrelated write through the stale copy keeps the newer list
    assert!(login::set_tags(&store, &mut b, vec!["nostr".into()], 10).unwrap());
    let stored = store.get(&id).unwrap();
    assert_eq!(stored.muted.item, vec!["new".to_string()]);
    assert_eq!(stored.muted.timestamp, 200);
    assert_eq!(b.muted.timestamp, 200);
    assert_eq!(b.tags.timestamp, 10);
}

#[test]
fn test_write_from_locked_copy_keeps_key_unlocked() {
    let store = store();
    let key = generate_random_key();
    let wrapped = KeyStorage::with_pin(&key.private_key, "1234").unwrap();
    let id = store.login_with_private_key(wrapped, None, None).unwrap();

    let reloaded = LoginStore::load(store.storage().clone()).unwrap();
    let mut locked = reloaded.get(&id).unwrap();
    assert!(login::session_needs_pin(&locked));

    reloaded.unlock(&id, "1234").unwrap();
    login::mark_notifications_read(&reloaded, &mut locked).unwrap();

    assert!(!login::session_needs_pin(&reloaded.get(&id).unwrap()));
    assert!(!login::session_needs_pin(&locked));
    assert!(reloaded.get_publisher(&id).unwrap().is_some());
}

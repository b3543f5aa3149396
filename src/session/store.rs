//! Login Session Store
//!
//! Explicit registry of logged-in identities. Every accepted mutation is
//! written back to local storage; publishers are built on first use and
//! cached until the session goes away.

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::storage::KeyValueStorage;
use super::{LoginSession, LoginSessionType};
use crate::keys::{public_key_to_hex, KeyStorage};
use crate::publisher::EventPublisher;
use crate::relay::RelayMap;
use crate::signer::{create_publisher, SignerContext};
use crate::types::{LoginError, Result};
use crate::versioned::Versioned;

/// Storage key holding the serialized sessions
pub const SESSIONS_KEY: &str = "sessions";

/// Storage key holding the active session id
pub const ACTIVE_KEY: &str = "activeSession";

/// Timestamp given to relays chosen at login, so any relay list event wins
const LOGIN_RELAYS_TIMESTAMP: u64 = 1;

/// Registry of login sessions
pub struct LoginStore {
    /// Sessions by id (hex pubkey)
    sessions: DashMap<String, LoginSession>,

    /// Publishers built for sessions
    publishers: DashMap<String, Arc<EventPublisher>>,

    /// Currently selected session
    active: RwLock<Option<String>>,

    /// Collaborators needed to build signers
    signer_context: SignerContext,

    storage: Arc<dyn KeyValueStorage>,
}

impl LoginStore {
    /// Create an empty store
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            sessions: DashMap::new(),
            publishers: DashMap::new(),
            active: RwLock::new(None),
            signer_context: SignerContext::default(),
            storage,
        }
    }

    /// Create a store populated from storage
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let store = Self::new(storage);

        if let Some(raw) = store.storage.get(SESSIONS_KEY)? {
            let sessions: Vec<LoginSession> = serde_json::from_str(&raw)?;
            for session in sessions {
                store.sessions.insert(session.id.clone(), session);
            }
        }

        let active = store
            .storage
            .get(ACTIVE_KEY)?
            .filter(|id| store.sessions.contains_key(id));
        *store.active.write().unwrap_or_else(PoisonError::into_inner) = active;

        info!(sessions = store.sessions.len(), "Loaded login sessions");
        Ok(store)
    }

    /// Attach the collaborators used to build signers
    pub fn with_signer_context(mut self, context: SignerContext) -> Self {
        self.signer_context = context;
        self
    }

    pub fn signer_context(&self) -> &SignerContext {
        &self.signer_context
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Log in with a private key; returns the new session id
    pub fn login_with_private_key(
        &self,
        key: KeyStorage,
        entropy: Option<String>,
        relays: Option<RelayMap>,
    ) -> Result<String> {
        let pubkey = key.keys()?.public_key().to_hex();
        if self.sessions.contains_key(&pubkey) {
            return Err(LoginError::AlreadyLoggedIn(pubkey));
        }

        let mut session = LoginSession::new(pubkey.clone(), LoginSessionType::PrivateKey);
        session.private_key_data = Some(key);
        session.generated_entropy = entropy;
        if let Some(relays) = relays {
            session.relays = Versioned::new(relays, LOGIN_RELAYS_TIMESTAMP);
        }

        self.insert_new(session)?;
        Ok(pubkey)
    }

    /// Log in with an externally held key (bunker, extension, OS signer)
    pub fn login_with_pubkey(
        &self,
        pubkey: &str,
        session_type: LoginSessionType,
        relays: Option<RelayMap>,
        remote_signer_relays: Option<Vec<String>>,
        client_key: Option<KeyStorage>,
    ) -> Result<String> {
        if !session_type.is_external() {
            return Err(LoginError::Config(
                "Private key sessions must log in with the key".into(),
            ));
        }

        let pubkey = public_key_to_hex(pubkey)?;
        if self.sessions.contains_key(&pubkey) {
            return Err(LoginError::AlreadyLoggedIn(pubkey));
        }

        let mut session = LoginSession::new(pubkey.clone(), session_type);
        session.private_key_data = client_key;
        session.remote_signer_relays = remote_signer_relays;
        if let Some(relays) = relays {
            session.relays = Versioned::new(relays, LOGIN_RELAYS_TIMESTAMP);
        }

        self.insert_new(session)?;
        Ok(pubkey)
    }

    fn insert_new(&self, session: LoginSession) -> Result<()> {
        let id = session.id.clone();
        info!(id = %id, session_type = ?session.session_type, "Created login session");

        self.sessions.insert(id.clone(), session);
        self.set_active_unchecked(Some(id));
        self.persist()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Snapshot of a session
    pub fn get(&self, id: &str) -> Option<LoginSession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// All sessions ordered by id
    pub fn list(&self) -> Vec<LoginSession> {
        let mut sessions: Vec<LoginSession> = self.sessions.iter().map(|s| s.clone()).collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Currently selected session id
    pub fn active(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Select the active session
    pub fn switch_account(&self, id: &str) -> Result<()> {
        if !self.sessions.contains_key(id) {
            return Err(LoginError::Config(format!("Unknown session {id}")));
        }
        self.set_active_unchecked(Some(id.to_string()));
        self.storage.set(ACTIVE_KEY, id.to_string())
    }

    fn set_active_unchecked(&self, id: Option<String>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = id;
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Mutate the stored session in place and persist if `f` reports a
    /// change. Returns whether it changed and a fresh snapshot, or `None`
    /// for an unknown id (removed sessions are not resurrected).
    ///
    /// Checks made inside `f` see the stored state, never a caller's stale
    /// copy.
    pub fn modify<F>(&self, id: &str, f: F) -> Result<Option<(bool, LoginSession)>>
    where
        F: FnOnce(&mut LoginSession) -> bool,
    {
        // Guard must be released before persist() iterates the map
        let (changed, snapshot) = {
            let Some(mut entry) = self.sessions.get_mut(id) else {
                warn!(id = %id, "Ignoring update for unknown session");
                return Ok(None);
            };
            let changed = f(&mut entry);
            (changed, entry.clone())
        };

        if changed {
            debug!(id = %id, "Updated session");
            self.persist()?;
        }
        Ok(Some((changed, snapshot)))
    }

    /// Unlock the PIN protected key of a stored session
    pub fn unlock(&self, id: &str, pin: &str) -> Result<()> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| LoginError::Config(format!("Unknown session {id}")))?;
        let key = entry
            .private_key_data
            .as_mut()
            .ok_or_else(|| LoginError::MissingKeyMaterial(id.to_string()))?;
        key.unlock(pin)
    }

    /// Remove a session and everything cached for it
    pub fn remove_session(&self, id: &str) -> Result<Option<LoginSession>> {
        let removed = self.sessions.remove(id).map(|(_, s)| s);
        self.publishers.remove(id);

        if removed.is_some() {
            info!(id = %id, "Removed login session");
            if self.active().as_deref() == Some(id) {
                let next = self.list().into_iter().next().map(|s| s.id);
                self.set_active_unchecked(next);
            }
            self.persist()?;
        }
        Ok(removed)
    }

    /// Publisher for a session, built on first use
    pub fn get_publisher(&self, id: &str) -> Result<Option<Arc<EventPublisher>>> {
        if let Some(publisher) = self.publishers.get(id) {
            return Ok(Some(publisher.clone()));
        }

        let Some(session) = self.get(id) else {
            return Ok(None);
        };

        let publisher = Arc::new(create_publisher(&session, &self.signer_context)?);
        self.publishers.insert(id.to_string(), publisher.clone());
        Ok(Some(publisher))
    }

    /// Write all sessions to storage
    pub fn persist(&self) -> Result<()> {
        let sessions = self.list();
        self.storage
            .set(SESSIONS_KEY, serde_json::to_string(&sessions)?)?;
        match self.active() {
            Some(id) => self.storage.set(ACTIVE_KEY, id),
            None => self.storage.remove(ACTIVE_KEY),
        }
    }

    pub fn stats(&self) -> SessionStoreStats {
        let sessions = self.list();
        SessionStoreStats {
            total_sessions: sessions.len(),
            locked_sessions: sessions.iter().filter(|s| s.needs_pin()).count(),
            external_sessions: sessions
                .iter()
                .filter(|s| s.session_type.is_external())
                .count(),
        }
    }
}

/// Session store statistics
#[derive(Debug, Clone, Serialize)]
pub struct SessionStoreStats {
    pub total_sessions: usize,
    pub locked_sessions: usize,
    pub external_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_random_key;
    use crate::session::MemoryStorage;

    fn store() -> (LoginStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (LoginStore::new(storage.clone()), storage)
    }

    #[test]
    fn test_login_and_reload() {
        let (store, storage) = store();
        let key = generate_random_key();

        let id = store
            .login_with_private_key(KeyStorage::plain(key.private_key.clone()), None, None)
            .unwrap();
        assert_eq!(id, key.public_key);
        assert_eq!(store.active().as_deref(), Some(id.as_str()));

        let reloaded = LoginStore::load(storage).unwrap();
        let session = reloaded.get(&id).unwrap();
        assert_eq!(session.session_type, LoginSessionType::PrivateKey);
        assert_eq!(reloaded.active().as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_duplicate_login_rejected() {
        let (store, _) = store();
        let key = generate_random_key();

        store
            .login_with_private_key(KeyStorage::plain(key.private_key.clone()), None, None)
            .unwrap();
        let again = store.login_with_private_key(KeyStorage::plain(key.private_key), None, None);
        assert!(matches!(again, Err(LoginError::AlreadyLoggedIn(_))));
    }

    #[test]
    fn test_update_does_not_resurrect() {
        let (store, _) = store();
        let key = generate_random_key();
        let id = store
            .login_with_pubkey(&key.public_key, LoginSessionType::Nip7, None, None, None)
            .unwrap();

        store.remove_session(&id).unwrap();

        let result = store
            .modify(&id, |s| {
                s.read_notifications = 42;
                true
            })
            .unwrap();
        assert!(result.is_none());
        assert!(store.get(&id).is_none());
        assert!(store.active().is_none());
    }

    #[test]
    fn test_modify_keeps_unlocked_key() {
        let (store, _) = store();
        let key = generate_random_key();
        let wrapped = KeyStorage::with_pin(&key.private_key, "1234").unwrap();
        let id = store.login_with_private_key(wrapped, None, None).unwrap();

        let stale = store.get(&id).unwrap();
        store.sessions.get_mut(&id).unwrap().private_key_data.as_mut().unwrap().lock();
        store.unlock(&id, "1234").unwrap();

        let (changed, fresh) = store
            .modify(&stale.id, |s| {
                s.read_notifications = 1;
                true
            })
            .unwrap()
            .unwrap();
        assert!(changed);
        assert!(!fresh.needs_pin());
        assert!(!store.get(&id).unwrap().needs_pin());
    }

    #[test]
    fn test_unchanged_modify_skips_persist() {
        let (store, storage) = store();
        let key = generate_random_key();
        let id = store
            .login_with_pubkey(&key.public_key, LoginSessionType::Nip7, None, None, None)
            .unwrap();
        storage.remove(SESSIONS_KEY).unwrap();

        let (changed, _) = store.modify(&id, |_| false).unwrap().unwrap();
        assert!(!changed);
        assert!(storage.get(SESSIONS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_external_login_rejects_private_key_type() {
        let (store, _) = store();
        let key = generate_random_key();
        let result = store.login_with_pubkey(
            &key.public_key,
            LoginSessionType::PrivateKey,
            None,
            None,
            None,
        );
        assert!(matches!(result, Err(LoginError::Config(_))));
    }

    #[test]
    fn test_login_relays_lose_to_any_relay_list() {
        let (store, _) = store();
        let key = generate_random_key();
        let mut relays = RelayMap::new();
        relays.insert("wss://nos.lol/".into(), Default::default());

        let id = store
            .login_with_private_key(KeyStorage::plain(key.private_key), None, Some(relays))
            .unwrap();
        let session = store.get(&id).unwrap();
        assert_eq!(session.relays.timestamp, LOGIN_RELAYS_TIMESTAMP);
        assert_eq!(session.relays.item.len(), 1);
    }
}

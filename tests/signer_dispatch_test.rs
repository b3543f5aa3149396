//! Signer dispatch integration tests
//!
//! Every session type must yield a publisher whose pubkey matches the
//! session, or fail with a precondition error when its signer is missing.

use std::sync::Arc;

use async_trait::async_trait;

use nostr_login::event::{kind, NostrEvent, UnsignedEvent};
use nostr_login::keys::{generate_random_key, GeneratedKey, KeyStorage};
use nostr_login::session::{LoginSession, LoginSessionType, LoginStore, MemoryStorage};
use nostr_login::signer::{
    create_publisher, BunkerUrl, Nip46Request, Nip46Response, PrivateKeySigner,
    RemoteSignerTransport, SignerContext, SignerProvider,
};
use nostr_login::{LoginError, Result};

/// Extension or OS signer holding the user's key
struct LocalProvider(PrivateKeySigner);

#[async_trait]
impl SignerProvider for LocalProvider {
    async fn get_public_key(&self) -> Result<String> {
        Ok(self.0.public_key())
    }

    async fn sign_event(&self, event: UnsignedEvent) -> Result<NostrEvent> {
        self.0.sign_now(event)
    }
}

/// Bunker answering requests in-process
struct LocalBunker(PrivateKeySigner);

impl LocalBunker {
    fn answer(&self, request: &Nip46Request) -> Result<Nip46Response> {
        let result = match request.method.as_str() {
            "get_public_key" => self.0.public_key(),
            "sign_event" => {
                let unsigned: UnsignedEvent = serde_json::from_str(&request.params[0])?;
                serde_json::to_string(&self.0.sign_now(unsigned)?)?
            }
            other => return Err(LoginError::Signer(format!("unsupported {other}"))),
        };
        Ok(Nip46Response {
            id: request.id.clone(),
            result,
            error: None,
        })
    }
}

#[async_trait]
impl RemoteSignerTransport for LocalBunker {
    async fn send(
        &self,
        bunker: &BunkerUrl,
        _client: &PrivateKeySigner,
        request: &Nip46Request,
    ) -> Result<Nip46Response> {
        assert_eq!(bunker.remote_pubkey, self.0.public_key());
        self.answer(request)
    }

    async fn wait_for_response(
        &self,
        _bunker: &BunkerUrl,
        _client: &PrivateKeySigner,
        request_id: &str,
    ) -> Result<Nip46Response> {
        Err(LoginError::Signer(format!("no pending request {request_id}")))
    }
}

fn provider(key: &GeneratedKey) -> Arc<LocalProvider> {
    Arc::new(LocalProvider(PrivateKeySigner::from_hex(&key.private_key).unwrap()))
}

async fn assert_signs_as(session: &LoginSession, ctx: &SignerContext) {
    let publisher = create_publisher(session, ctx).unwrap();
    assert_eq!(Some(publisher.pubkey()), session.public_key.as_deref());

    let ev = publisher
        .generic(kind::METADATA, vec![], r#"{"name":"test"}"#)
        .await
        .unwrap();
    assert_eq!(Some(ev.pubkey.as_str()), session.public_key.as_deref());
    ev.verify().unwrap();
}

#[tokio::test]
async fn test_private_key_session() {
    let key = generate_random_key();
    let mut session = LoginSession::new(key.public_key.clone(), LoginSessionType::PrivateKey);
    session.private_key_data = Some(KeyStorage::plain(key.private_key.clone()));

    assert_signs_as(&session, &SignerContext::default()).await;
}

#[test]
fn test_private_key_session_without_key() {
    let key = generate_random_key();
    let session = LoginSession::new(key.public_key, LoginSessionType::PrivateKey);

    let err = create_publisher(&session, &SignerContext::default()).unwrap_err();
    assert!(matches!(err, LoginError::MissingKeyMaterial(_)));
    assert!(err.is_precondition());
}

#[test]
fn test_private_key_must_match_declared_pubkey() {
    let key = generate_random_key();
    let other = generate_random_key();
    let mut session = LoginSession::new(other.public_key, LoginSessionType::PrivateKey);
    session.private_key_data = Some(KeyStorage::plain(key.private_key));

    let err = create_publisher(&session, &SignerContext::default()).unwrap_err();
    assert!(matches!(err, LoginError::InvalidKey(_)));
}

#[test]
fn test_pin_key_locked_until_unlocked() {
    let storage = Arc::new(MemoryStorage::new());
    let key = generate_random_key();
    let id = {
        let store = LoginStore::new(storage.clone());
        let wrapped = KeyStorage::with_pin(&key.private_key, "1234").unwrap();
        store.login_with_private_key(wrapped, None, None).unwrap()
    };

    // Plaintext never reaches storage, so a reload comes back locked
    let store = LoginStore::load(storage).unwrap();
    assert!(store.get(&id).unwrap().needs_pin());
    let err = store.get_publisher(&id).unwrap_err();
    assert!(matches!(err, LoginError::KeyLocked));

    assert!(store.unlock(&id, "0000").is_err());
    store.unlock(&id, "1234").unwrap();

    let publisher = store.get_publisher(&id).unwrap().unwrap();
    assert_eq!(publisher.pubkey(), key.public_key);
}

#[tokio::test]
async fn test_nip46_session() {
    let user = generate_random_key();
    let client = generate_random_key();
    let mut session = LoginSession::new(user.public_key.clone(), LoginSessionType::Nip46);
    session.private_key_data = Some(KeyStorage::plain(client.private_key));
    session.remote_signer_relays = Some(vec!["wss://relay.nsec.app/".into()]);

    let missing = create_publisher(&session, &SignerContext::default()).unwrap_err();
    assert!(matches!(missing, LoginError::MissingSigner(_)));

    let bunker = Arc::new(LocalBunker(PrivateKeySigner::from_hex(&user.private_key).unwrap()));
    let ctx = SignerContext::default().with_remote_transport(bunker);
    assert_signs_as(&session, &ctx).await;

    session.private_key_data = None;
    let err = create_publisher(&session, &ctx).unwrap_err();
    assert!(matches!(err, LoginError::MissingKeyMaterial(_)));
}

#[tokio::test]
async fn test_browser_extension_session() {
    let user = generate_random_key();
    let session = LoginSession::new(user.public_key.clone(), LoginSessionType::Nip7);

    let err = create_publisher(&session, &SignerContext::default()).unwrap_err();
    assert!(matches!(err, LoginError::MissingSigner(_)));

    let ctx = SignerContext::default().with_browser_extension(provider(&user));
    assert_signs_as(&session, &ctx).await;
}

#[tokio::test]
async fn test_os_signer_session() {
    let user = generate_random_key();
    let session = LoginSession::new(user.public_key.clone(), LoginSessionType::Nip7Os);

    // A browser extension does not stand in for the OS signer
    let browser_only = SignerContext::default().with_browser_extension(provider(&user));
    let err = create_publisher(&session, &browser_only).unwrap_err();
    assert!(matches!(err, LoginError::MissingSigner(_)));

    let ctx = SignerContext::default().with_os_signer(provider(&user));
    assert_signs_as(&session, &ctx).await;
}

#[test]
fn test_external_session_without_pubkey() {
    let user = generate_random_key();
    let mut session = LoginSession::new(user.public_key.clone(), LoginSessionType::Nip7);
    session.public_key = None;

    let ctx = SignerContext::default().with_browser_extension(provider(&user));
    let err = create_publisher(&session, &ctx).unwrap_err();
    assert!(matches!(err, LoginError::MissingPublicKey(_)));
}

#[tokio::test]
async fn test_external_signer_for_wrong_account_rejected() {
    let user = generate_random_key();
    let other = generate_random_key();
    let session = LoginSession::new(user.public_key, LoginSessionType::Nip7);

    let ctx = SignerContext::default().with_browser_extension(provider(&other));
    let publisher = create_publisher(&session, &ctx).unwrap();
    assert!(publisher.generic(kind::METADATA, vec![], "{}").await.is_err());
}

//! Build the publisher for a session from its declared login type

use std::sync::Arc;

use tracing::debug;

use super::{
    AuthUrlHandler, BunkerUrl, ExternalOrigin, ExternalSigner, LogAuthUrl, Nip46Signer,
    PrivateKeySigner, RemoteSignerTransport, SignerProvider,
};
use crate::publisher::EventPublisher;
use crate::session::{LoginSession, LoginSessionType};
use crate::types::{LoginError, Result};

/// Collaborators the non-local signers need
#[derive(Clone, Default)]
pub struct SignerContext {
    /// NIP-46 transport
    pub remote_transport: Option<Arc<dyn RemoteSignerTransport>>,
    /// Where bunker authorization URLs go (logged when unset)
    pub auth_handler: Option<Arc<dyn AuthUrlHandler>>,
    /// NIP-07 browser extension
    pub browser_extension: Option<Arc<dyn SignerProvider>>,
    /// OS level signer
    pub os_signer: Option<Arc<dyn SignerProvider>>,
}

impl SignerContext {
    pub fn with_remote_transport(mut self, transport: Arc<dyn RemoteSignerTransport>) -> Self {
        self.remote_transport = Some(transport);
        self
    }

    pub fn with_auth_handler(mut self, handler: Arc<dyn AuthUrlHandler>) -> Self {
        self.auth_handler = Some(handler);
        self
    }

    pub fn with_browser_extension(mut self, provider: Arc<dyn SignerProvider>) -> Self {
        self.browser_extension = Some(provider);
        self
    }

    pub fn with_os_signer(mut self, provider: Arc<dyn SignerProvider>) -> Self {
        self.os_signer = Some(provider);
        self
    }
}

/// Construct the publisher for `session`.
///
/// Fails when the key material or public key the login type requires is
/// absent, when a PIN-protected key is still locked, or when the external
/// signer for the type has not been provided.
pub fn create_publisher(session: &LoginSession, ctx: &SignerContext) -> Result<EventPublisher> {
    debug!(id = %session.id, session_type = ?session.session_type, "Creating publisher");

    match session.session_type {
        LoginSessionType::PrivateKey => {
            let keys = key_material(session)?.keys()?;
            let publisher = EventPublisher::private_key(keys);
            if let Some(declared) = session.public_key.as_deref() {
                if declared != publisher.pubkey() {
                    return Err(LoginError::InvalidKey(format!(
                        "Stored key belongs to {}, session declares {}",
                        publisher.pubkey(),
                        declared
                    )));
                }
            }
            Ok(publisher)
        }
        LoginSessionType::Nip46 => {
            let pubkey = declared_pubkey(session)?;
            let client = PrivateKeySigner::new(key_material(session)?.keys()?);
            let transport = ctx
                .remote_transport
                .clone()
                .ok_or_else(|| LoginError::MissingSigner("NIP-46 transport".into()))?;
            let auth = ctx
                .auth_handler
                .clone()
                .unwrap_or_else(|| Arc::new(LogAuthUrl) as Arc<dyn AuthUrlHandler>);

            let bunker = BunkerUrl::new(
                pubkey,
                session.remote_signer_relays.clone().unwrap_or_default(),
            );
            let signer = Nip46Signer::new(bunker, client, transport, auth);
            Ok(EventPublisher::new(Arc::new(signer), pubkey))
        }
        LoginSessionType::Nip7 => {
            external(session, ExternalOrigin::BrowserExtension, &ctx.browser_extension)
        }
        LoginSessionType::Nip7Os => external(session, ExternalOrigin::OsSigner, &ctx.os_signer),
    }
}

fn external(
    session: &LoginSession,
    origin: ExternalOrigin,
    provider: &Option<Arc<dyn SignerProvider>>,
) -> Result<EventPublisher> {
    let pubkey = declared_pubkey(session)?;
    let provider = provider
        .clone()
        .ok_or_else(|| LoginError::MissingSigner(origin.to_string()))?;
    Ok(EventPublisher::new(
        Arc::new(ExternalSigner::new(origin, provider)),
        pubkey,
    ))
}

fn key_material(session: &LoginSession) -> Result<&crate::keys::KeyStorage> {
    session
        .private_key_data
        .as_ref()
        .ok_or_else(|| LoginError::MissingKeyMaterial(session.id.clone()))
}

fn declared_pubkey(session: &LoginSession) -> Result<&str> {
    session
        .public_key
        .as_deref()
        .ok_or_else(|| LoginError::MissingPublicKey(session.id.clone()))
}

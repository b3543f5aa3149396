//! nostr-login - Nostr login session manager

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nostr_login::{
    cache::GiftsCache,
    config::{Args, ClientConfig, Command},
    external::{CachedFetch, NostrBandApi, SnortApi},
    keys::{entropy_to_mnemonic, generate_random_key, public_key_to_hex, public_key_to_npub, KeyStorage},
    login::{self, GeoHint},
    publisher::UserMetadata,
    session::{FileStorage, LoginStore},
    system::RecordingSystem,
    LoginError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("nostr_login={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let config = args.client_config();
    let fetch = Arc::new(CachedFetch::new(
        config.fetch_cache_ttl,
        config.request_timeout,
        &config.app_name,
    )?);

    match args.command.clone() {
        Command::Keygen => {
            let key = generate_random_key();
            println!("private key: {}", key.private_key);
            println!("public key:  {}", key.public_key);
            println!("npub:        {}", public_key_to_npub(&key.public_key)?);
        }

        Command::Generate { name, pin, lat, lon } => {
            let store = open_store(&args)?;
            let location = lat.zip(lon).map(|(lat, lon)| GeoHint { lat, lon });
            generate(&store, &config, fetch, location, name, pin).await?;
        }

        Command::Sessions => {
            let store = open_store(&args)?;
            let active = store.active();
            for session in store.list() {
                let marker = if active.as_deref() == Some(session.id.as_str()) { "*" } else { " " };
                println!(
                    "{} {} {:?} relays={} locked={}",
                    marker,
                    public_key_to_npub(&session.id).unwrap_or_else(|_| session.id.clone()),
                    session.session_type,
                    session.relays.item.len(),
                    session.needs_pin(),
                );
            }
            let stats = store.stats();
            info!(
                total = stats.total_sessions,
                locked = stats.locked_sessions,
                external = stats.external_sessions,
                "Sessions listed"
            );
        }

        Command::Logout { id } => {
            let store = open_store(&args)?;
            let id = public_key_to_hex(&id)?;
            if !store.contains(&id) {
                anyhow::bail!("No session for {id}");
            }
            login::logout(&store, &GiftsCache::new(), &id)?;
            println!("Logged out {id}");
        }

        Command::Trending => {
            let api = NostrBandApi::new(&config.nostr_band_url, fetch);
            for note in api.trending_notes().await? {
                let preview: String = note.content.chars().take(80).collect();
                println!("{} {}", note.id, preview.replace('\n', " "));
            }
        }

        Command::Suggested { pubkey } => {
            let api = NostrBandApi::new(&config.nostr_band_url, fetch);
            for pk in api.suggested_profiles(&pubkey).await? {
                println!("{}", public_key_to_npub(&pk).unwrap_or(pk));
            }
        }
    }

    Ok(())
}

fn open_store(args: &Args) -> anyhow::Result<LoginStore> {
    let path = args.storage_path();
    let storage = FileStorage::open(&path)
        .with_context(|| format!("Failed to open storage at {}", path.display()))?;
    Ok(LoginStore::load(Arc::new(storage))?)
}

async fn generate(
    store: &LoginStore,
    config: &ClientConfig,
    fetch: Arc<CachedFetch>,
    location: Option<GeoHint>,
    name: String,
    pin: String,
) -> anyhow::Result<()> {
    let system = RecordingSystem::new();
    let directory = SnortApi::new(&config.snort_api_url, fetch.http_client().clone());
    let profile = UserMetadata {
        name: Some(name),
        ..Default::default()
    };

    let id = login::generate_new_login(
        store,
        config,
        &system,
        &directory,
        location,
        &profile,
        |key| async move {
            // Argon2 is CPU bound
            tokio::task::spawn_blocking(move || KeyStorage::with_pin(&key, &pin))
                .await
                .map_err(|e| LoginError::Crypto(format!("PIN encryption task failed: {e}")))?
        },
    )
    .await?;

    println!("npub: {}", public_key_to_npub(&id)?);
    if let Some(entropy) = store.get(&id).and_then(|s| s.generated_entropy) {
        let entropy = hex::decode(entropy)?;
        println!("mnemonic: {}", entropy_to_mnemonic(&entropy)?.as_str());
    }

    println!("relays:");
    for url in system.connected().keys() {
        println!("  {url}");
    }

    println!("signed events:");
    for event in system.broadcast() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

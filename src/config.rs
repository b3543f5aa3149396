//! Configuration for nostr-login
//!
//! CLI arguments and environment variable handling using clap, plus the
//! library-facing [`ClientConfig`] with the client's built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::relay::{is_websocket_url, sanitize_relay_url, RelayMap, RelaySettings};

/// Relays every new account starts with
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.snort.social/",
    "wss://nostr.wine/",
    "wss://nos.lol/",
    "wss://relay.damus.io/",
];

/// Accounts a new user follows besides themselves
pub const DEFAULT_FOLLOWS: &[&str] =
    &["npub1sn0rtcjcf543gj4wsg7fa59s700d5ztys5ctj0g69g2x6802npjqhjjtws"];

/// Relays that accept one-off writes and fan events out widely
pub const BLASTERS: &[&str] = &["wss://nostr.mutinywallet.com/"];

/// Library configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application name (app-data `d` tag, HTTP user agent)
    pub app_name: String,

    /// Pin every session to this one relay
    pub single_relay: Option<String>,

    /// Relays added to every generated account
    pub default_relays: RelayMap,

    /// Accounts a generated account follows (npub or hex)
    pub default_follows: Vec<String>,

    /// Relays written to once when publishing profile and relay list
    pub blasters: Vec<String>,

    /// How many nearby relays a generated account picks
    pub close_relay_count: usize,

    pub snort_api_url: String,
    pub nostr_band_url: String,

    /// How long cached API responses stay fresh
    pub fetch_cache_ttl: Duration,

    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: "snort".to_string(),
            single_relay: None,
            default_relays: DEFAULT_RELAYS
                .iter()
                .map(|r| (r.to_string(), RelaySettings::read_write()))
                .collect(),
            default_follows: DEFAULT_FOLLOWS.iter().map(|f| f.to_string()).collect(),
            blasters: BLASTERS.iter().map(|b| b.to_string()).collect(),
            close_relay_count: 5,
            snort_api_url: "https://api.snort.social".to_string(),
            nostr_band_url: "https://api.nostr.band".to_string(),
            fetch_cache_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// nostr-login - Nostr login session manager
#[derive(Parser, Debug, Clone)]
#[command(name = "nostr-login")]
#[command(about = "Manage Nostr login sessions, keys and account bootstrap")]
pub struct Args {
    /// Directory holding local storage
    #[arg(long, env = "NOSTR_LOGIN_DATA_DIR", default_value = ".nostr-login")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Application name
    #[arg(long, env = "APP_NAME", default_value = "snort")]
    pub app_name: String,

    /// Pin all sessions to a single relay
    #[arg(long, env = "SINGLE_RELAY")]
    pub single_relay: Option<String>,

    /// Comma-separated default relays (replaces the built-in list)
    #[arg(long, env = "DEFAULT_RELAYS")]
    pub default_relays: Option<String>,

    /// Comma-separated default follows, npub or hex (replaces the built-in list)
    #[arg(long, env = "DEFAULT_FOLLOWS")]
    pub default_follows: Option<String>,

    /// Comma-separated blaster relays (replaces the built-in list)
    #[arg(long, env = "BLASTERS")]
    pub blasters: Option<String>,

    /// Snort API base URL
    #[arg(long, env = "SNORT_API_URL", default_value = "https://api.snort.social")]
    pub snort_api_url: String,

    /// nostr.band API base URL
    #[arg(long, env = "NOSTR_BAND_URL", default_value = "https://api.nostr.band")]
    pub nostr_band_url: String,

    /// Seconds a cached API response stays fresh
    #[arg(long, env = "FETCH_CACHE_TTL_SECONDS", default_value = "3600")]
    pub fetch_cache_ttl_seconds: u64,

    /// HTTP request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print a fresh random key pair
    Keygen,

    /// Create a new account, publish its profile and log in
    Generate {
        /// Display name for the new profile
        #[arg(long)]
        name: String,

        /// PIN used to encrypt the stored key
        #[arg(long, env = "NOSTR_LOGIN_PIN")]
        pin: String,

        /// Approximate latitude, used to pick nearby relays
        #[arg(long, requires = "lon")]
        lat: Option<f64>,

        /// Approximate longitude, used to pick nearby relays
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },

    /// List stored sessions
    Sessions,

    /// Remove a session and wipe local caches
    Logout {
        /// Session id (hex pubkey)
        id: String,
    },

    /// Show trending notes from nostr.band
    Trending,

    /// Show suggested profiles for a public key
    Suggested {
        /// Public key, npub or hex
        pubkey: String,
    },
}

impl Args {
    /// Path of the local storage file
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join("storage.json")
    }

    /// Library configuration derived from the arguments
    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            app_name: self.app_name.clone(),
            single_relay: self.single_relay.as_deref().and_then(sanitize_relay_url),
            default_relays: match &self.default_relays {
                Some(list) => split_list(list)
                    .into_iter()
                    .filter_map(|r| sanitize_relay_url(&r))
                    .map(|r| (r, RelaySettings::read_write()))
                    .collect(),
                None => defaults.default_relays,
            },
            default_follows: self
                .default_follows
                .as_deref()
                .map(split_list)
                .unwrap_or(defaults.default_follows),
            blasters: self
                .blasters
                .as_deref()
                .map(split_list)
                .unwrap_or(defaults.blasters),
            close_relay_count: defaults.close_relay_count,
            snort_api_url: self.snort_api_url.trim_end_matches('/').to_string(),
            nostr_band_url: self.nostr_band_url.trim_end_matches('/').to_string(),
            fetch_cache_ttl: Duration::from_secs(self.fetch_cache_ttl_seconds),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref relay) = self.single_relay {
            if !is_websocket_url(relay) || sanitize_relay_url(relay).is_none() {
                return Err(format!("SINGLE_RELAY is not a websocket URL: {relay}"));
            }
        }

        for list in [&self.default_relays, &self.blasters].into_iter().flatten() {
            for relay in split_list(list) {
                if !is_websocket_url(&relay) {
                    return Err(format!("Relay is not a websocket URL: {relay}"));
                }
            }
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(())
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

//! Relay settings and URL handling

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// Read/write flags for one relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySettings {
    pub read: bool,
    pub write: bool,
}

impl RelaySettings {
    /// Relay used for both reading and writing
    pub const fn read_write() -> Self {
        Self {
            read: true,
            write: true,
        }
    }

    /// Marker used in NIP-65 `r` tags (`None` means both)
    pub fn marker(&self) -> Option<&'static str> {
        match (self.read, self.write) {
            (true, false) => Some("read"),
            (false, true) => Some("write"),
            _ => None,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::read_write()
    }
}

/// Relay map keyed by normalized URL
pub type RelayMap = BTreeMap<String, RelaySettings>;

/// Normalize a relay URL, returning `None` if it does not parse.
///
/// `wss://relay.example.com` becomes `wss://relay.example.com/`.
pub fn sanitize_relay_url(url: &str) -> Option<String> {
    Url::parse(url.trim()).ok().map(|u| u.to_string())
}

/// Whether the address uses a websocket scheme
pub fn is_websocket_url(url: &str) -> bool {
    url.starts_with("wss://") || url.starts_with("ws://")
}

/// Keep websocket relays only, normalizing their URLs
pub fn filter_websocket_relays<'a, I>(relays: I) -> RelayMap
where
    I: IntoIterator<Item = (&'a String, &'a RelaySettings)>,
{
    relays
        .into_iter()
        .filter(|(url, _)| is_websocket_url(url))
        .filter_map(|(url, settings)| sanitize_relay_url(url).map(|u| (u, *settings)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_adds_trailing_slash() {
        assert_eq!(
            sanitize_relay_url("wss://relay.damus.io").as_deref(),
            Some("wss://relay.damus.io/")
        );
        assert_eq!(
            sanitize_relay_url("wss://Nos.LOL/").as_deref(),
            Some("wss://nos.lol/")
        );
        assert!(sanitize_relay_url("not a url").is_none());
    }

    #[test]
    fn test_filter_drops_non_websocket() {
        let mut input = RelayMap::new();
        input.insert("wss://relay.one".into(), RelaySettings::read_write());
        input.insert("https://relay.two".into(), RelaySettings::read_write());
        input.insert(
            "ws://localhost:7777".into(),
            RelaySettings {
                read: true,
                write: false,
            },
        );

        let filtered = filter_websocket_relays(&input);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.contains_key("wss://relay.one/"));
        assert!(!filtered[&"ws://localhost:7777/".to_string()].write);
    }

    #[test]
    fn test_marker() {
        assert_eq!(RelaySettings::read_write().marker(), None);
        assert_eq!(
            RelaySettings {
                read: true,
                write: false
            }
            .marker(),
            Some("read")
        );
    }
}

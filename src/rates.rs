//! Exchange rates published as kind 1009 events
//!
//! The rate publisher posts one addressable event per symbol with a tag
//! `["d", symbol, ask, bid, low, high]`.

use serde::Serialize;

use crate::event::{kind, newest, NostrEvent};
use crate::keys::public_key_to_hex;
use crate::types::Result;

/// Account that publishes rates
pub const RATES_PUBLISHER: &str = "npub1sn0rtcjcf543gj4wsg7fa59s700d5ztys5ctj0g69g2x6802npjqhjjtws";

/// Latest rate for a symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rates {
    pub time: u64,
    pub ask: f64,
    pub bid: f64,
    pub low: f64,
    pub high: f64,
}

/// NIP-01 filter for the subscription the relay runtime should open
pub fn rates_request(symbol: &str) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "kinds": [kind::RATES],
        "authors": [public_key_to_hex(RATES_PUBLISHER)?],
        "#d": [symbol],
        "limit": 1
    }))
}

/// Read the rate for `symbol` from the newest event.
///
/// Only the newest event is considered; if it carries no tag for the symbol
/// the result is `None`. Unparsable numbers read as NaN.
pub fn read_rates(events: &[NostrEvent], symbol: &str) -> Option<Rates> {
    let ev = newest(events)?;
    let tag = ev
        .tags
        .iter()
        .find(|t| t.first().map(String::as_str) == Some("d") && t.get(1).map(String::as_str) == Some(symbol))?;

    let num = |i: usize| {
        tag.get(i)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(f64::NAN)
    };

    Some(Rates {
        time: ev.created_at,
        ask: num(2),
        bid: num(3),
        low: num(4),
        high: num(5),
    })
}

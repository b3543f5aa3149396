//! Relay runtime interface
//!
//! Connection management and event delivery belong to the protocol runtime;
//! the login layer only needs these three calls.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::event::NostrEvent;
use crate::relay::{RelayMap, RelaySettings};
use crate::types::Result;

/// The relay runtime as seen by the login layer
#[async_trait]
pub trait SystemInterface: Send + Sync {
    /// Open (or update) a persistent connection to a relay
    async fn connect_to_relay(&self, address: &str, settings: RelaySettings) -> Result<()>;

    /// Send an event to every connected write relay
    async fn broadcast_event(&self, event: &NostrEvent) -> Result<()>;

    /// Connect to a relay just long enough to deliver one event
    async fn write_once_to_relay(&self, address: &str, event: &NostrEvent) -> Result<()>;
}

/// Runtime that records instead of sending.
///
/// Used by the CLI, which has no relay runtime of its own: the signed
/// events are printed so another client can deliver them.
#[derive(Debug, Default)]
pub struct RecordingSystem {
    connected: Mutex<RelayMap>,
    broadcast: Mutex<Vec<NostrEvent>>,
    written: Mutex<Vec<(String, NostrEvent)>>,
}

impl RecordingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(&self) -> RelayMap {
        self.connected.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn broadcast(&self) -> Vec<NostrEvent> {
        self.broadcast.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// One-off writes as `(relay, event)`
    pub fn written(&self) -> Vec<(String, NostrEvent)> {
        self.written.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl SystemInterface for RecordingSystem {
    async fn connect_to_relay(&self, address: &str, settings: RelaySettings) -> Result<()> {
        debug!(relay = %address, "Recording relay connection");
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_string(), settings);
        Ok(())
    }

    async fn broadcast_event(&self, event: &NostrEvent) -> Result<()> {
        debug!(event = %event.id, kind = event.kind, "Recording broadcast");
        self.broadcast
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    async fn write_once_to_relay(&self, address: &str, event: &NostrEvent) -> Result<()> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((address.to_string(), event.clone()));
        Ok(())
    }
}

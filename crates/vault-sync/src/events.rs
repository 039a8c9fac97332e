//! # Sync Events
//!
//! Notifications for whatever front end hosts the sync layer.
//!
//! ```text
//! CredentialManager ──► LoginSucceeded / LoggedOut / SessionExpired
//! SyncOrchestrator  ──► StateChanged / ReloadRequired
//! connectivity      ──► ConnectivityChanged
//!        │
//!        ▼
//! SyncEventEmitter (broadcast channel, or no-op)
//! ```

use serde::Serialize;
use tokio::sync::broadcast;
use vault_core::{OperationKind, OperationState};

/// Something the front end may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    LoginSucceeded,
    LoggedOut,
    SessionExpired,
    ConnectivityChanged {
        online: bool,
    },
    StateChanged {
        kind: OperationKind,
        state: OperationState,
    },
    /// Local data was replaced; views must reload everything.
    ReloadRequired,
}

/// Trait for emitting sync events.
pub trait SyncEventEmitter: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// No-op event emitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit(&self, _event: SyncEvent) {}
}

/// Fans events out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<SyncEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        BroadcastEmitter { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SyncEventEmitter for BroadcastEmitter {
    fn emit(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }
}

//! # vault-sync: Cloud Sync for RPG Vault
//!
//! Manual, whole-database backup of the local store to a cloud drive, and
//! restore from it.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Sync Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  SyncOrchestrator (one op at a time)             │  │
//! │  │                                                                  │  │
//! │  │  Idle ─► Confirming ─► InProgress ─► Completed/Canceled/Failed  │  │
//! │  └────────┬──────────────────┬──────────────────────┬──────────────┘  │
//! │           │                  │                      │                  │
//! │           ▼                  ▼                      ▼                  │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  LocalStore    │  │ SnapshotRemote │  │  UserPrompt /          │    │
//! │  │  (vault-db)    │  │                │  │  ProgressIndicator     │    │
//! │  │                │  │ RemoteSyncClient│ │                        │    │
//! │  │ export_snapshot│  │ locate/download│  │ confirm, alert, notify │    │
//! │  │ guarded import │  │ /upload        │  │ show/update/hide       │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                     ┌────────────────┐   ┌────────────────────────┐    │
//! │                     │CredentialManager│  │ Connectivity (watch)   │    │
//! │                     │ cache + provider│  │ offline ─► cancel      │    │
//! │                     └────────────────┘   └────────────────────────┘    │
//! │                                                                         │
//! │  EVENTS (SyncEventEmitter):                                            │
//! │  • login_succeeded / logged_out / session_expired                      │
//! │  • connectivity_changed                                                │
//! │  • state_changed                                                       │
//! │  • reload_required                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`orchestrator`] - `SyncOrchestrator`, outcomes and observable status
//! - [`remote`] - `SnapshotRemote` trait and the Drive-backed client
//! - [`credential`] - Access credentials, caches, identity providers
//! - [`cancel`] - `CancelToken` and cancel reasons
//! - [`connectivity`] - Online/offline signal and reachability probe
//! - [`progress`] - Progress sinks (closures, channels, bands)
//! - [`ui`] - Prompt and progress indicator seams
//! - [`events`] - Event emitter trait and implementations
//! - [`config`] - `VaultConfig` (TOML + environment)
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vault_db::{DbConfig, LocalStore};
//! use vault_sync::*;
//!
//! let config = VaultConfig::load_or_default(None);
//!
//! let store = Arc::new(LocalStore::new(DbConfig::new(config.database_path())));
//! store.open().await?;
//!
//! let credentials = Arc::new(CredentialManager::new(
//!     Arc::new(FileCredentialCache::new(config.token_cache_path())),
//!     Arc::new(StaticTokenProvider::new(reqwest::Client::new(), None)),
//!     config.expiry_margin(),
//! ));
//! credentials.restore().await;
//!
//! let remote = RemoteSyncClient::new(RemoteSettings::from_config(&config)?, credentials)?;
//! let orchestrator = SyncOrchestrator::new(store, Arc::new(remote), Connectivity::default(), prompt, indicator);
//!
//! match orchestrator.perform_save().await? {
//!     SyncOutcome::Saved { created, .. } => println!("saved (new file: {})", created),
//!     other => println!("{:?}", other),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cancel;
pub mod config;
pub mod connectivity;
pub mod credential;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod progress;
pub mod remote;
pub mod ui;

// =============================================================================
// Re-exports
// =============================================================================

pub use cancel::{CancelReason, CancelToken};
pub use config::{AuthSettings, ProgressSettings, RemoteConfig, StoreSettings, VaultConfig};
pub use connectivity::{Connectivity, MAX_PROBE_WAIT};
pub use credential::{
    AccessCredential, CredentialCache, CredentialManager, FileCredentialCache, IdentityProvider,
    MemoryCredentialCache, StaticTokenProvider, TokenGrant,
};
pub use error::{SyncError, SyncResult};
pub use events::{BroadcastEmitter, NoOpEmitter, SyncEvent, SyncEventEmitter};
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncStatus};
pub use progress::{ChannelProgress, NoProgress, ProgressSink, ScaledProgress};
pub use remote::{RemoteSettings, RemoteSyncClient, SnapshotRemote, UploadOutcome};
pub use ui::{ProgressGuard, ProgressIndicator, Severity, UserPrompt};

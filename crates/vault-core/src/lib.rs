//! # vault-core: Pure Types for RPG Vault
//!
//! Shared vocabulary for the local store and the cloud sync layer.
//! Everything in here is a pure transform with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RPG Vault Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    rpg-vault CLI / UI                           │   │
//! │  │    put / get / remove ──► save to cloud ──► load from cloud     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               vault-sync (orchestrator, remote client)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vault-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │collection │  │  entity   │  │   codec   │  │ snapshot  │  │   │
//! │  │   │ rpgCards  │  │  Value    │  │  base64   │  │ Document  │  │   │
//! │  │   │ rpgItems  │  │ EntityId  │  │           │  │ encode    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    vault-db (Local Store)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`collection`] - The six entity collections and their names
//! - [`entity`] - Entity, EntityId and the field value tree
//! - [`validation`] - Binary field schema and its invariants
//! - [`codec`] - Binary ⇄ base64 text
//! - [`snapshot`] - Whole-database JSON document
//! - [`progress`] - Progress reports and the per-operation state machine
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use vault_core::{Collection, Entity, SnapshotDocument};
//!
//! let sword = Entity::new("1700000000000")
//!     .with("name", "Longsword")
//!     .with_binary("image", vec![0x89, b'P', b'N', b'G'], "image/png");
//!
//! let doc = SnapshotDocument::encode([(Collection::Items, vec![sword])]);
//! let json = doc.to_json_string().unwrap();
//! assert!(json.contains("iVBORw=="));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codec;
pub mod collection;
pub mod entity;
pub mod error;
pub mod progress;
pub mod snapshot;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use collection::Collection;
pub use entity::{Entity, EntityId, IdGenerator, Value};
pub use error::{CodecError, CoreError, FormatError, ValidationError};
pub use progress::{
    OperationKind, OperationState, Progress, ProgressUpdate, SyncPhase, SyntheticProgress,
};
pub use snapshot::{DecodedSnapshot, SnapshotDocument};

// =============================================================================
// Constants
// =============================================================================

/// Logical name of the local store.
pub const STORE_NAME: &str = "RPGCardsDB";

/// Schema version of the local store.
pub const STORE_VERSION: u32 = 1;

/// Reserved name of the remote file holding the whole database.
pub const REMOTE_FILE_NAME: &str = "rpg_manager_db.json";

/// Default file name for a local backup export.
pub const LOCAL_BACKUP_FILE_NAME: &str = "rpg_cards_backup.json";

/// MIME type of snapshot documents.
pub const SNAPSHOT_MIME_TYPE: &str = "application/json";

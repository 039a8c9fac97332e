//! # vault-db: Local Store for RPG Vault
//!
//! Durable storage for every collection of the character-sheet manager.
//! SQLite through sqlx, one table per collection, entity bodies as CBOR so
//! images stay raw bytes on disk.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RPG Vault Data Flow                              │
//! │                                                                         │
//! │  CLI command / SyncOrchestrator                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     vault-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LocalStore   │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ EntityRepo    │    │ 001_init.sql │  │   │
//! │  │   │ Database      │◄───│ SnapshotRepo  │    │              │  │   │
//! │  │   │ (pool.rs)     │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/rpg-vault/rpg_vault.db                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `LocalStore`, the open-once application handle
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - Entity and snapshot repositories
//! - [`record`] - CBOR row bodies
//! - [`backup`] - Local backup files
//! - [`images`] - Zip archive of every stored picture
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vault_core::{Collection, Entity};
//! use vault_db::{DbConfig, LocalStore};
//!
//! let store = LocalStore::new(DbConfig::new("rpg_vault.db"));
//! store.open().await?;
//!
//! store.put(Collection::Items, &Entity::create().with("name", "Rope")).await?;
//! let snapshot = store.export_snapshot().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod error;
pub mod images;
pub mod migrations;
pub mod pool;
pub mod record;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use images::{ImageEntry, IMAGE_ARCHIVE_FILE_NAME};
pub use pool::{Database, DbConfig};
pub use store::LocalStore;

pub use repository::entity::EntityRepository;
pub use repository::snapshot::{ImportSummary, SnapshotRepository};
pub use repository::StoreChange;

//! # Repository Module
//!
//! Database repository implementations for the local store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Caller                                                                │
//! │       │  db.entities(Collection::Spells).put(&fireball)                │
//! │       ▼                                                                 │
//! │  EntityRepository (one per collection)                                 │
//! │  ├── put(&self, entity)        upsert by id                            │
//! │  ├── get(&self, id)            Option<Entity>                          │
//! │  ├── get_all(&self)            Vec<Entity>                             │
//! │  └── remove(&self, id)         idempotent                              │
//! │                                                                         │
//! │  SnapshotRepository (whole store)                                      │
//! │  ├── export_snapshot()         all six collections                     │
//! │  └── import_snapshot(doc)      clear + refill, one transaction         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (rpg_cards, rpg_spells, ... )                                  │
//! │       │                                                                 │
//! │       └──► StoreChange broadcast                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`EntityRepository`](entity::EntityRepository) - CRUD on one collection
//! - [`SnapshotRepository`](snapshot::SnapshotRepository) - Export / restore

pub mod entity;
pub mod snapshot;

use vault_core::{Collection, EntityId};

/// A committed change to the local store.
///
/// Views subscribe through `Database::subscribe` and refresh whatever they
/// display when a change arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    /// An entity was created or replaced.
    Put { collection: Collection, id: EntityId },

    /// An entity was deleted.
    Removed { collection: Collection, id: EntityId },

    /// A collection was emptied.
    Cleared { collection: Collection },

    /// A snapshot import replaced these collections.
    Restored { collections: Vec<Collection> },
}

impl StoreChange {
    /// Returns true if this change touched `collection`.
    pub fn affects(&self, collection: Collection) -> bool {
        match self {
            StoreChange::Put { collection: c, .. }
            | StoreChange::Removed { collection: c, .. }
            | StoreChange::Cleared { collection: c } => *c == collection,
            StoreChange::Restored { collections } => collections.contains(&collection),
        }
    }
}

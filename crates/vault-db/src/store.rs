//! # Local Store
//!
//! Application-facing handle over [`Database`] with an explicit open step.
//!
//! ## Lifecycle
//! ```text
//! LocalStore::new(config)      nothing touched yet
//!      │
//!      │  put/get/... ──► Err(StoreUnavailable)
//!      ▼
//! store.open().await           pool + migrations (once, even if raced)
//!      │
//!      ▼
//! store.put(Collection::Items, &rope).await ✓
//! ```

use std::path::Path;
use tokio::sync::{broadcast, OnceCell};
use tracing::info;
use vault_core::{Collection, Entity, EntityId, SnapshotDocument};

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig};
use crate::repository::snapshot::ImportSummary;
use crate::repository::StoreChange;

/// The local store.
///
/// Every operation before [`open`](Self::open) completes fails with
/// [`DbError::StoreUnavailable`].
#[derive(Debug)]
pub struct LocalStore {
    config: DbConfig,
    db: OnceCell<Database>,
}

impl LocalStore {
    /// Creates an unopened store.
    pub fn new(config: DbConfig) -> Self {
        LocalStore {
            config,
            db: OnceCell::new(),
        }
    }

    /// Opens an existing [`Database`] handle as a store.
    pub fn from_database(db: Database) -> Self {
        let config = DbConfig::new(db.path());
        LocalStore {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Opens (creating if needed) the store.
    ///
    /// Idempotent: concurrent and repeated calls share one open.
    pub async fn open(&self) -> DbResult<&Database> {
        self.db
            .get_or_try_init(|| async {
                let db = Database::new(self.config.clone()).await?;
                info!(path = %db.path().display(), "Local store ready");
                Ok::<_, DbError>(db)
            })
            .await
    }

    pub fn is_open(&self) -> bool {
        self.db.initialized()
    }

    /// The open database.
    ///
    /// ## Returns
    /// * `Err(DbError::StoreUnavailable)` - `open` has not completed
    pub fn database(&self) -> DbResult<&Database> {
        self.db
            .get()
            .ok_or_else(|| DbError::StoreUnavailable("store has not been opened".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.config.database_path
    }

    // =========================================================================
    // Entity operations
    // =========================================================================

    pub async fn put(&self, collection: Collection, entity: &Entity) -> DbResult<EntityId> {
        self.database()?.entities(collection).put(entity).await
    }

    pub async fn get(&self, collection: Collection, id: &str) -> DbResult<Option<Entity>> {
        self.database()?.entities(collection).get(id).await
    }

    pub async fn get_all(&self, collection: Collection) -> DbResult<Vec<Entity>> {
        self.database()?.entities(collection).get_all().await
    }

    pub async fn remove(&self, collection: Collection, id: &str) -> DbResult<bool> {
        self.database()?.entities(collection).remove(id).await
    }

    pub async fn count(&self, collection: Collection) -> DbResult<u64> {
        self.database()?.entities(collection).count().await
    }

    pub async fn clear(&self, collection: Collection) -> DbResult<u64> {
        self.database()?.entities(collection).clear().await
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub async fn export_snapshot(&self) -> DbResult<SnapshotDocument> {
        self.database()?.snapshots().export_snapshot().await
    }

    pub async fn import_snapshot(&self, doc: &SnapshotDocument) -> DbResult<ImportSummary> {
        self.database()?.snapshots().import_snapshot(doc).await
    }

    pub async fn import_snapshot_guarded<F>(
        &self,
        doc: &SnapshotDocument,
        is_aborted: F,
    ) -> DbResult<ImportSummary>
    where
        F: Fn() -> bool,
    {
        self.database()?
            .snapshots()
            .import_snapshot_guarded(doc, is_aborted)
            .await
    }

    /// Subscribes to committed changes.
    pub fn subscribe(&self) -> DbResult<broadcast::Receiver<StoreChange>> {
        Ok(self.database()?.subscribe())
    }

    /// Closes the pool if it was opened.
    pub async fn close(&self) {
        if let Some(db) = self.db.get() {
            db.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_operations_before_open_are_unavailable() {
        let store = LocalStore::new(DbConfig::in_memory());

        assert!(!store.is_open());
        assert!(matches!(
            store.get_all(Collection::Items).await,
            Err(DbError::StoreUnavailable(_))
        ));
        assert!(matches!(
            store.put(Collection::Items, &Entity::new("1")).await,
            Err(DbError::StoreUnavailable(_))
        ));
        assert!(matches!(store.export_snapshot().await, Err(DbError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let store = Arc::new(LocalStore::new(DbConfig::in_memory()));

        let (a, b) = tokio::join!(store.open(), store.open());
        a.unwrap();
        b.unwrap();
        store.put(Collection::Spells, &Entity::new("s")).await.unwrap();
        store.open().await.unwrap();

        assert_eq!(store.count(Collection::Spells).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reopen_sees_committed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpg_vault.db");
        let portrait: Vec<u8> = (0..=255u8).rev().collect();

        {
            let store = LocalStore::new(DbConfig::new(&path));
            store.open().await.unwrap();
            let card = Entity::new("c1").with_binary("image", portrait.clone(), "image/webp");
            store.put(Collection::Characters, &card).await.unwrap();
            store.put(Collection::Items, &Entity::new("i1")).await.unwrap();
            store.remove(Collection::Items, "i1").await.unwrap();
            store.close().await;
        }

        let store = LocalStore::new(DbConfig::new(&path));
        store.open().await.unwrap();
        let card = store.get(Collection::Characters, "c1").await.unwrap().unwrap();

        assert_eq!(card.binary("image"), Some((&portrait[..], "image/webp")));
        assert_eq!(store.get(Collection::Items, "i1").await.unwrap(), None);
    }
}

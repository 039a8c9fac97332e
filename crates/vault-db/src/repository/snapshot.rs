//! # Snapshot Repository
//!
//! Whole-store export and restore.
//!
//! ## Import Flow
//! ```text
//! SnapshotDocument
//!      │
//!      ▼
//! decode() ── FormatError? ──► return, store untouched
//!      │
//!      ▼
//! BEGIN
//!      │  for each collection present in the document:
//!      │      DELETE FROM <table>
//!      │      INSERT every entity
//!      ▼
//! aborted? ── yes ──► ROLLBACK, DbError::Canceled
//!      │
//!      ▼
//! COMMIT ──► StoreChange::Restored
//! ```
//!
//! Collections absent from the document keep their current contents.

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use vault_core::{Collection, SnapshotDocument};

use crate::error::{DbError, DbResult};
use crate::repository::entity::{delete_all, fetch_all, upsert};
use crate::repository::StoreChange;

/// What an import replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Restored collections with their new entity counts, in snapshot order.
    pub collections: Vec<(Collection, usize)>,
}

impl ImportSummary {
    /// Total entities written.
    pub fn entity_count(&self) -> usize {
        self.collections.iter().map(|(_, n)| n).sum()
    }

    pub fn restored(&self) -> impl Iterator<Item = Collection> + '_ {
        self.collections.iter().map(|(c, _)| *c)
    }
}

/// Repository for whole-store snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
    changes: broadcast::Sender<StoreChange>,
}

impl SnapshotRepository {
    /// Creates a new SnapshotRepository.
    pub fn new(pool: SqlitePool, changes: broadcast::Sender<StoreChange>) -> Self {
        SnapshotRepository { pool, changes }
    }

    /// Reads all six collections into a snapshot document.
    ///
    /// The reads share one transaction so the document never mixes states
    /// from before and after a concurrent write.
    pub async fn export_snapshot(&self) -> DbResult<SnapshotDocument> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut collections = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let entities = fetch_all(&mut *tx, collection).await?;
            collections.push((collection, entities));
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let doc = SnapshotDocument::encode(collections);
        info!(entities = doc.entity_count(), "Snapshot exported");
        Ok(doc)
    }

    /// Replaces the collections present in `doc` with its contents.
    ///
    /// ## Returns
    /// * `Ok(ImportSummary)` - Committed
    /// * `Err(DbError::Format)` - Malformed document; store untouched
    pub async fn import_snapshot(&self, doc: &SnapshotDocument) -> DbResult<ImportSummary> {
        self.import_snapshot_guarded(doc, || false).await
    }

    /// Like [`import_snapshot`](Self::import_snapshot), but asks `is_aborted`
    /// right before committing. A `true` answer rolls everything back.
    ///
    /// Used by the sync layer so a connection loss during restore leaves
    /// the store exactly as it was.
    pub async fn import_snapshot_guarded<F>(
        &self,
        doc: &SnapshotDocument,
        is_aborted: F,
    ) -> DbResult<ImportSummary>
    where
        F: Fn() -> bool,
    {
        let decoded = doc.decode()?;

        for key in doc.ignored_keys() {
            warn!(key = %key, "Ignoring unknown snapshot key");
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let now = Utc::now();
        let mut summary = ImportSummary::default();
        for (collection, entities) in &decoded {
            let removed = delete_all(&mut *tx, *collection).await?;
            for entity in entities {
                upsert(&mut *tx, *collection, entity, now).await?;
            }
            debug!(
                collection = %collection,
                removed,
                inserted = entities.len(),
                "Collection restored"
            );
            summary.collections.push((*collection, entities.len()));
        }

        if is_aborted() {
            tx.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            info!("Snapshot import aborted, rolled back");
            return Err(DbError::Canceled);
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            collections = summary.collections.len(),
            entities = summary.entity_count(),
            "Snapshot imported"
        );
        let _ = self.changes.send(StoreChange::Restored {
            collections: summary.restored().collect(),
        });
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use vault_core::{Entity, Value};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn grimoire() -> Entity {
        let mut book = Entity::new("g1").with("name", "Tome of Embers");
        book.push_page(Value::map([
            ("title", Value::from("Ignition")),
            ("image", Value::Bytes(vec![0x89, 0x50, 0x4e, 0x47])),
            ("imageMimeType", Value::from("image/png")),
        ]));
        book
    }

    #[tokio::test]
    async fn test_export_lists_all_six_collections() {
        let db = test_db().await;
        db.entities(Collection::Items)
            .put(&Entity::new("1").with("name", "Rope"))
            .await
            .unwrap();

        let doc = db.snapshots().export_snapshot().await.unwrap();

        assert_eq!(doc.collections().count(), 6);
        assert_eq!(doc.len_of(Collection::Items), 1);
        assert_eq!(doc.len_of(Collection::Spells), 0);
    }

    #[tokio::test]
    async fn test_export_then_import_restores_exactly() {
        let source = test_db().await;
        let card = Entity::new("c1")
            .with("name", "Aria")
            .with_binary("image", vec![0, 1, 2, 253, 254, 255], "image/png")
            .with_binary("backgroundImage", vec![9; 300], "image/jpeg");
        source.entities(Collection::Characters).put(&card).await.unwrap();
        source.entities(Collection::Grimoires).put(&grimoire()).await.unwrap();

        let text = source
            .snapshots()
            .export_snapshot()
            .await
            .unwrap()
            .to_json_string()
            .unwrap();

        let target = test_db().await;
        target
            .entities(Collection::Spells)
            .put(&Entity::new("stale"))
            .await
            .unwrap();
        let doc = SnapshotDocument::from_json_str(&text).unwrap();
        let summary = target.snapshots().import_snapshot(&doc).await.unwrap();

        assert_eq!(summary.entity_count(), 2);
        assert_eq!(
            target.entities(Collection::Characters).get_all().await.unwrap(),
            vec![card]
        );
        assert_eq!(
            target.entities(Collection::Grimoires).get_all().await.unwrap(),
            vec![grimoire()]
        );
        assert!(target.entities(Collection::Spells).get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_document_leaves_other_collections() {
        let db = test_db().await;
        db.entities(Collection::Items).put(&Entity::new("keep")).await.unwrap();
        db.entities(Collection::Spells).put(&Entity::new("old")).await.unwrap();

        let doc = SnapshotDocument::from_json_str(r#"{"rpgSpells":[{"id":"new"}]}"#).unwrap();
        let summary = db.snapshots().import_snapshot(&doc).await.unwrap();

        assert_eq!(summary.collections, vec![(Collection::Spells, 1)]);
        let spells = db.entities(Collection::Spells).get_all().await.unwrap();
        assert_eq!(spells, vec![Entity::new("new")]);
        assert!(db.entities(Collection::Items).get("keep").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_malformed_document_changes_nothing() {
        let db = test_db().await;
        db.entities(Collection::Characters)
            .put(&Entity::new("c1").with("name", "Aria"))
            .await
            .unwrap();
        let before = db.snapshots().export_snapshot().await.unwrap();

        let doc = SnapshotDocument::from_json_str(
            r#"{"rpgCards":[{"id":"x","image":"!!not base64!!","imageMimeType":"image/png"}]}"#,
        )
        .unwrap();
        let err = db.snapshots().import_snapshot(&doc).await.unwrap_err();

        assert!(matches!(err, DbError::Format(_)));
        assert_eq!(db.snapshots().export_snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_aborted_import_rolls_back() {
        let db = test_db().await;
        db.entities(Collection::Attacks).put(&Entity::new("slash")).await.unwrap();
        let mut changes = db.subscribe();

        let doc = SnapshotDocument::from_json_str(r#"{"rpgAttacks":[]}"#).unwrap();
        let err = db
            .snapshots()
            .import_snapshot_guarded(&doc, || true)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Canceled));
        assert_eq!(db.entities(Collection::Attacks).count().await.unwrap(), 1);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_import_broadcasts_restored_collections() {
        let db = test_db().await;
        let mut changes = db.subscribe();

        let doc =
            SnapshotDocument::from_json_str(r#"{"rpgItems":[],"rpgCategories":[],"extra":1}"#)
                .unwrap();
        db.snapshots().import_snapshot(&doc).await.unwrap();

        let change = changes.recv().await.unwrap();
        assert!(change.affects(Collection::Items));
        assert!(change.affects(Collection::Categories));
        assert!(!change.affects(Collection::Spells));
    }
}

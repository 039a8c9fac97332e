//! # Entity Repository
//!
//! Keyed CRUD on a single collection.
//!
//! ## Row Layout
//! ```text
//! rpg_items
//! ┌───────────────┬──────────────────────────┬──────────────────────────┐
//! │ id (PK)       │ body (CBOR)              │ updated_at               │
//! ├───────────────┼──────────────────────────┼──────────────────────────┤
//! │ 1712345678901 │ {name: "Rope", image: …} │ 2024-04-05T19:21:18Z     │
//! └───────────────┴──────────────────────────┴──────────────────────────┘
//! ```
//!
//! Rows are returned in rowid order. An upsert keeps the original rowid, so
//! `get_all` lists entities in the order they were first stored.

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use tokio::sync::broadcast;
use tracing::debug;
use vault_core::validation::validate_entity;
use vault_core::{Collection, Entity, EntityId};

use crate::error::DbResult;
use crate::record::{decode_body, encode_body};
use crate::repository::StoreChange;

/// Repository for one collection.
///
/// ## Usage
/// ```rust,ignore
/// let spells = db.entities(Collection::Spells);
/// let id = spells.put(&fireball).await?;
/// let again = spells.get(id.as_str()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct EntityRepository {
    pool: SqlitePool,
    collection: Collection,
    changes: broadcast::Sender<StoreChange>,
}

impl EntityRepository {
    /// Creates a new EntityRepository.
    pub fn new(
        pool: SqlitePool,
        collection: Collection,
        changes: broadcast::Sender<StoreChange>,
    ) -> Self {
        EntityRepository {
            pool,
            collection,
            changes,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Inserts or replaces an entity by id.
    ///
    /// ## Returns
    /// * `Ok(EntityId)` - The key the entity was stored under
    /// * `Err(DbError::Validation)` - Binary invariants violated; nothing written
    pub async fn put(&self, entity: &Entity) -> DbResult<EntityId> {
        validate_entity(self.collection, entity)?;

        upsert(&self.pool, self.collection, entity, Utc::now()).await?;

        debug!(
            collection = %self.collection,
            id = %entity.id(),
            binary_bytes = entity.binary_len(),
            "Entity stored"
        );
        let _ = self.changes.send(StoreChange::Put {
            collection: self.collection,
            id: entity.id().clone(),
        });
        Ok(entity.id().clone())
    }

    /// Fetches one entity by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<Entity>> {
        let sql = format!(
            "SELECT id, body FROM {} WHERE id = ?1",
            self.collection.table_name()
        );
        let row: Option<(String, Vec<u8>)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(id, body)| decode_body(self.collection, id, &body))
            .transpose()
    }

    /// Fetches every entity of the collection.
    pub async fn get_all(&self) -> DbResult<Vec<Entity>> {
        let entities = fetch_all(&self.pool, self.collection).await?;
        debug!(collection = %self.collection, count = entities.len(), "Loaded collection");
        Ok(entities)
    }

    /// Deletes an entity. Deleting a missing id is not an error.
    ///
    /// ## Returns
    /// * `Ok(true)` - A row was deleted
    /// * `Ok(false)` - Nothing stored under that id
    pub async fn remove(&self, id: &str) -> DbResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.collection.table_name());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        let existed = result.rows_affected() > 0;
        debug!(collection = %self.collection, id = %id, existed, "Entity removed");
        if existed {
            let _ = self.changes.send(StoreChange::Removed {
                collection: self.collection,
                id: EntityId::from(id),
            });
        }
        Ok(existed)
    }

    /// Number of entities in the collection.
    pub async fn count(&self) -> DbResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.collection.table_name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    /// Deletes every entity of the collection.
    pub async fn clear(&self) -> DbResult<u64> {
        let deleted = delete_all(&self.pool, self.collection).await?;
        debug!(collection = %self.collection, deleted, "Collection cleared");
        let _ = self.changes.send(StoreChange::Cleared {
            collection: self.collection,
        });
        Ok(deleted)
    }
}

// =============================================================================
// Shared statements (also used inside snapshot transactions)
// =============================================================================

pub(crate) async fn upsert<'e, E>(
    executor: E,
    collection: Collection,
    entity: &Entity,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let body = encode_body(entity)?;
    let sql = format!(
        "INSERT INTO {} (id, body, updated_at) VALUES (?1, ?2, ?3) \
         ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        collection.table_name()
    );
    sqlx::query(&sql)
        .bind(entity.id().as_str())
        .bind(body)
        .bind(now)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn fetch_all<'e, E>(executor: E, collection: Collection) -> DbResult<Vec<Entity>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT id, body FROM {} ORDER BY rowid",
        collection.table_name()
    );
    let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(&sql).fetch_all(executor).await?;

    rows.into_iter()
        .map(|(id, body)| decode_body(collection, id, &body))
        .collect()
}

pub(crate) async fn delete_all<'e, E>(executor: E, collection: Collection) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("DELETE FROM {}", collection.table_name());
    let result = sqlx::query(&sql).execute(executor).await?;
    Ok(result.rows_affected())
}

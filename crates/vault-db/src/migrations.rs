//! # Database Migrations
//!
//! Embedded SQL migrations. The migration number doubles as the store
//! version: `001_initial_schema.sql` creates version 1 with one table per
//! collection.
//!
//! ## How Migrations Work
//! ```text
//! Open store
//!      │
//!      ▼
//! Check _sqlx_migrations table ── missing? create it
//!      │
//!      ▼
//! Compare embedded vs applied
//!      │  001_initial_schema.sql ✓
//!      │  002_....sql            ⬜ (pending)
//!      ▼
//! Run pending in order, record checksum
//! ```
//!
//! Never modify an existing migration; always add a new one.

use sqlx::SqlitePool;
use tracing::info;
use vault_core::{STORE_NAME, STORE_VERSION};

use crate::error::{DbError, DbResult};

/// Migrations from `migrations/sqlite/`, embedded at compile time.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)`.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}

/// Checks that the file is an RPG Vault store this build can read.
///
/// ## Returns
/// * `Ok(version)` - Store version recorded in `store_meta`
/// * `Err(StoreUnavailable)` - Foreign database, or written by a newer build
pub async fn verify_store_identity(pool: &SqlitePool) -> DbResult<u32> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM store_meta")
        .fetch_all(pool)
        .await?;

    let lookup = |key: &str| {
        rows.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    if lookup("store_name") != Some(STORE_NAME) {
        return Err(DbError::StoreUnavailable(format!(
            "not an {} database",
            STORE_NAME
        )));
    }

    let version = lookup("store_version")
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| DbError::StoreUnavailable("store version missing".to_string()))?;

    if version > STORE_VERSION {
        return Err(DbError::StoreUnavailable(format!(
            "store version {} is newer than supported version {}",
            version, STORE_VERSION
        )));
    }

    Ok(version)
}

//! # Database Error Types
//!
//! Error types for local store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      Pure errors (vault-core)              │
//! │       │                          ValidationError / FormatError          │
//! │       ▼                                 │                               │
//! │  DbError (this module) ◄────────────────┘                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError / CliError ← user-facing classification                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use vault_core::{FormatError, ValidationError};

/// Local store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The store is not open, or the engine could not open it.
    ///
    /// ## When This Occurs
    /// - Any operation before `LocalStore::open` completed
    /// - Database file can't be created (permissions, disk full)
    /// - Pool was closed
    #[error("Local store unavailable: {0}")]
    StoreUnavailable(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// An entity body could not be encoded for storage.
    #[error("Failed to encode entity: {0}")]
    Encoding(String),

    /// A stored row could not be decoded.
    ///
    /// ## When This Occurs
    /// - Body written by an incompatible build
    /// - Manual edits of the SQLite file
    #[error("Corrupt record {collection}/{id}: {reason}")]
    CorruptRecord {
        collection: String,
        id: String,
        reason: String,
    },

    /// The entity violates the binary field invariants.
    #[error("Invalid entity: {0}")]
    Validation(#[from] ValidationError),

    /// A snapshot document is malformed. Nothing was written.
    #[error("Malformed snapshot: {0}")]
    Format(#[from] FormatError),

    /// A guarded import was aborted before commit. Nothing was written.
    #[error("Import aborted before commit")]
    Canceled,

    /// Reading or writing a backup file failed.
    #[error("Backup file error: {0}")]
    Io(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a CorruptRecord error.
    pub fn corrupt(
        collection: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DbError::CorruptRecord {
            collection: collection.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::StoreUnavailable
/// sqlx::Error::Io / Tls       → DbError::StoreUnavailable
/// sqlx::Error::Database       → DbError::QueryFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::StoreUnavailable("Pool is closed".to_string()),
            sqlx::Error::Io(io) => DbError::StoreUnavailable(io.to_string()),
            sqlx::Error::Configuration(e) => DbError::StoreUnavailable(e.to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Io(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

//! # CLI Error Type
//!
//! Unified error type for command handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Error Flow in rpg-vault                             │
//! │                                                                         │
//! │  command handler ── Result<T, CliError>                                 │
//! │         │                                                               │
//! │         ├── DbError   ──┐                                               │
//! │         ├── SyncError ──┼──► CliError { code, message } ──► stderr      │
//! │         ├── io / json ──┘                                   exit code   │
//! │         ▼                                                               │
//! │  Success ──► stdout                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::process::ExitCode;
use vault_db::DbError;
use vault_sync::SyncError;

/// Error returned from a command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes, also used to pick the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad arguments or input document
    InvalidInput,

    /// Requested entity does not exist
    NotFound,

    /// Local store failure
    StoreError,

    /// Not logged in, or the session expired
    AuthRequired,

    /// No network connection
    Offline,

    /// Another sync operation is running
    Busy,

    /// Cloud round trip failed
    SyncFailed,

    /// Reading or writing a local file failed
    Io,

    /// Internal error
    Internal,
}

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        CliError::new(ErrorCode::NotFound, format!("{} not found: {}", collection, id))
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> ExitCode {
        let status: u8 = match self.code {
            ErrorCode::InvalidInput => 2,
            ErrorCode::NotFound => 3,
            ErrorCode::AuthRequired => 4,
            ErrorCode::Offline => 5,
            ErrorCode::Busy => 6,
            _ => 1,
        };
        ExitCode::from(status)
    }
}

/// Converts store errors to CLI errors.
impl From<DbError> for CliError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Validation(e) => CliError::invalid_input(e.to_string()),
            DbError::Format(e) => CliError::invalid_input(e.to_string()),
            DbError::Io(e) => CliError::new(ErrorCode::Io, e),
            DbError::QueryFailed(e) | DbError::TransactionFailed(e) => {
                tracing::error!("Store operation failed: {}", e);
                CliError::new(ErrorCode::StoreError, "Local store operation failed")
            }
            other => CliError::new(ErrorCode::StoreError, other.to_string()),
        }
    }
}

/// Converts sync errors to CLI errors, keeping the user-facing wording.
impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        let code = match &err {
            SyncError::AuthRequired | SyncError::SessionExpired => ErrorCode::AuthRequired,
            SyncError::NetworkUnavailable => ErrorCode::Offline,
            SyncError::Busy => ErrorCode::Busy,
            SyncError::Store(_) => ErrorCode::StoreError,
            SyncError::InvalidConfig(_)
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_) => ErrorCode::InvalidInput,
            SyncError::Internal(_) => ErrorCode::Internal,
            _ => ErrorCode::SyncFailed,
        };

        let message = if err.is_config_error() {
            err.to_string()
        } else {
            format!("{} ({})", err.user_message(), err)
        };
        CliError::new(code, message)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::new(ErrorCode::Io, err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for command handlers.
pub type CliResult<T> = Result<T, CliError>;

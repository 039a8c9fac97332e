//! # Sync Error Types
//!
//! Error types for cloud sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Preconditions  │  │     Transfer            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  NetworkUnavail.│  │  Canceled(reason)       │ │
//! │  │  InvalidUrl     │  │  AuthRequired   │  │  Transport              │ │
//! │  │  ConfigLoad/Save│  │  SessionExpired │  │  HttpStatus             │ │
//! │  └─────────────────┘  │  Busy           │  │  Format                 │ │
//! │                       └─────────────────┘  └─────────────────────────┘ │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Local store   │  │   Credentials   │                              │
//! │  │  Store(DbError) │  │  Credential     │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use vault_core::FormatError;
use vault_db::DbError;

use crate::cancel::CancelReason;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configured URL could not be used.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Preconditions
    // =========================================================================
    /// The connectivity monitor reports offline.
    #[error("No network connection")]
    NetworkUnavailable,

    /// No usable credential; the user has to log in.
    #[error("Not connected to cloud storage")]
    AuthRequired,

    /// The remote rejected the credential (HTTP 401). The cached credential
    /// has been cleared.
    #[error("Cloud session expired")]
    SessionExpired,

    /// A save or load is already running.
    #[error("Another sync operation is already in progress")]
    Busy,

    // =========================================================================
    // Transfer Errors
    // =========================================================================
    /// The operation was canceled before it finished.
    #[error("Operation canceled: {0}")]
    Canceled(CancelReason),

    /// Network or protocol failure talking to the remote.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success status other than 401.
    #[error("Cloud storage returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The downloaded document is not a valid snapshot.
    #[error("Malformed snapshot: {0}")]
    Format(#[from] FormatError),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Local store failure during export or restore.
    #[error("Local store error: {0}")]
    Store(#[from] DbError),

    /// Credential cache or identity provider failure.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Internal sync error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status == reqwest::StatusCode::UNAUTHORIZED => SyncError::SessionExpired,
            Some(status) => SyncError::HttpStatus {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => SyncError::Transport(err.to_string()),
        }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Internal(format!("JSON serialization failed: {}", err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the operation was canceled (by the user or by
    /// connectivity loss).
    pub fn is_canceled(&self) -> bool {
        matches!(self, SyncError::Canceled(_) | SyncError::Store(DbError::Canceled))
    }

    /// Returns true if the user has to (re)connect to the cloud.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::AuthRequired | SyncError::SessionExpired)
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Short message for the user.
    ///
    /// Errors without a dedicated message get a generic one; callers with
    /// more context (save vs load) may prefer their own.
    pub fn user_message(&self) -> &'static str {
        match self {
            SyncError::NetworkUnavailable => "No internet connection.",
            SyncError::AuthRequired => "Connect to the cloud first.",
            SyncError::SessionExpired => "Session expired. Please reconnect.",
            SyncError::Busy => "Another sync operation is already in progress.",
            SyncError::Canceled(reason) => reason.user_message(),
            SyncError::Store(DbError::Canceled) => CancelReason::UserRequested.user_message(),
            SyncError::Format(_) => "The cloud backup is damaged and was not restored.",
            _ => "Sync failed. Check your connection.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canceled_errors() {
        assert!(SyncError::Canceled(CancelReason::UserRequested).is_canceled());
        assert!(SyncError::Store(DbError::Canceled).is_canceled());
        assert!(!SyncError::Transport("reset".into()).is_canceled());
    }

    #[test]
    fn test_auth_errors() {
        assert!(SyncError::AuthRequired.is_auth_error());
        assert!(SyncError::SessionExpired.is_auth_error());
        assert!(!SyncError::NetworkUnavailable.is_auth_error());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            SyncError::Canceled(CancelReason::UserRequested).user_message(),
            "Operation canceled."
        );
        assert_eq!(
            SyncError::Canceled(CancelReason::ConnectionLost).user_message(),
            "Connection lost. Operation aborted."
        );
        assert_eq!(
            SyncError::SessionExpired.user_message(),
            "Session expired. Please reconnect."
        );
        assert_eq!(
            SyncError::HttpStatus {
                status: 500,
                message: "boom".into()
            }
            .user_message(),
            "Sync failed. Check your connection."
        );
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::HttpStatus {
            status: 403,
            message: "forbidden".into(),
        };
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("forbidden"));
    }
}

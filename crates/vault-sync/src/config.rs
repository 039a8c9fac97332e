//! # Vault Configuration
//!
//! Configuration for the local store location, the cloud drive endpoints,
//! credential caching and upload progress.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     RPG_VAULT_DB_PATH=/data/rpg_vault.db                               │
//! │     RPG_VAULT_API_URL=http://127.0.0.1:9000                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/rpg-vault/vault.toml (Linux)                             │
//! │     ~/Library/Application Support/com.rpgvault.rpg-vault/vault.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # vault.toml
//! [store]
//! database_path = "/home/me/rpg/rpg_vault.db"
//!
//! [remote]
//! file_name = "rpg_manager_db.json"
//! api_base_url = "https://www.googleapis.com"
//! upload_base_url = "https://www.googleapis.com"
//! probe_interval_secs = 15
//!
//! [auth]
//! expiry_margin_secs = 60
//! revoke_url = "https://oauth2.googleapis.com/revoke"
//!
//! [progress]
//! upload_tick_ms = 400
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use vault_core::REMOTE_FILE_NAME;

use crate::error::{SyncError, SyncResult};

/// Name of the store file inside the data directory.
pub const DATABASE_FILE_NAME: &str = "rpg_vault.db";

/// Name of the credential cache inside the data directory.
pub const TOKEN_CACHE_FILE_NAME: &str = "drive_token.json";

const DEFAULT_GOOGLE_API: &str = "https://www.googleapis.com";
const DEFAULT_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

// =============================================================================
// Store Settings
// =============================================================================

/// Local store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Cloud drive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Name of the single remote file holding the whole database.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Base URL for metadata and download requests.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL for upload requests.
    #[serde(default = "default_api_base_url")]
    pub upload_base_url: String,

    /// Per-request timeout. Unset means the HTTP client default (none).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Interval of the connectivity probe (seconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_file_name() -> String {
    REMOTE_FILE_NAME.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_GOOGLE_API.to_string()
}

fn default_probe_interval() -> u64 {
    15
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            file_name: default_file_name(),
            api_base_url: default_api_base_url(),
            upload_base_url: default_api_base_url(),
            request_timeout_secs: None,
            probe_interval_secs: default_probe_interval(),
        }
    }
}

// =============================================================================
// Auth Settings
// =============================================================================

/// Credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Credential cache file. Defaults to the platform data directory.
    #[serde(default)]
    pub token_cache_path: Option<PathBuf>,

    /// A cached credential is reused only if it stays valid this long.
    #[serde(default = "default_expiry_margin")]
    pub expiry_margin_secs: u64,

    /// Token revocation endpoint used on logout.
    #[serde(default = "default_revoke_url")]
    pub revoke_url: Option<String>,
}

fn default_expiry_margin() -> u64 {
    60
}

fn default_revoke_url() -> Option<String> {
    Some(DEFAULT_REVOKE_URL.to_string())
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            token_cache_path: None,
            expiry_margin_secs: default_expiry_margin(),
            revoke_url: default_revoke_url(),
        }
    }
}

// =============================================================================
// Progress Settings
// =============================================================================

/// Progress reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSettings {
    /// Interval between synthetic upload progress ticks (milliseconds).
    #[serde(default = "default_upload_tick")]
    pub upload_tick_ms: u64,
}

fn default_upload_tick() -> u64 {
    400
}

impl Default for ProgressSettings {
    fn default() -> Self {
        ProgressSettings {
            upload_tick_ms: default_upload_tick(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub progress: ProgressSettings,
}

impl VaultConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (vault.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.remote.file_name.trim().is_empty() {
            return Err(SyncError::InvalidConfig("remote file_name must not be empty".into()));
        }

        for url in [&self.remote.api_base_url, &self.remote.upload_base_url]
            .into_iter()
            .chain(self.auth.revoke_url.as_ref())
        {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SyncError::InvalidUrl(format!(
                    "URL must start with http:// or https://, got: {}",
                    url
                )));
            }
            url::Url::parse(url)?;
        }

        if self.progress.upload_tick_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "upload_tick_ms must be greater than 0".into(),
            ));
        }

        if self.remote.probe_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "probe_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("RPG_VAULT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("RPG_VAULT_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.remote.api_base_url = url;
        }

        if let Ok(url) = std::env::var("RPG_VAULT_UPLOAD_URL") {
            debug!(url = %url, "Overriding upload URL from environment");
            self.remote.upload_base_url = url;
        }

        if let Ok(name) = std::env::var("RPG_VAULT_REMOTE_FILE") {
            self.remote.file_name = name;
        }

        if let Ok(path) = std::env::var("RPG_VAULT_TOKEN_CACHE") {
            self.auth.token_cache_path = Some(PathBuf::from(path));
        }

        if let Ok(margin) = std::env::var("RPG_VAULT_EXPIRY_MARGIN_SECS") {
            match margin.parse::<u64>() {
                Ok(secs) => self.auth.expiry_margin_secs = secs,
                Err(_) => warn!(margin = %margin, "Ignoring invalid expiry margin in environment"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "rpgvault", "rpg-vault")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("vault.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Store file: configured path, else the platform data dir, else the
    /// working directory.
    pub fn database_path(&self) -> PathBuf {
        self.store.database_path.clone().unwrap_or_else(|| {
            Self::project_dirs()
                .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
        })
    }

    /// Credential cache file, resolved like [`database_path`](Self::database_path).
    pub fn token_cache_path(&self) -> PathBuf {
        self.auth.token_cache_path.clone().unwrap_or_else(|| {
            Self::project_dirs()
                .map(|dirs| dirs.data_dir().join(TOKEN_CACHE_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(TOKEN_CACHE_FILE_NAME))
        })
    }

    pub fn expiry_margin(&self) -> Duration {
        Duration::from_secs(self.auth.expiry_margin_secs)
    }

    pub fn upload_tick(&self) -> Duration {
        Duration::from_millis(self.progress.upload_tick_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.remote.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.remote.probe_interval_secs)
    }
}

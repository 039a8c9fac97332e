//! # Application State
//!
//! Everything a command needs, built once from the configuration.
//!
//! ```text
//! VaultConfig ──► AppState
//!                 ├── LocalStore          (opened lazily by data commands)
//!                 ├── CredentialManager   (file cache + static token provider)
//!                 ├── Connectivity        (fed by a reachability probe)
//!                 └── reqwest::Client     (shared by every HTTP user)
//! ```

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;
use vault_db::{DbConfig, LocalStore};
use vault_sync::{
    BroadcastEmitter, Connectivity, CredentialManager, FileCredentialCache, RemoteSettings,
    RemoteSyncClient, StaticTokenProvider, SyncEventEmitter, SyncOrchestrator, TokenGrant,
    VaultConfig, MAX_PROBE_WAIT,
};

use crate::error::CliResult;
use crate::terminal::{TerminalProgress, TerminalPrompt};

/// Shared state of one CLI invocation.
pub struct AppState {
    pub config: VaultConfig,
    pub store: Arc<LocalStore>,
    pub credentials: Arc<CredentialManager>,
    pub connectivity: Connectivity,
    pub events: Arc<BroadcastEmitter>,
    http: reqwest::Client,
}

impl AppState {
    /// Builds the state.
    ///
    /// ## Arguments
    /// * `config` - Loaded configuration
    /// * `grant` - Token handed over on the command line (for `login`)
    pub fn new(config: VaultConfig, grant: Option<TokenGrant>) -> CliResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(vault_sync::SyncError::from)?;

        let revoke_url = config
            .auth
            .revoke_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(vault_sync::SyncError::from)?;

        let mut provider = StaticTokenProvider::new(http.clone(), revoke_url);
        if let Some(grant) = grant {
            provider = provider.with_grant(grant);
        }

        let events = Arc::new(BroadcastEmitter::default());
        let emitter: Arc<dyn SyncEventEmitter> = events.clone();

        let credentials = CredentialManager::new(
            Arc::new(FileCredentialCache::new(config.token_cache_path())),
            Arc::new(provider),
            config.expiry_margin(),
        )
        .with_emitter(emitter);

        let database_path = config.database_path();
        debug!(?database_path, "Store location resolved");
        let store = LocalStore::new(DbConfig::new(database_path));

        Ok(AppState {
            config,
            store: Arc::new(store),
            credentials: Arc::new(credentials),
            connectivity: Connectivity::default(),
            events,
            http,
        })
    }

    /// Opens the store (creating its directory) and returns it.
    pub async fn open_store(&self) -> CliResult<&LocalStore> {
        if let Some(parent) = self.store.path().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.store.open().await?;
        info!(path = ?self.store.path(), "Local store open");
        Ok(&self.store)
    }

    /// Orchestrator wired to the terminal.
    pub fn orchestrator(&self, assume_yes: bool) -> CliResult<SyncOrchestrator> {
        let settings = RemoteSettings::from_config(&self.config)?;
        let remote = RemoteSyncClient::with_client(self.http.clone(), settings, self.credentials.clone());

        let emitter: Arc<dyn SyncEventEmitter> = self.events.clone();
        Ok(SyncOrchestrator::new(
            self.store.clone(),
            Arc::new(remote),
            self.connectivity.clone(),
            Arc::new(TerminalPrompt::new(assume_yes)),
            Arc::new(TerminalProgress),
        )
        .with_emitter(emitter))
    }

    /// Probes the drive API once and records the result.
    pub async fn check_online(&self) -> bool {
        match Url::parse(&self.config.remote.api_base_url) {
            Ok(url) => self.connectivity.check(&self.http, url, MAX_PROBE_WAIT).await,
            Err(_) => {
                self.connectivity.set_online(false);
                false
            }
        }
    }

    /// Starts probing the drive API for reachability.
    pub fn spawn_probe(&self) -> CliResult<JoinHandle<()>> {
        let url = Url::parse(&self.config.remote.api_base_url).map_err(vault_sync::SyncError::from)?;
        Ok(self
            .connectivity
            .spawn_probe(self.http.clone(), url, self.config.probe_interval()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> VaultConfig {
        let mut config = VaultConfig::default();
        config.store.database_path = Some(dir.join("vault.db"));
        config.auth.token_cache_path = Some(dir.join("token.json"));
        config.auth.revoke_url = None;
        config
    }

    #[tokio::test]
    async fn test_store_opens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config_in(dir.path()), None).unwrap();

        assert!(!state.store.is_open());
        state.open_store().await.unwrap();
        assert!(state.store.is_open());
        assert!(dir.path().join("vault.db").exists());
    }

    #[tokio::test]
    async fn test_login_with_grant_writes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let grant = TokenGrant {
            access_token: "pasted".into(),
            expires_in: 3600,
        };
        let state = AppState::new(config_in(dir.path()), Some(grant)).unwrap();

        state.credentials.login().await.unwrap();

        assert!(state.credentials.is_authenticated().await);
        assert!(dir.path().join("token.json").exists());
    }

    #[test]
    fn test_bad_revoke_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.auth.revoke_url = Some("::nope".into());

        assert!(AppState::new(config, None).is_err());
    }
}

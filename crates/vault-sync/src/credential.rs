//! # Cloud Credentials
//!
//! Holds the short-lived bearer token used against the cloud drive, caches
//! it across restarts, and drops it the moment the remote rejects it.
//!
//! ## Credential Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Credential Lifecycle                             │
//! │                                                                         │
//! │   startup ──► restore() ──┬── cached & now < expires_at - margin       │
//! │                           │        └──► authenticated                  │
//! │                           └── missing / stale ──► cache cleared        │
//! │                                                                         │
//! │   login()  ──► IdentityProvider::request_access ──► cache.store        │
//! │   logout() ──► IdentityProvider::revoke ──► cache.clear                │
//! │                                                                         │
//! │   access_token() ──┬── usable ──► bearer token                         │
//! │                    ├── none   ──► AuthRequired                         │
//! │                    └── stale  ──► expire() ──► SessionExpired          │
//! │                                                                         │
//! │   HTTP 401 from the remote ──► expire() ──► SessionExpired             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no refresh token: an expired session always means logging in
//! again.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, SyncEvent, SyncEventEmitter};

// =============================================================================
// Credential Types
// =============================================================================

/// What an identity provider hands out after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds, counted from the moment of the grant.
    pub expires_in: u64,
}

/// A bearer token with an absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredential {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessCredential {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        AccessCredential {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Turns a relative grant into an absolute credential.
    pub fn from_grant(grant: &TokenGrant, now: DateTime<Utc>) -> Self {
        let lifetime = i64::try_from(grant.expires_in).unwrap_or(i64::MAX);
        let expires_at = now
            .checked_add_signed(ChronoDuration::seconds(lifetime.min(i64::MAX / 1000)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        AccessCredential::new(grant.access_token.clone(), expires_at)
    }

    /// True if the credential stays valid for at least `margin` after `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>, margin: ChronoDuration) -> bool {
        match self.expires_at.checked_sub_signed(margin) {
            Some(deadline) => now < deadline,
            None => false,
        }
    }

    /// Seconds until expiry, zero once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

// =============================================================================
// Credential Cache
// =============================================================================

/// Persistent storage for the current credential.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    async fn load(&self) -> SyncResult<Option<AccessCredential>>;
    async fn store(&self, credential: &AccessCredential) -> SyncResult<()>;
    async fn clear(&self) -> SyncResult<()>;
}

/// JSON file cache.
#[derive(Debug, Clone)]
pub struct FileCredentialCache {
    path: PathBuf,
}

impl FileCredentialCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCredentialCache { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl CredentialCache for FileCredentialCache {
    async fn load(&self) -> SyncResult<Option<AccessCredential>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::Credential(e.to_string())),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SyncError::Credential(format!("unreadable token cache: {}", e)))
    }

    async fn store(&self, credential: &AccessCredential) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::Credential(e.to_string()))?;
        }

        let json = serde_json::to_vec(credential)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| SyncError::Credential(e.to_string()))
    }

    async fn clear(&self) -> SyncResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Credential(e.to_string())),
        }
    }
}

/// In-process cache, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryCredentialCache {
    slot: Mutex<Option<AccessCredential>>,
}

impl MemoryCredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: AccessCredential) -> Self {
        MemoryCredentialCache {
            slot: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialCache for MemoryCredentialCache {
    async fn load(&self) -> SyncResult<Option<AccessCredential>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn store(&self, credential: &AccessCredential) -> SyncResult<()> {
        *self.slot.lock().await = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> SyncResult<()> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

// =============================================================================
// Identity Provider
// =============================================================================

/// Whoever issues and revokes access tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Obtains a fresh token (the interactive login).
    async fn request_access(&self) -> SyncResult<TokenGrant>;

    /// Invalidates `access_token` at the issuer.
    async fn revoke(&self, access_token: &str) -> SyncResult<()>;
}

/// Provider for tokens obtained out of band (pasted on the command line,
/// handed over by a browser flow).
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    http: reqwest::Client,
    revoke_url: Option<Url>,
    grant: Option<TokenGrant>,
}

impl StaticTokenProvider {
    pub fn new(http: reqwest::Client, revoke_url: Option<Url>) -> Self {
        StaticTokenProvider {
            http,
            revoke_url,
            grant: None,
        }
    }

    pub fn with_grant(mut self, grant: TokenGrant) -> Self {
        self.grant = Some(grant);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn request_access(&self) -> SyncResult<TokenGrant> {
        self.grant
            .clone()
            .ok_or_else(|| SyncError::Credential("no access token supplied".into()))
    }

    async fn revoke(&self, access_token: &str) -> SyncResult<()> {
        let Some(url) = &self.revoke_url else {
            return Ok(());
        };

        let response = self
            .http
            .post(url.clone())
            .query(&[("token", access_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::HttpStatus {
                status: response.status().as_u16(),
                message: "token revocation rejected".into(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Credential Manager
// =============================================================================

/// Owns the current credential for the sync layer.
pub struct CredentialManager {
    cache: Arc<dyn CredentialCache>,
    provider: Arc<dyn IdentityProvider>,
    current: RwLock<Option<AccessCredential>>,
    margin: ChronoDuration,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl CredentialManager {
    /// ## Arguments
    /// * `cache` - Where the credential survives restarts
    /// * `provider` - Issues and revokes tokens
    /// * `margin` - A credential closer than this to expiry is not used
    pub fn new(
        cache: Arc<dyn CredentialCache>,
        provider: Arc<dyn IdentityProvider>,
        margin: Duration,
    ) -> Self {
        CredentialManager {
            cache,
            provider,
            current: RwLock::new(None),
            margin: ChronoDuration::from_std(margin).unwrap_or_else(|_| ChronoDuration::zero()),
            emitter: Arc::new(NoOpEmitter),
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Restores a cached credential at startup.
    ///
    /// ## Returns
    /// True if a usable credential was found. A stale one is removed from
    /// the cache.
    pub async fn restore(&self) -> bool {
        self.restore_at(Utc::now()).await
    }

    pub async fn restore_at(&self, now: DateTime<Utc>) -> bool {
        let cached = match self.cache.load().await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Could not read cached credential");
                None
            }
        };

        match cached {
            Some(credential) if credential.is_usable_at(now, self.margin) => {
                debug!(
                    remaining_secs = credential.remaining_secs(now),
                    "Restored cached credential"
                );
                *self.current.write().await = Some(credential);
                true
            }
            stale => {
                if stale.is_some() {
                    info!("Cached credential expired, discarding");
                }
                if let Err(e) = self.cache.clear().await {
                    warn!(error = %e, "Could not clear credential cache");
                }
                *self.current.write().await = None;
                false
            }
        }
    }

    /// Interactive login through the identity provider.
    pub async fn login(&self) -> SyncResult<()> {
        let grant = self.provider.request_access().await?;
        let credential = AccessCredential::from_grant(&grant, Utc::now());

        self.cache.store(&credential).await?;
        info!(expires_at = %credential.expires_at, "Connected to cloud storage");
        *self.current.write().await = Some(credential);

        self.emitter.emit(SyncEvent::LoginSucceeded);
        Ok(())
    }

    /// Revokes and forgets the credential. Revocation failures are logged,
    /// the local credential is dropped regardless.
    pub async fn logout(&self) -> SyncResult<()> {
        let previous = self.current.write().await.take();

        if let Some(credential) = previous {
            if let Err(e) = self.provider.revoke(&credential.access_token).await {
                warn!(error = %e, "Token revocation failed");
            }
        }

        self.cache.clear().await?;
        info!("Disconnected from cloud storage");
        self.emitter.emit(SyncEvent::LoggedOut);
        Ok(())
    }

    /// Bearer token for the next request.
    ///
    /// ## Errors
    /// * `AuthRequired` - nobody is logged in
    /// * `SessionExpired` - the credential ran out; it has been discarded
    pub async fn access_token(&self) -> SyncResult<String> {
        let now = Utc::now();
        {
            let guard = self.current.read().await;
            match guard.as_ref() {
                None => return Err(SyncError::AuthRequired),
                Some(credential) if credential.is_usable_at(now, self.margin) => {
                    return Ok(credential.access_token.clone());
                }
                Some(_) => {}
            }
        }

        self.expire().await;
        Err(SyncError::SessionExpired)
    }

    /// True while a usable credential is held.
    pub async fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.is_usable_at(Utc::now(), self.margin))
    }

    /// Current credential, if any, without checking its expiry.
    pub async fn current(&self) -> Option<AccessCredential> {
        self.current.read().await.clone()
    }

    /// Drops the credential after the remote rejected it or it ran out.
    pub async fn expire(&self) {
        let had_credential = self.current.write().await.take().is_some();

        if let Err(e) = self.cache.clear().await {
            warn!(error = %e, "Could not clear credential cache");
        }

        if had_credential {
            warn!("Cloud session expired");
            self.emitter.emit(SyncEvent::SessionExpired);
        }
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("margin_secs", &self.margin.num_seconds())
            .finish_non_exhaustive()
    }
}

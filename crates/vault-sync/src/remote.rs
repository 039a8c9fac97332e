//! # Remote Sync Client
//!
//! Talks to the cloud drive holding the single snapshot file.
//!
//! ## Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Drive Round Trips                               │
//! │                                                                         │
//! │  locate    GET  {api}/drive/v3/files?q=name = '<file>' and trashed...  │
//! │                 ──► {"files":[{"id":"..."}]}   (first match wins)      │
//! │                                                                         │
//! │  download  GET  {api}/drive/v3/files/{id}?alt=media   (streamed)       │
//! │                                                                         │
//! │  upload    POST  {upload}/upload/drive/v3/files?uploadType=multipart   │
//! │            PATCH {upload}/upload/drive/v3/files/{id}?uploadType=...    │
//! │                 body: multipart/related                                │
//! │                   part 1: {"name": "...", "mimeType": "..."}           │
//! │                   part 2: the snapshot JSON                            │
//! │                                                                         │
//! │  every request: Authorization: Bearer <token>                          │
//! │  HTTP 401 ──► credential discarded ──► SessionExpired                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Progress
//! ```text
//! download:  0 connecting ─ 10 ─[ bytes received 10..95 ]─ 95 parsing ─ 100
//! upload:    5 serializing ─ 10 locating ─ 20 ─ 30 ─[ synthetic ticks ]─ 100
//! ```
//! Uploads report nothing while the body is in flight, so the bar creeps
//! toward 95 on a timer until the response arrives.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;
use vault_core::{
    FormatError, Progress, ProgressUpdate, SnapshotDocument, SyncPhase, SyntheticProgress, SNAPSHOT_MIME_TYPE,
};

use crate::cancel::CancelToken;
use crate::config::VaultConfig;
use crate::credential::CredentialManager;
use crate::error::{SyncError, SyncResult};
use crate::progress::ProgressSink;

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 200;

// =============================================================================
// Remote Trait
// =============================================================================

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file_id: String,
    /// True if the file did not exist before.
    pub created: bool,
}

/// Remote storage for the whole-database snapshot.
#[async_trait]
pub trait SnapshotRemote: Send + Sync {
    /// Downloads the snapshot. `Ok(None)` means no backup exists yet.
    async fn download_snapshot(
        &self,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> SyncResult<Option<SnapshotDocument>>;

    /// Creates or replaces the remote snapshot.
    async fn upload_snapshot(
        &self,
        doc: &SnapshotDocument,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> SyncResult<UploadOutcome>;
}

// =============================================================================
// Settings
// =============================================================================

/// Endpoints and tuning for [`RemoteSyncClient`].
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub api_base: Url,
    pub upload_base: Url,
    pub file_name: String,
    pub upload_tick: Duration,
    pub request_timeout: Option<Duration>,
}

impl RemoteSettings {
    pub fn new(api_base: &str, upload_base: &str) -> SyncResult<Self> {
        Ok(RemoteSettings {
            api_base: base_url(api_base)?,
            upload_base: base_url(upload_base)?,
            file_name: vault_core::REMOTE_FILE_NAME.to_string(),
            upload_tick: Duration::from_millis(400),
            request_timeout: None,
        })
    }

    pub fn from_config(config: &VaultConfig) -> SyncResult<Self> {
        Ok(Self::new(&config.remote.api_base_url, &config.remote.upload_base_url)?
            .file_name(config.remote.file_name.clone())
            .upload_tick(config.upload_tick())
            .request_timeout(config.request_timeout()))
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn upload_tick(mut self, tick: Duration) -> Self {
        self.upload_tick = tick;
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Parses a base URL so that relative joins append to its path.
fn base_url(raw: &str) -> SyncResult<Url> {
    let mut normalized = raw.trim_end_matches('/').to_string();
    normalized.push('/');
    Ok(Url::parse(&normalized)?)
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    id: String,
}

// =============================================================================
// Client
// =============================================================================

/// Drive-backed [`SnapshotRemote`].
pub struct RemoteSyncClient {
    http: reqwest::Client,
    settings: RemoteSettings,
    credentials: Arc<CredentialManager>,
}

impl RemoteSyncClient {
    pub fn new(settings: RemoteSettings, credentials: Arc<CredentialManager>) -> SyncResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, settings, credentials))
    }

    pub fn with_client(
        http: reqwest::Client,
        settings: RemoteSettings,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        RemoteSyncClient {
            http,
            settings,
            credentials,
        }
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Finds the snapshot file by name.
    ///
    /// ## Returns
    /// The id of the first non-trashed match, or `None`.
    pub async fn locate_remote_file(&self) -> SyncResult<Option<String>> {
        let token = self.credentials.access_token().await?;
        let url = self.settings.api_base.join("drive/v3/files")?;
        let query = name_query(&self.settings.file_name);

        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[("q", query.as_str()), ("fields", "files(id, name)")])
            .send()
            .await?;
        let response = self.check_status(response).await?;

        let list: FileList = read_json(response).await?;
        let found = list.files.into_iter().next().map(|f| f.id);
        debug!(file = %self.settings.file_name, found = ?found, "Located remote snapshot");
        Ok(found)
    }

    /// Passes successful responses through; maps the rest to errors.
    async fn check_status(&self, response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.credentials.expire().await;
            return Err(SyncError::SessionExpired);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::HttpStatus {
            status: status.as_u16(),
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    fn upload_url(&self, file_id: Option<&str>) -> SyncResult<Url> {
        let path = match file_id {
            Some(id) => format!("upload/drive/v3/files/{}", id),
            None => "upload/drive/v3/files".to_string(),
        };
        Ok(self.settings.upload_base.join(&path)?)
    }
}

#[async_trait]
impl SnapshotRemote for RemoteSyncClient {
    async fn download_snapshot(
        &self,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> SyncResult<Option<SnapshotDocument>> {
        progress.report(ProgressUpdate::at(SyncPhase::Locating, 0.0, "Connecting..."));

        let Some(file_id) = cancel.run(self.locate_remote_file()).await? else {
            info!(file = %self.settings.file_name, "No cloud backup found");
            return Ok(None);
        };

        progress.report(ProgressUpdate::at(SyncPhase::Downloading, 10.0, "Downloading..."));

        let token = self.credentials.access_token().await?;
        let url = self
            .settings
            .api_base
            .join(&format!("drive/v3/files/{}", file_id))?;
        let request = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[("alt", "media")]);

        let response = cancel
            .run(async { request.send().await.map_err(SyncError::from) })
            .await?;
        let response = self.check_status(response).await?;

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut body = Vec::new();

        loop {
            let chunk = tokio::select! {
                biased;
                reason = cancel.cancelled() => {
                    debug!(received = body.len(), "Download canceled");
                    return Err(SyncError::Canceled(reason));
                }
                chunk = stream.next() => chunk,
            };

            let Some(chunk) = chunk else { break };
            body.extend_from_slice(&chunk?);
            progress.report(ProgressUpdate::new(
                SyncPhase::Downloading,
                Progress::transfer(body.len() as u64, total, 10.0, 95.0),
                "Downloading...",
            ));
        }

        progress.report(ProgressUpdate::at(SyncPhase::Parsing, 95.0, "Processing file..."));
        let doc = SnapshotDocument::from_slice(&body)?;

        info!(
            file_id = %file_id,
            bytes = body.len(),
            entities = doc.entity_count(),
            "Downloaded cloud snapshot"
        );
        progress.report(ProgressUpdate::at(SyncPhase::Done, 100.0, "Done!"));
        Ok(Some(doc))
    }

    async fn upload_snapshot(
        &self,
        doc: &SnapshotDocument,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> SyncResult<UploadOutcome> {
        progress.report(ProgressUpdate::at(SyncPhase::Serializing, 5.0, "Preparing upload..."));
        let content = doc.to_json_string()?;
        cancel.check()?;

        progress.report(ProgressUpdate::at(SyncPhase::Locating, 10.0, "Connecting..."));
        let existing = cancel.run(self.locate_remote_file()).await?;

        progress.report(ProgressUpdate::at(SyncPhase::Uploading, 20.0, "Preparing upload..."));
        let boundary = format!("rpg-vault-{}", Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &self.settings.file_name, &content);

        let token = self.credentials.access_token().await?;
        let request = match existing.as_deref() {
            Some(id) => self.http.patch(self.upload_url(Some(id))?),
            None => self.http.post(self.upload_url(None)?),
        }
        .bearer_auth(&token)
        .query(&[("uploadType", "multipart")])
        .header(
            CONTENT_TYPE,
            format!("multipart/related; boundary={}", boundary),
        )
        .body(body);

        progress.report(ProgressUpdate::at(SyncPhase::Uploading, 30.0, "Sending data..."));

        let send = request.send();
        tokio::pin!(send);

        let tick = self.settings.upload_tick;
        let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
        let mut synthetic = SyntheticProgress::new(30.0, 95.0);

        let response = loop {
            tokio::select! {
                biased;
                reason = cancel.cancelled() => {
                    debug!("Upload canceled");
                    return Err(SyncError::Canceled(reason));
                }
                result = &mut send => break result?,
                _ = ticker.tick() => {
                    progress.report(ProgressUpdate::at(
                        SyncPhase::Uploading,
                        synthetic.advance(),
                        "Sending data...",
                    ));
                }
            }
        };
        let response = self.check_status(response).await?;

        let uploaded: RemoteFile = read_json(response).await?;
        let outcome = UploadOutcome {
            file_id: uploaded.id,
            created: existing.is_none(),
        };

        info!(
            file_id = %outcome.file_id,
            created = outcome.created,
            bytes = content.len(),
            "Uploaded cloud snapshot"
        );
        progress.report(ProgressUpdate::at(SyncPhase::Done, 100.0, "Done!"));
        Ok(outcome)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Reads a JSON body. A body that does not parse is a format error, not a
/// transport one.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> SyncResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SyncError::Format(FormatError::InvalidJson(e.to_string())))
}

/// Drive search expression matching `file_name` outside the trash.
fn name_query(file_name: &str) -> String {
    let escaped = file_name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{}' and trashed = false", escaped)
}

/// Two-part `multipart/related` body: metadata, then content.
fn multipart_body(boundary: &str, file_name: &str, content: &str) -> String {
    let metadata = serde_json::json!({
        "name": file_name,
        "mimeType": SNAPSHOT_MIME_TYPE,
    });

    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
         --{b}\r\nContent-Type: {mime}\r\n\r\n{content}\r\n\
         --{b}--\r\n",
        b = boundary,
        meta = metadata,
        mime = SNAPSHOT_MIME_TYPE,
        content = content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let settings = RemoteSettings::new("http://127.0.0.1:9000", "http://127.0.0.1:9000/api/").unwrap();

        assert_eq!(
            settings.api_base.join("drive/v3/files").unwrap().as_str(),
            "http://127.0.0.1:9000/drive/v3/files"
        );
        assert_eq!(
            settings.upload_base.join("upload/drive/v3/files").unwrap().as_str(),
            "http://127.0.0.1:9000/api/upload/drive/v3/files"
        );
        assert!(RemoteSettings::new("not a url", "http://x").is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = VaultConfig::default();
        config.remote.file_name = "campaign.json".into();
        config.progress.upload_tick_ms = 25;

        let settings = RemoteSettings::from_config(&config).unwrap();
        assert_eq!(settings.file_name, "campaign.json");
        assert_eq!(settings.upload_tick, Duration::from_millis(25));
        assert_eq!(settings.api_base.as_str(), "https://www.googleapis.com/");
    }

    #[test]
    fn test_name_query_escapes_quotes() {
        assert_eq!(
            name_query("rpg_manager_db.json"),
            "name = 'rpg_manager_db.json' and trashed = false"
        );
        assert_eq!(name_query("it's"), "name = 'it\\'s' and trashed = false");
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("XYZ", "rpg_manager_db.json", r#"{"rpgCards":[]}"#);
        let parts: Vec<&str> = body.split("--XYZ").collect();

        // preamble, metadata, content, closing
        assert_eq!(parts.len(), 4);
        assert!(parts[1].contains(r#""name":"rpg_manager_db.json""#));
        assert!(parts[1].contains(r#""mimeType":"application/json""#));
        assert!(parts[2].ends_with("\r\n\r\n{\"rpgCards\":[]}\r\n"));
        assert_eq!(parts[3], "--\r\n");
    }
}

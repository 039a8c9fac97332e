//! Remote client and orchestrator against a mock Drive server.

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vault_core::{Collection, Entity, ProgressUpdate, SyncPhase, Value};
use vault_db::{DbConfig, LocalStore};
use vault_sync::*;

// =============================================================================
// Mock Drive
// =============================================================================

const GOOD_TOKEN: &str = "good-token";

#[derive(Default)]
struct MockDrive {
    file: Option<(String, String)>,
    requests: Vec<String>,
    stall_download: bool,
    slow_upload: bool,
}

type Shared = Arc<Mutex<MockDrive>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", GOOD_TOKEN))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "invalid credentials").into_response()
}

/// Content part of a two-part `multipart/related` body.
fn content_part(headers: &HeaderMap, body: &str) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let boundary = content_type.split("boundary=").nth(1)?;
    let part = body.split(&format!("--{}", boundary)).nth(2)?;
    let (_, content) = part.split_once("\r\n\r\n")?;
    Some(content.trim_end_matches("\r\n").to_string())
}

async fn list_files(
    State(drive): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    drive.lock().unwrap().requests.push("GET list".into());
    if !authorized(&headers) {
        return unauthorized();
    }

    let query = params.get("q").cloned().unwrap_or_default();
    assert!(query.contains("trashed = false"));

    let files = match &drive.lock().unwrap().file {
        Some((id, _)) if query.contains("rpg_manager_db.json") => {
            vec![json!({ "id": id, "name": "rpg_manager_db.json" })]
        }
        _ => Vec::new(),
    };
    Json(json!({ "files": files })).into_response()
}

async fn download_file(
    State(drive): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    drive.lock().unwrap().requests.push("GET media".into());
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(params.get("alt").map(String::as_str), Some("media"));

    let (content, stall) = {
        let drive = drive.lock().unwrap();
        match &drive.file {
            Some((file_id, content)) if *file_id == id => (content.clone(), drive.stall_download),
            _ => return StatusCode::NOT_FOUND.into_response(),
        }
    };

    if !stall {
        return content.into_response();
    }

    // First half, then nothing.
    let length = content.len();
    let first = Bytes::from(content.into_bytes()).slice(..length / 2);
    let body = stream::once(async move { Ok::<_, std::io::Error>(first) }).chain(stream::pending());

    Response::builder()
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(body))
        .unwrap()
}

async fn store_upload(drive: &Shared, headers: &HeaderMap, body: &str, id: String) -> Response {
    let Some(content) = content_part(headers, body) else {
        return (StatusCode::BAD_REQUEST, "missing content part").into_response();
    };

    let slow = {
        let mut drive = drive.lock().unwrap();
        drive.file = Some((id.clone(), content));
        drive.slow_upload
    };
    if slow {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }

    Json(json!({ "id": id, "name": "rpg_manager_db.json" })).into_response()
}

async fn create_file(
    State(drive): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    drive.lock().unwrap().requests.push("POST upload".into());
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(params.get("uploadType").map(String::as_str), Some("multipart"));

    store_upload(&drive, &headers, &body, "file-1".into()).await
}

async fn update_file(
    State(drive): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: String,
) -> Response {
    drive.lock().unwrap().requests.push("PATCH upload".into());
    if !authorized(&headers) {
        return unauthorized();
    }

    let exists = matches!(&drive.lock().unwrap().file, Some((file_id, _)) if *file_id == id);
    if !exists {
        return StatusCode::NOT_FOUND.into_response();
    }

    store_upload(&drive, &headers, &body, id).await
}

async fn spawn_drive(drive: Shared) -> String {
    let app = Router::new()
        .route("/drive/v3/files", get(list_files))
        .route("/drive/v3/files/{id}", get(download_file))
        .route("/upload/drive/v3/files", post(create_file))
        .route("/upload/drive/v3/files/{id}", patch(update_file))
        .with_state(drive);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

// =============================================================================
// Fixtures
// =============================================================================

struct AutoPrompt {
    notices: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl UserPrompt for AutoPrompt {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }

    fn alert(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn notify(&self, message: &str, _severity: Severity) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

struct SilentIndicator;

impl ProgressIndicator for SilentIndicator {
    fn show(&self, _title: &str) {}
    fn update(&self, _update: &ProgressUpdate) {}
    fn hide(&self) {}
}

async fn credentials(token: &str, cache: Arc<MemoryCredentialCache>) -> Arc<CredentialManager> {
    cache
        .store(&AccessCredential::new(token, Utc::now() + ChronoDuration::hours(1)))
        .await
        .unwrap();

    let manager = CredentialManager::new(
        cache,
        Arc::new(StaticTokenProvider::new(reqwest::Client::new(), None)),
        Duration::from_secs(60),
    );
    assert!(manager.restore().await);
    Arc::new(manager)
}

async fn client(base: &str, token: &str) -> (RemoteSyncClient, Arc<MemoryCredentialCache>) {
    let cache = Arc::new(MemoryCredentialCache::new());
    let settings = RemoteSettings::new(base, base)
        .unwrap()
        .upload_tick(Duration::from_millis(20));
    let client = RemoteSyncClient::new(settings, credentials(token, cache.clone()).await).unwrap();
    (client, cache)
}

async fn open_store() -> Arc<LocalStore> {
    let store = Arc::new(LocalStore::new(DbConfig::in_memory()));
    store.open().await.unwrap();
    store
}

struct Rig {
    drive: Shared,
    store: Arc<LocalStore>,
    prompt: Arc<AutoPrompt>,
    connectivity: Connectivity,
    orchestrator: Arc<SyncOrchestrator>,
}

async fn rig(drive: Shared, base: &str, emitter: Arc<dyn SyncEventEmitter>) -> Rig {
    let (remote, _) = client(base, GOOD_TOKEN).await;
    let store = open_store().await;
    let prompt = Arc::new(AutoPrompt {
        notices: Mutex::new(Vec::new()),
    });
    let connectivity = Connectivity::new(true);

    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        Arc::new(remote),
        connectivity.clone(),
        prompt.clone(),
        Arc::new(SilentIndicator),
    )
    .with_emitter(emitter);

    Rig {
        drive,
        store,
        prompt,
        connectivity,
        orchestrator: Arc::new(orchestrator),
    }
}

fn grimoire() -> Entity {
    let mut book = Entity::new("1700000000002").with("name", "Tome of Embers");
    book.push_page(Value::map([
        ("title", Value::from("Fireball")),
        ("image", Value::Bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00])),
        ("imageMimeType", Value::from("image/jpeg")),
    ]));
    book
}

async fn wait_for_request(drive: &Shared, request: &str) {
    while !drive.lock().unwrap().requests.iter().any(|r| r == request) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Remote Client
// =============================================================================

#[tokio::test]
async fn upload_creates_then_updates() {
    let drive = Shared::default();
    let base = spawn_drive(drive.clone()).await;
    let (client, _) = client(&base, GOOD_TOKEN).await;

    assert_eq!(client.locate_remote_file().await.unwrap(), None);

    let first = vault_core::SnapshotDocument::encode([(
        Collection::Characters,
        vec![Entity::new("1").with("name", "Aria")],
    )]);
    let outcome = client
        .upload_snapshot(&first, &CancelToken::new(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        UploadOutcome {
            file_id: "file-1".into(),
            created: true
        }
    );

    let second = vault_core::SnapshotDocument::encode([(Collection::Characters, Vec::new())]);
    let (sink, mut updates) = ChannelProgress::channel();
    let outcome = client
        .upload_snapshot(&second, &CancelToken::new(), &sink)
        .await
        .unwrap();
    assert!(!outcome.created);
    drop(sink);

    let requests = drive.lock().unwrap().requests.clone();
    assert_eq!(
        requests,
        vec!["GET list", "GET list", "POST upload", "GET list", "PATCH upload"]
    );
    assert_eq!(
        drive.lock().unwrap().file.as_ref().map(|(_, c)| c.clone()),
        Some(r#"{"rpgCards":[]}"#.to_string())
    );

    let mut last = None;
    while let Some(update) = updates.recv().await {
        last = update.progress.as_percent();
    }
    assert_eq!(last, Some(100.0));
}

#[tokio::test]
async fn download_returns_none_without_backup() {
    let base = spawn_drive(Shared::default()).await;
    let (client, _) = client(&base, GOOD_TOKEN).await;

    let doc = client
        .download_snapshot(&CancelToken::new(), &NoProgress)
        .await
        .unwrap();
    assert!(doc.is_none());
}

#[tokio::test]
async fn download_can_be_canceled_mid_stream() {
    let drive = Shared::default();
    {
        let mut state = drive.lock().unwrap();
        state.file = Some(("file-1".into(), format!(r#"{{"rpgCards":[{{"id":"1","name":"{}"}}]}}"#, "x".repeat(200))));
        state.stall_download = true;
    }
    let base = spawn_drive(drive.clone()).await;
    let (client, _) = client(&base, GOOD_TOKEN).await;

    let cancel = CancelToken::new();
    let (sink, mut updates) = ChannelProgress::channel();

    let watcher = async {
        while let Some(update) = updates.recv().await {
            let partial = update.phase == SyncPhase::Downloading
                && update.progress.as_percent().is_some_and(|p| p > 10.0);
            if partial {
                cancel.cancel(CancelReason::UserRequested);
                return update;
            }
        }
        panic!("no partial download progress");
    };

    let (result, partial) = tokio::join!(client.download_snapshot(&cancel, &sink), watcher);

    assert!(matches!(result, Err(SyncError::Canceled(CancelReason::UserRequested))));
    assert!(partial.progress.as_percent().unwrap() < 95.0);
}

#[tokio::test]
async fn unauthorized_clears_credential() {
    let base = spawn_drive(Shared::default()).await;
    let (client, cache) = client(&base, "stale-token").await;

    let result = client.locate_remote_file().await;

    assert!(matches!(result, Err(SyncError::SessionExpired)));
    assert!(cache.load().await.unwrap().is_none());
    assert!(!client.credentials().is_authenticated().await);
    assert!(matches!(
        client.locate_remote_file().await,
        Err(SyncError::AuthRequired)
    ));
}

#[tokio::test]
async fn unparsable_listing_is_a_format_error() {
    let app = Router::new().route("/drive/v3/files", get(|| async { "not json" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (client, _) = client(&base, GOOD_TOKEN).await;
    let err = client.locate_remote_file().await.unwrap_err();

    assert!(matches!(err, SyncError::Format(_)), "got {:?}", err);
    assert!(!err.is_auth_error());
}

// =============================================================================
// Orchestrator End to End
// =============================================================================

#[tokio::test]
async fn save_then_load_into_another_store() {
    let drive = Shared::default();
    let base = spawn_drive(drive.clone()).await;

    let saver = rig(drive.clone(), &base, Arc::new(NoOpEmitter)).await;
    let hero = Entity::new("1700000000001")
        .with("name", "Aria")
        .with_binary("image", vec![0x89, b'P', b'N', b'G', 0, 1, 2], "image/png");
    saver.store.put(Collection::Characters, &hero).await.unwrap();
    saver.store.put(Collection::Grimoires, &grimoire()).await.unwrap();

    let saved = saver.orchestrator.perform_save().await.unwrap();
    assert!(matches!(saved, SyncOutcome::Saved { created: true, .. }));

    let emitter = Arc::new(BroadcastEmitter::new(32));
    let mut events = emitter.subscribe();
    let loader = rig(drive, &base, emitter).await;
    loader
        .store
        .put(Collection::Characters, &Entity::new("9").with("name", "Stranger"))
        .await
        .unwrap();

    let loaded = loader.orchestrator.perform_load().await.unwrap();
    assert_eq!(loaded, SyncOutcome::Restored { entities: 2 });

    assert_eq!(
        loader.store.get_all(Collection::Characters).await.unwrap(),
        vec![hero]
    );
    assert_eq!(
        loader.store.get_all(Collection::Grimoires).await.unwrap(),
        vec![grimoire()]
    );

    let reloads = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| *event == SyncEvent::ReloadRequired)
        .count();
    assert_eq!(reloads, 1);
    assert!(loader
        .prompt
        .notices
        .lock()
        .unwrap()
        .contains(&"Data loaded! Reload to see the changes.".to_string()));
}

#[tokio::test]
async fn load_without_backup_keeps_local_data() {
    let drive = Shared::default();
    let base = spawn_drive(drive.clone()).await;
    let rig = rig(drive, &base, Arc::new(NoOpEmitter)).await;
    rig.store
        .put(Collection::Spells, &Entity::new("1").with("name", "Shield"))
        .await
        .unwrap();

    let outcome = rig.orchestrator.perform_load().await.unwrap();

    assert_eq!(outcome, SyncOutcome::NoBackup);
    assert_eq!(rig.store.count(Collection::Spells).await.unwrap(), 1);
}

#[tokio::test]
async fn connectivity_loss_aborts_upload() {
    let drive = Shared::default();
    drive.lock().unwrap().slow_upload = true;
    let base = spawn_drive(drive.clone()).await;
    let rig = rig(drive, &base, Arc::new(NoOpEmitter)).await;

    let running = {
        let orchestrator = rig.orchestrator.clone();
        tokio::spawn(async move { orchestrator.perform_save().await })
    };

    wait_for_request(&rig.drive, "POST upload").await;
    rig.connectivity.set_online(false);

    let outcome = running.await.unwrap().unwrap();
    assert_eq!(outcome, SyncOutcome::Canceled(CancelReason::ConnectionLost));
    assert_eq!(
        rig.prompt.notices.lock().unwrap().last().cloned(),
        Some("Connection lost. Operation aborted.".to_string())
    );
    assert_eq!(rig.orchestrator.state(), vault_core::OperationState::Idle);
}

#[tokio::test]
async fn concurrent_operation_is_rejected() {
    let drive = Shared::default();
    drive.lock().unwrap().slow_upload = true;
    let base = spawn_drive(drive.clone()).await;
    let rig = rig(drive, &base, Arc::new(NoOpEmitter)).await;

    let running = {
        let orchestrator = rig.orchestrator.clone();
        tokio::spawn(async move { orchestrator.perform_save().await })
    };
    wait_for_request(&rig.drive, "POST upload").await;

    assert!(matches!(rig.orchestrator.perform_load().await, Err(SyncError::Busy)));

    assert!(rig.orchestrator.cancel_active().await);
    assert_eq!(
        running.await.unwrap().unwrap(),
        SyncOutcome::Canceled(CancelReason::UserRequested)
    );
}

//! # Sync Orchestrator
//!
//! Runs one whole-database save or load at a time: connectivity check,
//! confirmation, progress, cancellation, user feedback.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      perform_save / perform_load                        │
//! │                                                                         │
//! │  gate.try_lock ──✗──► Busy                                              │
//! │       │                                                                 │
//! │  online? ──✗──► "No internet connection." ──► NetworkUnavailable       │
//! │       │                                                                 │
//! │  Confirming ── confirm() ──✗──► Idle ──► Declined                       │
//! │       │                                                                 │
//! │  InProgress   CancelToken ◄── cancel_active()                           │
//! │       │            ▲                                                    │
//! │       │            └──────── connectivity goes offline                  │
//! │       │                                                                 │
//! │       │  save: export ──► upload (20..95)                               │
//! │       │  load: download (5..95) ──► guarded import ──► ReloadRequired   │
//! │       │                                                                 │
//! │       ├──► Completed ─┐                                                 │
//! │       ├──► Canceled  ─┼──► Idle                                         │
//! │       └──► Failed    ─┘                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The progress indicator is released before any message is shown.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vault_core::{OperationKind, OperationState, ProgressUpdate, SyncPhase};
use vault_db::LocalStore;

use crate::cancel::{CancelReason, CancelToken};
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, SyncEvent, SyncEventEmitter};
use crate::progress::{ProgressSink, ScaledProgress};
use crate::remote::SnapshotRemote;
use crate::ui::{ProgressGuard, ProgressIndicator, Severity, UserPrompt};

// =============================================================================
// Outcome and Status
// =============================================================================

/// How a save or load ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The local snapshot is now the cloud backup.
    Saved { file_id: String, created: bool },
    /// Local data was replaced by the cloud backup.
    Restored { entities: usize },
    /// The cloud holds no backup; nothing changed.
    NoBackup,
    /// The user declined the confirmation.
    Declined,
    /// Stopped before finishing; nothing changed locally.
    Canceled(CancelReason),
}

impl SyncOutcome {
    /// True if views showing local data must reload.
    pub fn reload_required(&self) -> bool {
        matches!(self, SyncOutcome::Restored { .. })
    }
}

/// Observable state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncStatus {
    /// The running operation, `None` while idle.
    pub kind: Option<OperationKind>,
    pub state: OperationState,
}

// =============================================================================
// Messages
// =============================================================================

fn confirm_message(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Save => "This will replace the backup in the cloud. Continue?",
        OperationKind::Load => "This will replace ALL local data with the cloud copy. Continue?",
    }
}

fn progress_title(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Save => "Saving to the cloud",
        OperationKind::Load => "Loading from the cloud",
    }
}

fn failure_message(kind: OperationKind, err: &SyncError) -> &'static str {
    if err.is_auth_error() {
        return err.user_message();
    }
    match kind {
        OperationKind::Save => "Error while saving. Check your connection.",
        OperationKind::Load => "Error while loading from the cloud.",
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Sequences cloud saves and loads against the local store.
pub struct SyncOrchestrator {
    store: Arc<LocalStore>,
    remote: Arc<dyn SnapshotRemote>,
    connectivity: Connectivity,
    prompt: Arc<dyn UserPrompt>,
    indicator: Arc<dyn ProgressIndicator>,
    emitter: Arc<dyn SyncEventEmitter>,
    /// Held for the whole operation; `try_lock` failure means busy.
    gate: Mutex<()>,
    active: Mutex<Option<CancelToken>>,
    status: watch::Sender<SyncStatus>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn SnapshotRemote>,
        connectivity: Connectivity,
        prompt: Arc<dyn UserPrompt>,
        indicator: Arc<dyn ProgressIndicator>,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        SyncOrchestrator {
            store,
            remote,
            connectivity,
            prompt,
            indicator,
            emitter: Arc::new(NoOpEmitter),
            gate: Mutex::new(()),
            active: Mutex::new(None),
            status,
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn state(&self) -> OperationState {
        self.status.borrow().state
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Uploads the whole local database, replacing the cloud backup.
    /// Local data is not modified.
    pub async fn perform_save(&self) -> SyncResult<SyncOutcome> {
        self.perform(OperationKind::Save).await
    }

    /// Replaces the whole local database with the cloud backup.
    pub async fn perform_load(&self) -> SyncResult<SyncOutcome> {
        self.perform(OperationKind::Load).await
    }

    /// Cancels the running transfer on the user's behalf.
    ///
    /// ## Returns
    /// False if nothing was running or it was already canceled.
    pub async fn cancel_active(&self) -> bool {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(token) => {
                let canceled = token.cancel(CancelReason::UserRequested);
                if canceled {
                    info!("Sync operation canceled by user");
                }
                canceled
            }
            None => false,
        }
    }

    /// Shows "You are offline." / "Connection restored." whenever the
    /// connectivity signal flips, and emits `ConnectivityChanged`.
    pub fn spawn_connectivity_notifier(&self) -> JoinHandle<()> {
        let mut rx = self.connectivity.subscribe();
        let prompt = Arc::clone(&self.prompt);
        let emitter = Arc::clone(&self.emitter);

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                emitter.emit(SyncEvent::ConnectivityChanged { online });
                if online {
                    prompt.notify("Connection restored.", Severity::Success);
                } else {
                    prompt.notify("You are offline.", Severity::Warning);
                }
            }
        })
    }

    // =========================================================================
    // Operation Driver
    // =========================================================================

    async fn perform(&self, kind: OperationKind) -> SyncResult<SyncOutcome> {
        let Ok(_gate) = self.gate.try_lock() else {
            warn!(%kind, "Sync operation rejected, another one is running");
            return Err(SyncError::Busy);
        };

        if !self.connectivity.is_online() {
            self.prompt.notify(SyncError::NetworkUnavailable.user_message(), Severity::Warning);
            return Err(SyncError::NetworkUnavailable);
        }

        self.transition(kind, OperationState::Confirming);
        if !self.prompt.confirm(confirm_message(kind)).await {
            info!(%kind, "Sync operation declined");
            self.transition(kind, OperationState::Idle);
            return Ok(SyncOutcome::Declined);
        }

        self.transition(kind, OperationState::InProgress);
        info!(%kind, "Sync operation started");

        let cancel = CancelToken::new();
        *self.active.lock().await = Some(cancel.clone());
        let watcher = self.watch_connection(cancel.clone());

        let result = {
            let guard = ProgressGuard::show(self.indicator.as_ref(), progress_title(kind));
            match kind {
                OperationKind::Save => self.run_save(&cancel, &guard).await,
                OperationKind::Load => self.run_load(&cancel, &guard).await,
            }
        };

        drop(watcher);
        self.active.lock().await.take();

        let outcome = match result {
            Err(err) if cancel.is_cancelled() || err.is_canceled() => {
                let reason = cancel.reason().unwrap_or(CancelReason::UserRequested);
                debug!(error = %err, "Sync operation stopped by cancellation");
                Ok(SyncOutcome::Canceled(reason))
            }
            other => other,
        };

        let outcome = match outcome {
            Ok(SyncOutcome::Canceled(reason)) => {
                info!(%kind, %reason, "Sync operation canceled");
                self.transition(kind, OperationState::Canceled);
                self.prompt.notify(reason.user_message(), Severity::Warning);
                Ok(SyncOutcome::Canceled(reason))
            }
            Ok(outcome) => {
                info!(%kind, ?outcome, "Sync operation completed");
                self.transition(kind, OperationState::Completed);
                self.announce(&outcome);
                Ok(outcome)
            }
            Err(err) => {
                error!(%kind, error = %err, "Sync operation failed");
                self.transition(kind, OperationState::Failed);
                self.prompt.notify(failure_message(kind, &err), Severity::Error);
                Err(err)
            }
        };

        self.transition(kind, OperationState::Idle);
        outcome
    }

    async fn run_save(
        &self,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> SyncResult<SyncOutcome> {
        progress.report(ProgressUpdate::at(SyncPhase::Preparing, 0.0, "Preparing data..."));
        progress.report(ProgressUpdate::at(SyncPhase::Preparing, 5.0, "Preparing data..."));

        let doc = self.store.export_snapshot().await?;
        cancel.check()?;
        debug!(entities = doc.entity_count(), "Exported local snapshot");

        progress.report(ProgressUpdate::at(SyncPhase::Serializing, 20.0, "Preparing upload..."));

        let uploaded = self
            .remote
            .upload_snapshot(&doc, cancel, &ScaledProgress::new(progress, 20.0, 95.0))
            .await?;

        progress.report(ProgressUpdate::at(SyncPhase::Done, 100.0, "Done!"));
        Ok(SyncOutcome::Saved {
            file_id: uploaded.file_id,
            created: uploaded.created,
        })
    }

    async fn run_load(
        &self,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> SyncResult<SyncOutcome> {
        progress.report(ProgressUpdate::at(SyncPhase::Preparing, 0.0, "Connecting..."));
        progress.report(ProgressUpdate::at(SyncPhase::Locating, 5.0, "Connecting..."));

        let downloaded = self
            .remote
            .download_snapshot(cancel, &ScaledProgress::new(progress, 5.0, 95.0))
            .await?;
        cancel.check()?;

        let Some(doc) = downloaded else {
            return Ok(SyncOutcome::NoBackup);
        };

        progress.report(ProgressUpdate::at(SyncPhase::Restoring, 98.0, "Restoring database..."));
        let summary = self
            .store
            .import_snapshot_guarded(&doc, || cancel.is_cancelled())
            .await?;

        progress.report(ProgressUpdate::at(SyncPhase::Done, 100.0, "Done!"));
        self.emitter.emit(SyncEvent::ReloadRequired);

        Ok(SyncOutcome::Restored {
            entities: summary.entity_count(),
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Cancels `cancel` with `ConnectionLost` once the signal reads offline.
    fn watch_connection(&self, cancel: CancelToken) -> AbortOnDrop {
        let connectivity = self.connectivity.clone();
        AbortOnDrop(tokio::spawn(async move {
            connectivity.wait_offline().await;
            if cancel.cancel(CancelReason::ConnectionLost) {
                warn!("Connection lost during sync operation");
            }
        }))
    }

    fn announce(&self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Saved { .. } => {
                self.prompt.notify("Saved to the cloud.", Severity::Success);
            }
            SyncOutcome::Restored { .. } => {
                self.prompt.alert("Data loaded! Reload to see the changes.");
            }
            SyncOutcome::NoBackup => {
                self.prompt.notify("No backup found in the cloud.", Severity::Info);
            }
            SyncOutcome::Declined | SyncOutcome::Canceled(_) => {}
        }
    }

    fn transition(&self, kind: OperationKind, next: OperationState) {
        self.status.send_modify(|status| {
            if !status.state.can_transition_to(next) {
                warn!(from = ?status.state, to = ?next, "Unexpected sync state transition");
            }
            *status = SyncStatus {
                kind: (next != OperationState::Idle).then_some(kind),
                state: next,
            };
        });
        debug!(%kind, state = ?next, "Sync state changed");
        self.emitter.emit(SyncEvent::StateChanged { kind, state: next });
    }
}

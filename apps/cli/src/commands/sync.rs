//! # Sync Commands
//!
//! Session management and the cloud save/load round trips.
//!
//! ## Interrupts
//! ```text
//! perform_save/perform_load ──────────────────────────► outcome
//!        ▲
//!        └── Ctrl-C ──► cancel_active() ──► Canceled(UserRequested)
//! ```
//! A second Ctrl-C is not intercepted and ends the process.

use std::future::Future;
use chrono::Utc;
use tracing::debug;
use vault_core::Collection;
use vault_sync::{SyncOrchestrator, SyncOutcome, SyncResult};

use crate::error::{CliError, CliResult, ErrorCode};
use crate::state::AppState;

/// Stores the token given on the command line.
pub async fn login(state: &AppState) -> CliResult<()> {
    state.credentials.login().await?;
    println!("🔑 Connected to cloud storage");
    Ok(())
}

/// Revokes and forgets the stored token.
pub async fn logout(state: &AppState) -> CliResult<()> {
    state.credentials.restore().await;
    state.credentials.logout().await?;
    println!("👋 Disconnected from cloud storage");
    Ok(())
}

/// Prints session, connectivity and local entity counts.
pub async fn status(state: &AppState) -> CliResult<()> {
    let logged_in = state.credentials.restore().await;
    match state.credentials.current().await {
        Some(credential) if logged_in => println!(
            "Session:  connected ({} min left)",
            credential.remaining_secs(Utc::now()) / 60
        ),
        _ => println!("Session:  not connected"),
    }

    let online = state.check_online().await;
    println!("Network:  {}", if online { "online" } else { "offline" });

    let store = state.open_store().await?;
    println!("Store:    {}", store.path().display());
    for collection in Collection::ALL {
        println!("  {:<12} {}", collection.name(), store.count(collection).await?);
    }
    Ok(())
}

/// Uploads the local snapshot as the cloud backup.
pub async fn save(state: &AppState, assume_yes: bool) -> CliResult<SyncOutcome> {
    let orchestrator = prepare(state, assume_yes).await?;
    let outcome = until_interrupted(&orchestrator, orchestrator.perform_save()).await?;
    report(&outcome);
    Ok(outcome)
}

/// Replaces local data with the cloud backup.
pub async fn load(state: &AppState, assume_yes: bool) -> CliResult<SyncOutcome> {
    let orchestrator = prepare(state, assume_yes).await?;
    let outcome = until_interrupted(&orchestrator, orchestrator.perform_load()).await?;
    report(&outcome);
    Ok(outcome)
}

async fn prepare(state: &AppState, assume_yes: bool) -> CliResult<SyncOrchestrator> {
    if !state.credentials.restore().await {
        return Err(CliError::new(
            ErrorCode::AuthRequired,
            "Not connected to cloud storage. Run `rpg-vault login` first.",
        ));
    }
    state.open_store().await?;

    let mut events = state.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            debug!(?event, "Sync event");
        }
    });

    // Settle reachability before the orchestrator's offline gate reads it.
    let online = state.check_online().await;
    debug!(online, "Initial connectivity");

    // The background check dies with the runtime when the command returns.
    state.spawn_probe()?;

    let orchestrator = state.orchestrator(assume_yes)?;
    orchestrator.spawn_connectivity_notifier();
    Ok(orchestrator)
}

/// Drives `operation`, turning the first Ctrl-C into a cancellation.
async fn until_interrupted<F>(orchestrator: &SyncOrchestrator, operation: F) -> SyncResult<SyncOutcome>
where
    F: Future<Output = SyncResult<SyncOutcome>>,
{
    tokio::pin!(operation);

    tokio::select! {
        result = &mut operation => return result,
        Ok(()) = tokio::signal::ctrl_c() => {
            orchestrator.cancel_active().await;
        }
    }

    operation.await
}

/// One-line summary of an outcome for stdout.
pub fn outcome_line(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Saved { created: true, .. } => "Backup created in the cloud.".to_string(),
        SyncOutcome::Saved { created: false, .. } => "Cloud backup updated.".to_string(),
        SyncOutcome::Restored { entities } => format!("Restored {} entities.", entities),
        SyncOutcome::NoBackup => "Nothing to restore.".to_string(),
        SyncOutcome::Declined => "Nothing changed.".to_string(),
        SyncOutcome::Canceled(reason) => format!("Stopped: {}", reason.user_message()),
    }
}

fn report(outcome: &SyncOutcome) {
    println!("{}", outcome_line(outcome));
}

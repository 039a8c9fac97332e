//! # User Interaction
//!
//! The two UI collaborators the orchestrator talks to, and a guard that
//! keeps the progress indicator's show/hide balanced on every exit path.

use async_trait::async_trait;
use vault_core::ProgressUpdate;

use crate::progress::ProgressSink;

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Confirmation dialogs and notifications.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Asks a yes/no question. `false` means declined.
    async fn confirm(&self, message: &str) -> bool;

    /// Shows a message the user has to acknowledge.
    fn alert(&self, message: &str);

    /// Shows a short transient notification.
    fn notify(&self, message: &str, severity: Severity);
}

/// A modal progress display.
pub trait ProgressIndicator: Send + Sync {
    fn show(&self, title: &str);
    fn update(&self, update: &ProgressUpdate);
    fn hide(&self);
}

/// Shows an indicator on creation and hides it on drop.
///
/// ```rust,ignore
/// let guard = ProgressGuard::show(indicator.as_ref(), "Saving to the cloud");
/// remote.upload_snapshot(&doc, &cancel, &guard).await?; // hidden even on `?`
/// ```
pub struct ProgressGuard<'a> {
    indicator: &'a dyn ProgressIndicator,
}

impl<'a> ProgressGuard<'a> {
    pub fn show(indicator: &'a dyn ProgressIndicator, title: &str) -> Self {
        indicator.show(title);
        ProgressGuard { indicator }
    }
}

impl ProgressSink for ProgressGuard<'_> {
    fn report(&self, update: ProgressUpdate) {
        self.indicator.update(&update);
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.indicator.hide();
    }
}

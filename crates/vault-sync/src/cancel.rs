//! # Cancellation
//!
//! Cooperative cancellation shared by the orchestrator and the transfer it
//! runs. The first reason recorded wins.
//!
//! ```text
//! user presses cancel ──┐
//!                       ├──► token.cancel(reason) ──► watch ──► transfer select! drops request
//! connectivity offline ─┘
//! ```

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{SyncError, SyncResult};

/// Why an operation stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The user canceled.
    UserRequested,
    /// The connection dropped while the operation was running.
    ConnectionLost,
}

impl CancelReason {
    pub fn user_message(&self) -> &'static str {
        match self {
            CancelReason::UserRequested => "Operation canceled.",
            CancelReason::ConnectionLost => "Connection lost. Operation aborted.",
        }
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::UserRequested => write!(f, "canceled by user"),
            CancelReason::ConnectionLost => write!(f, "connection lost"),
        }
    }
}

/// Cloneable cancellation handle. All clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<Option<CancelReason>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        CancelToken {
            state: Arc::new(state),
        }
    }

    /// Requests cancellation. Returns false if it was already canceled.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.state.borrow()
    }

    /// `Err(Canceled)` once cancellation was requested.
    pub fn check(&self) -> SyncResult<()> {
        match self.reason() {
            Some(reason) => Err(SyncError::Canceled(reason)),
            None => Ok(()),
        }
    }

    /// Resolves when cancellation is requested.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.state.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Runs `future` unless cancellation comes first, in which case the
    /// future is dropped.
    pub async fn run<F, T>(&self, future: F) -> SyncResult<T>
    where
        F: Future<Output = SyncResult<T>>,
    {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(SyncError::Canceled(reason)),
            result = future => result,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        assert!(token.cancel(CancelReason::ConnectionLost));
        assert!(!token.cancel(CancelReason::UserRequested));

        assert_eq!(token.reason(), Some(CancelReason::ConnectionLost));
        assert!(matches!(
            token.check(),
            Err(SyncError::Canceled(CancelReason::ConnectionLost))
        ));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();

        let waiter = tokio::spawn(async move { clone.cancelled().await });
        token.cancel(CancelReason::UserRequested);

        assert_eq!(waiter.await.unwrap(), CancelReason::UserRequested);
    }

    #[tokio::test]
    async fn test_run_drops_future_on_cancel() {
        let token = CancelToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel(CancelReason::UserRequested);
        });

        let result: SyncResult<()> = token
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(SyncError::Canceled(CancelReason::UserRequested))));
    }

    #[tokio::test]
    async fn test_run_on_already_cancelled_token() {
        let token = CancelToken::new();
        token.cancel(CancelReason::UserRequested);

        let result = token.run(async { Ok(42) }).await;
        assert!(result.is_err());
    }
}

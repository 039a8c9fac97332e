//! # Progress Sinks
//!
//! Where progress updates go. A sink is any closure, a channel sender
//! (for an async stream of updates), or a band of another sink.
//!
//! ```text
//! RemoteSyncClient ──0..100──► ScaledProgress(20, 95) ──20..95──► ProgressGuard ──► UI
//! ```

use tokio::sync::mpsc;
use vault_core::ProgressUpdate;

/// Receives progress updates. Must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Forwards updates into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelProgress {
    /// Creates a sink and the receiver that yields its updates. The
    /// receiver ends once every sink clone is dropped.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelProgress { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, update: ProgressUpdate) {
        let _ = self.tx.send(update);
    }
}

/// Maps another sink's 0..100 scale into `[low, high]`.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressSink,
    low: f32,
    high: f32,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a dyn ProgressSink, low: f32, high: f32) -> Self {
        ScaledProgress { inner, low, high }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn report(&self, update: ProgressUpdate) {
        self.inner.report(update.scaled(self.low, self.high));
    }
}

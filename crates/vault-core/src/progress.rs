//! # Progress and Operation State
//!
//! Pure types describing where a save or load currently is.
//!
//! ## Operation Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   One save / load operation                             │
//! │                                                                         │
//! │   Idle ──► Confirming ──► InProgress ──┬──► Completed ──┐              │
//! │    ▲           │                       ├──► Canceled  ──┤              │
//! │    │           │ declined              └──► Failed    ──┤              │
//! │    └───────────┴────────────────────────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Progress Bands
//! ```text
//! save:  0 ─ 5 preparing ─ 20 serialized ─[ upload 20..95 ]─ 100
//! load:  0 ─ 5 connecting ─[ download 5..95 ]─ 98 restoring ─ 100
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Progress
// =============================================================================

/// A progress reading: a percentage, or "busy, size unknown".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
#[ts(export)]
pub enum Progress {
    Percent(f32),
    Indeterminate,
}

impl Progress {
    /// A clamped percentage.
    pub fn percent(value: f32) -> Self {
        Progress::Percent(value.clamp(0.0, 100.0))
    }

    pub fn as_percent(&self) -> Option<f32> {
        match self {
            Progress::Percent(p) => Some(*p),
            Progress::Indeterminate => None,
        }
    }

    /// Maps a 0..100 reading into the `[low, high]` band of a parent scale.
    ///
    /// ## Example
    /// ```rust
    /// use vault_core::Progress;
    ///
    /// let child = Progress::percent(50.0);
    /// assert_eq!(child.scaled(20.0, 95.0), Progress::Percent(57.5));
    /// assert_eq!(Progress::Indeterminate.scaled(20.0, 95.0), Progress::Indeterminate);
    /// ```
    pub fn scaled(self, low: f32, high: f32) -> Self {
        match self {
            Progress::Percent(p) => Progress::percent(low + (high - low) * (p / 100.0)),
            Progress::Indeterminate => Progress::Indeterminate,
        }
    }

    /// Percentage of a transfer between `start` and `end` after `loaded` of
    /// `total` bytes. Unknown totals are indeterminate.
    pub fn transfer(loaded: u64, total: Option<u64>, start: f32, end: f32) -> Self {
        match total {
            Some(total) if total > 0 => {
                let fraction = (loaded as f64 / total as f64).min(1.0) as f32;
                Progress::percent(start + fraction * (end - start))
            }
            _ => Progress::Indeterminate,
        }
    }
}

/// Named step of a save or load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncPhase {
    Preparing,
    Serializing,
    Locating,
    Uploading,
    Downloading,
    Parsing,
    Restoring,
    Done,
}

/// One report delivered to a progress observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProgressUpdate {
    pub phase: SyncPhase,
    pub progress: Progress,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(phase: SyncPhase, progress: Progress, message: impl Into<String>) -> Self {
        ProgressUpdate {
            phase,
            progress,
            message: message.into(),
        }
    }

    /// Shorthand for a percentage update.
    pub fn at(phase: SyncPhase, percent: f32, message: impl Into<String>) -> Self {
        Self::new(phase, Progress::percent(percent), message)
    }

    /// Same update with its progress mapped into `[low, high]`.
    pub fn scaled(mut self, low: f32, high: f32) -> Self {
        self.progress = self.progress.scaled(low, high);
        self
    }
}

// =============================================================================
// Synthetic Progress
// =============================================================================

/// Asymptotic progress for transfers that report nothing while running.
///
/// Each tick closes 10% of the remaining gap to the ceiling, so the bar keeps
/// moving but never reaches the ceiling by itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticProgress {
    current: f32,
    ceiling: f32,
}

impl SyntheticProgress {
    pub fn new(start: f32, ceiling: f32) -> Self {
        SyntheticProgress {
            current: start,
            ceiling,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Advances one tick and returns the new value.
    pub fn advance(&mut self) -> f32 {
        self.current += (self.ceiling - self.current) * 0.1;
        if self.current >= self.ceiling {
            // Rounding can land on the ceiling after many ticks.
            self.current = f32::from_bits(self.ceiling.to_bits() - 1);
        }
        self.current
    }
}

// =============================================================================
// Operation State
// =============================================================================

/// Which of the two whole-database operations is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OperationKind {
    Save,
    Load,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Save => write!(f, "save"),
            OperationKind::Load => write!(f, "load"),
        }
    }
}

/// State of the sync orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OperationState {
    #[default]
    Idle,
    Confirming,
    InProgress,
    Completed,
    Canceled,
    Failed,
}

impl OperationState {
    /// Returns true if the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, next),
            (Idle, Confirming)
                | (Confirming, InProgress)
                | (Confirming, Idle)
                | (InProgress, Completed)
                | (InProgress, Canceled)
                | (InProgress, Failed)
                | (Completed, Idle)
                | (Canceled, Idle)
                | (Failed, Idle)
        )
    }

    /// Returns true if an operation is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, OperationState::Confirming | OperationState::InProgress)
    }

    /// Returns true for the three end states of an operation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Canceled | OperationState::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(Progress::percent(120.0), Progress::Percent(100.0));
        assert_eq!(Progress::percent(-3.0), Progress::Percent(0.0));
    }

    #[test]
    fn test_transfer_progress() {
        assert_eq!(Progress::transfer(0, Some(200), 10.0, 95.0), Progress::Percent(10.0));
        assert_eq!(Progress::transfer(100, Some(200), 10.0, 95.0), Progress::Percent(52.5));
        assert_eq!(Progress::transfer(200, Some(200), 10.0, 95.0), Progress::Percent(95.0));
        assert_eq!(Progress::transfer(50, None, 10.0, 95.0), Progress::Indeterminate);
    }

    #[test]
    fn test_synthetic_progress_never_reaches_ceiling() {
        let mut ticker = SyntheticProgress::new(30.0, 95.0);
        let first = ticker.advance();
        assert!((first - 36.5).abs() < 1e-4);

        let mut last = first;
        for _ in 0..1000 {
            let next = ticker.advance();
            assert!(next >= last);
            assert!(next < 95.0);
            last = next;
        }
    }

    #[test]
    fn test_state_transitions() {
        use OperationState::*;
        assert!(Idle.can_transition_to(Confirming));
        assert!(Confirming.can_transition_to(Idle));
        assert!(InProgress.can_transition_to(Canceled));
        assert!(Failed.can_transition_to(Idle));

        assert!(!Idle.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Canceled.can_transition_to(Completed));
    }

    #[test]
    fn test_progress_serialization() {
        let update = ProgressUpdate::at(SyncPhase::Uploading, 42.0, "Uploading...");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["phase"], "uploading");
        assert_eq!(json["progress"]["kind"], "percent");
        assert_eq!(json["progress"]["value"], 42.0);
    }
}

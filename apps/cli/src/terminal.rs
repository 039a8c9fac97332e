//! # Terminal UI
//!
//! Confirmation, notifications and the progress line, on stdin/stderr.

use async_trait::async_trait;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use vault_core::{Progress, ProgressUpdate};
use vault_sync::{ProgressIndicator, Severity, UserPrompt};

/// y/N prompt on stdin. `assume_yes` answers every question with yes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(assume_yes: bool) -> Self {
        TerminalPrompt { assume_yes }
    }
}

/// Reads a y/N answer. Anything but an explicit yes declines.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl UserPrompt for TerminalPrompt {
    async fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        eprint!("{} [y/N] ", message);
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) => is_yes(&line),
            Err(_) => false,
        }
    }

    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn notify(&self, message: &str, severity: Severity) {
        let marker = match severity {
            Severity::Info => "ℹ️ ",
            Severity::Success => "✅",
            Severity::Warning => "⚠️ ",
            Severity::Error => "❌",
        };
        eprintln!("{} {}", marker, message);
    }
}

/// Single-line progress display on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalProgress;

/// Text of one progress line.
pub fn progress_line(update: &ProgressUpdate) -> String {
    match update.progress {
        Progress::Percent(p) => format!("[{:>3.0}%] {}", p, update.message),
        Progress::Indeterminate => format!("[ .. ] {}", update.message),
    }
}

impl ProgressIndicator for TerminalProgress {
    fn show(&self, title: &str) {
        eprintln!("{}", title);
    }

    fn update(&self, update: &ProgressUpdate) {
        eprint!("\r{:<60}", progress_line(update));
        let _ = std::io::stderr().flush();
    }

    fn hide(&self) {
        eprintln!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::SyncPhase;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_progress_line() {
        let update = ProgressUpdate::at(SyncPhase::Uploading, 42.4, "Sending data...");
        assert_eq!(progress_line(&update), "[ 42%] Sending data...");

        let unknown = ProgressUpdate::new(SyncPhase::Downloading, Progress::Indeterminate, "Downloading...");
        assert_eq!(progress_line(&unknown), "[ .. ] Downloading...");
    }

    #[tokio::test]
    async fn test_assume_yes_skips_stdin() {
        assert!(TerminalPrompt::new(true).confirm("Continue?").await);
    }
}

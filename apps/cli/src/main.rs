//! # rpg-vault
//!
//! Binary entry point. Everything lives in the `vault_cli` library so the
//! commands can be tested without spawning a process.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    vault_cli::run().await
}

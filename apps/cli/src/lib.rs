//! # RPG Vault CLI
//!
//! Command line front end for the local vault and its cloud backup.
//!
//! ## Module Organization
//! ```text
//! vault_cli/
//! ├── lib.rs          ◄─── You are here (argument parsing & dispatch)
//! ├── state.rs        ◄─── AppState: store, credentials, connectivity
//! ├── terminal.rs     ◄─── y/N prompt, notifications, progress line
//! ├── commands/
//! │   ├── entity.rs   ◄─── put / get / remove
//! │   ├── backup.rs   ◄─── export / export-images / import (local files)
//! │   └── sync.rs     ◄─── login / logout / status / save / load
//! └── error.rs        ◄─── CliError and exit codes
//! ```
//!
//! stdout carries command output; logs, prompts and progress go to stderr.

pub mod commands;
pub mod error;
pub mod state;
pub mod terminal;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use vault_core::Collection;
use vault_sync::{SyncError, TokenGrant, VaultConfig};

use error::CliResult;
use state::AppState;

/// Local-first vault for RPG character sheets, with cloud backup.
#[derive(Debug, Parser)]
#[command(name = "rpg-vault", version, about)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "RPG_VAULT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Insert or replace an entity from a JSON file ("-" reads stdin)
    Put {
        collection: Collection,
        input: String,
        /// Picture stored in the entity's image field
        #[arg(long)]
        image: Option<PathBuf>,
        /// MIME type of --image (guessed from the extension otherwise)
        #[arg(long, requires = "image")]
        mime: Option<String>,
    },
    /// Print one entity, or the whole collection
    Get {
        collection: Collection,
        id: Option<String>,
    },
    /// Delete an entity
    Remove { collection: Collection, id: String },
    /// Write every collection to a local backup file
    Export { path: Option<PathBuf> },
    /// Write every stored picture to a zip archive
    ExportImages { path: Option<PathBuf> },
    /// Replace local data from a backup file
    Import { path: PathBuf },
    /// Store an access token for the cloud drive
    Login {
        #[arg(long, env = "RPG_VAULT_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
        /// Token lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        expires_in: u64,
    },
    /// Revoke and forget the stored token
    Logout,
    /// Show session, network and store status
    Status,
    /// Upload local data as the cloud backup
    Save {
        /// Skip the confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Replace local data with the cloud backup
    Load {
        /// Skip the confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

/// Parses arguments, runs one command and maps the result to an exit code.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  1. Initialize Logging ─── EnvFilter, RUST_LOG overrides the default    │
/// │  2. Load Config ────────── vault.toml + RPG_VAULT_* overrides           │
/// │  3. Build AppState ─────── store (unopened), credentials, connectivity │
/// │  4. Dispatch ───────────── commands::{entity, backup, sync}             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn run() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    debug!(?cli.command, "Starting rpg-vault");

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = ?e.code, "Command failed");
            eprintln!("❌ {}", e.message);
            e.exit_code()
        }
    }
}

/// Runs a parsed command line.
pub async fn execute(cli: Cli) -> CliResult<()> {
    let config = VaultConfig::load(cli.config.clone())?;

    let grant = match &cli.command {
        Command::Login { token, expires_in } => Some(TokenGrant {
            access_token: token.clone(),
            expires_in: *expires_in,
        }),
        _ => None,
    };
    let state = AppState::new(config, grant)?;

    match cli.command {
        Command::Put {
            collection,
            input,
            image,
            mime,
        } => {
            let store = state.open_store().await?;
            commands::entity::put(store, collection, &input, image.as_deref(), mime.as_deref())
                .await?;
        }
        Command::Get { collection, id } => {
            let store = state.open_store().await?;
            commands::entity::get(store, collection, id.as_deref()).await?;
        }
        Command::Remove { collection, id } => {
            let store = state.open_store().await?;
            commands::entity::remove(store, collection, &id).await?;
        }
        Command::Export { path } => {
            let store = state.open_store().await?;
            commands::backup::export(store, path.as_deref()).await?;
        }
        Command::ExportImages { path } => {
            let store = state.open_store().await?;
            commands::backup::export_images(store, path.as_deref()).await?;
        }
        Command::Import { path } => {
            let store = state.open_store().await?;
            commands::backup::import(store, &path).await?;
        }
        Command::Login { .. } => commands::sync::login(&state).await?,
        Command::Logout => commands::sync::logout(&state).await?,
        Command::Status => commands::sync::status(&state).await?,
        Command::Save { yes } => {
            commands::sync::save(&state, yes).await?;
        }
        Command::Load { yes } => {
            commands::sync::load(&state, yes).await?;
        }
        Command::Config { write } => {
            let text = toml::to_string_pretty(&state.config).map_err(SyncError::from)?;
            println!("{}", text);
            if write {
                state.config.save(cli.config)?;
            }
        }
    }

    state.store.close().await;
    info!("Done");
    Ok(())
}

/// Initializes the tracing subscriber on stderr.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=vault=trace` - Show trace for vault crates only
/// - Default: INFO, with debug for vault crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vault=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

//! # Commands
//!
//! One module per command group. Handlers take the shared [`AppState`]
//! and return `CliResult`; printing is their job, exit codes are not.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  entity   put / get / remove        ──► LocalStore                     │
//! │  backup   export / import           ──► vault_db::backup               │
//! │  sync     login / logout / status   ──► CredentialManager              │
//! │           save / load               ──► SyncOrchestrator               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`AppState`]: crate::state::AppState

pub mod backup;
pub mod entity;
pub mod sync;

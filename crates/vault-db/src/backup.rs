//! # Local Backup Files
//!
//! Snapshot documents written to and read from disk. The file format is the
//! same JSON the cloud sees, indented for humans.
//!
//! ```text
//! export_to_file ── export_snapshot() ──► to_json_pretty() ──► rpg_cards_backup.json
//! import_from_file ◄── import_snapshot() ◄── from_slice() ◄──────────┘
//! ```

use std::path::Path;
use tracing::info;
use vault_core::SnapshotDocument;

use crate::error::{DbError, DbResult};
use crate::repository::snapshot::ImportSummary;
use crate::store::LocalStore;

/// Writes a snapshot document to `path`, replacing any existing file.
pub async fn write_snapshot_file(path: &Path, doc: &SnapshotDocument) -> DbResult<()> {
    let text = doc
        .to_json_pretty()
        .map_err(|e| DbError::Encoding(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    Ok(())
}

/// Reads and shape-checks a snapshot document from `path`.
pub async fn read_snapshot_file(path: &Path) -> DbResult<SnapshotDocument> {
    let bytes = tokio::fs::read(path).await?;
    Ok(SnapshotDocument::from_slice(&bytes)?)
}

impl LocalStore {
    /// Exports the whole store to a backup file.
    ///
    /// ## Returns
    /// * `Ok(usize)` - Number of entities written
    pub async fn export_to_file(&self, path: &Path) -> DbResult<usize> {
        let doc = self.export_snapshot().await?;
        write_snapshot_file(path, &doc).await?;

        info!(path = %path.display(), entities = doc.entity_count(), "Backup written");
        Ok(doc.entity_count())
    }

    /// Restores the store from a backup file.
    ///
    /// A malformed file fails with `DbError::Format` and changes nothing.
    pub async fn import_from_file(&self, path: &Path) -> DbResult<ImportSummary> {
        let doc = read_snapshot_file(path).await?;
        let summary = self.import_snapshot(&doc).await?;

        info!(path = %path.display(), entities = summary.entity_count(), "Backup restored");
        Ok(summary)
    }
}

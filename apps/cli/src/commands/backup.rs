//! # Backup Commands
//!
//! Local snapshot files. Importing replaces every collection the file
//! names and leaves the others alone. Pictures can also be pulled out on
//! their own as a zip archive.

use std::path::{Path, PathBuf};
use vault_core::LOCAL_BACKUP_FILE_NAME;
use vault_db::{ImportSummary, LocalStore, IMAGE_ARCHIVE_FILE_NAME};

use crate::error::CliResult;

/// Backup path, defaulting to the standard file name in the working directory.
pub fn backup_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(LOCAL_BACKUP_FILE_NAME))
}

/// Writes the whole store to a backup file.
pub async fn export(store: &LocalStore, path: Option<&Path>) -> CliResult<usize> {
    let path = backup_path(path);
    let count = store.export_to_file(&path).await?;
    println!("💾 Exported {} entities to {}", count, path.display());
    Ok(count)
}

/// Writes every stored picture to a zip archive.
pub async fn export_images(store: &LocalStore, path: Option<&Path>) -> CliResult<usize> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(IMAGE_ARCHIVE_FILE_NAME));
    let count = store.export_images_to_file(&path).await?;
    println!("🖼️  Exported {} images to {}", count, path.display());
    Ok(count)
}

/// Restores from a backup file.
pub async fn import(store: &LocalStore, path: &Path) -> CliResult<ImportSummary> {
    let summary = store.import_from_file(path).await?;
    for (collection, count) in &summary.collections {
        println!("  {:<12} {}", collection.name(), count);
    }
    println!("📥 Imported {} entities from {}", summary.entity_count(), path.display());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use vault_core::{Collection, Entity};
    use vault_db::DbConfig;

    async fn open_store() -> LocalStore {
        let store = LocalStore::new(DbConfig::in_memory());
        store.open().await.unwrap();
        store
    }

    #[test]
    fn test_default_backup_path() {
        assert_eq!(backup_path(None), PathBuf::from("rpg_cards_backup.json"));
        assert_eq!(backup_path(Some(Path::new("/tmp/x.json"))), PathBuf::from("/tmp/x.json"));
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let source = open_store().await;
        source
            .put(Collection::Spells, &Entity::new("s1").with("name", "Light"))
            .await
            .unwrap();
        assert_eq!(export(&source, Some(&path)).await.unwrap(), 1);

        let target = open_store().await;
        target
            .put(Collection::Spells, &Entity::new("old").with("name", "Gone"))
            .await
            .unwrap();
        let summary = import(&target, &path).await.unwrap();

        assert_eq!(summary.entity_count(), 1);
        assert!(target.get(Collection::Spells, "old").await.unwrap().is_none());
        assert!(target.get(Collection::Spells, "s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_export_images_writes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.zip");

        let store = open_store().await;
        let item = Entity::new("i1").with_binary("image", vec![1, 2, 3], "image/png");
        store.put(Collection::Items, &item).await.unwrap();
        store
            .put(Collection::Spells, &Entity::new("s1").with("name", "Light"))
            .await
            .unwrap();

        assert_eq!(export_images(&store, Some(&path)).await.unwrap(), 1);

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.by_index(0).unwrap().name(), "rpgItems/i1.png");
    }

    #[tokio::test]
    async fn test_import_of_garbage_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();

        let store = open_store().await;
        let err = import(&store, &path).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }
}

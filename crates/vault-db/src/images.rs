//! # Image Export
//!
//! Every stored picture written out as a file inside one zip archive, so
//! artwork can be pulled out of the vault without the app.
//!
//! ## Archive Layout
//! ```text
//! rpg_vault_images.zip
//! ├── rpgCards/
//! │   ├── 1700000000000.png                   ◄── image
//! │   └── 1700000000000_backgroundImage.jpeg  ◄── any other binary field
//! ├── rpgItems/
//! │   └── 1700000000001.webp
//! └── rpgGrimoires/
//!     └── 1700000000002_page1.jpeg            ◄── page entries, 1-based
//! ```
//!
//! Fields without bytes or without a MIME type are skipped.

use std::io::{Seek, Write};
use std::path::Path;
use tracing::info;
use vault_core::{Collection, Entity, Value};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{DbError, DbResult};
use crate::store::LocalStore;

/// Default archive name for [`LocalStore::export_images_to_file`].
pub const IMAGE_ARCHIVE_FILE_NAME: &str = "rpg_vault_images.zip";

/// One file of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Path inside the archive.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// File extension for a MIME type: `image/svg+xml` → `svg`, unknown → `png`.
pub fn extension_for(mime_type: &str) -> &str {
    mime_type
        .split_once('/')
        .map(|(_, subtype)| subtype.split('+').next().unwrap_or(subtype))
        .filter(|ext| !ext.is_empty())
        .unwrap_or("png")
}

/// Archive-safe form of an id.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Images held by one entity, top-level fields first, then page entries.
pub fn image_entries(collection: Collection, entity: &Entity) -> Vec<ImageEntry> {
    let folder = collection.name();
    let stem = file_stem(entity.id().as_str());
    let mut entries = Vec::new();

    for binary in collection.binary_fields() {
        if let Some((bytes, mime)) = entity.binary(binary.field) {
            let name = if binary.field == "image" {
                stem.clone()
            } else {
                format!("{}_{}", stem, binary.field)
            };
            entries.push(ImageEntry {
                path: format!("{}/{}.{}", folder, name, extension_for(mime)),
                bytes: bytes.to_vec(),
            });
        }
    }

    let page_fields = collection.page_binary_fields().unwrap_or_default();
    let pages = entity.pages().unwrap_or_default();

    for (index, page) in pages.iter().enumerate() {
        let Some(page) = page.as_map() else { continue };
        for binary in page_fields {
            let bytes = page.get(binary.field).and_then(Value::as_bytes);
            let mime = page.get(binary.mime_field).and_then(Value::as_text);
            if let (Some(bytes), Some(mime)) = (bytes, mime) {
                let suffix = if binary.field == "image" {
                    String::new()
                } else {
                    format!("_{}", binary.field)
                };
                entries.push(ImageEntry {
                    path: format!(
                        "{}/{}_page{}{}.{}",
                        folder,
                        stem,
                        index + 1,
                        suffix,
                        extension_for(mime)
                    ),
                    bytes: bytes.to_vec(),
                });
            }
        }
    }

    entries
}

/// Writes `entries` as a zip archive. Pictures are already compressed, so
/// entries are stored as-is.
pub fn write_image_archive<W: Write + Seek>(writer: W, entries: &[ImageEntry]) -> DbResult<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(writer);

    for entry in entries {
        zip.start_file(entry.path.as_str(), options)
            .map_err(|e| DbError::Io(e.to_string()))?;
        zip.write_all(&entry.bytes)?;
    }

    zip.finish().map_err(|e| DbError::Io(e.to_string()))
}

impl LocalStore {
    /// Collects every image in the store.
    pub async fn image_entries(&self) -> DbResult<Vec<ImageEntry>> {
        let mut entries = Vec::new();
        for collection in Collection::ALL {
            for entity in self.get_all(collection).await? {
                entries.extend(image_entries(collection, &entity));
            }
        }
        Ok(entries)
    }

    /// Exports every image in the store to a zip archive at `path`.
    ///
    /// ## Returns
    /// * `Ok(usize)` - Number of image files written
    pub async fn export_images_to_file(&self, path: &Path) -> DbResult<usize> {
        let entries = self.image_entries().await?;
        let count = entries.len();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> DbResult<()> {
            let file = std::fs::File::create(&target)?;
            write_image_archive(file, &entries)?;
            Ok(())
        })
        .await
        .map_err(|e| DbError::Io(e.to_string()))??;

        info!(path = %path.display(), images = count, "Image archive written");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use std::io::Read;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpeg");
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(extension_for("garbage"), "png");
        assert_eq!(extension_for("image/"), "png");
    }

    #[test]
    fn test_entries_skip_cleared_fields() {
        let mut card = Entity::new("c/1").with_binary("image", vec![1, 2], "image/png");
        card.set_binary("trueImage", vec![3], "image/gif");
        card.clear_binary("trueImage");

        let entries = image_entries(Collection::Characters, &card);
        assert_eq!(
            entries,
            vec![ImageEntry {
                path: "rpgCards/c_1.png".into(),
                bytes: vec![1, 2],
            }]
        );
    }

    #[tokio::test]
    async fn test_archive_holds_every_image() {
        let store = LocalStore::new(DbConfig::in_memory());
        store.open().await.unwrap();

        let portrait: Vec<u8> = (0..=255).collect();
        let card = Entity::new("1")
            .with_binary("image", portrait.clone(), "image/png")
            .with_binary("backgroundImage", vec![0xFF, 0xD8], "image/jpeg");
        store.put(Collection::Characters, &card).await.unwrap();

        let item = Entity::new("2").with_binary("image", vec![b'R', b'I', b'F', b'F'], "image/webp");
        store.put(Collection::Items, &item).await.unwrap();
        store
            .put(Collection::Spells, &Entity::new("3").with("name", "No picture"))
            .await
            .unwrap();

        let mut book = Entity::new("4");
        book.push_page(Value::map([("title", Value::from("Blank"))]));
        book.push_page(Value::map([
            ("image", Value::Bytes(vec![7, 7, 7])),
            ("imageMimeType", Value::from("image/gif")),
        ]));
        store.put(Collection::Grimoires, &book).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(IMAGE_ARCHIVE_FILE_NAME);
        assert_eq!(store.export_images_to_file(&path).await.unwrap(), 4);

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(
            names,
            [
                "rpgCards/1.png",
                "rpgCards/1_backgroundImage.jpeg",
                "rpgGrimoires/4_page2.gif",
                "rpgItems/2.webp",
            ]
        );

        let expected = [
            ("rpgCards/1.png", portrait),
            ("rpgCards/1_backgroundImage.jpeg", vec![0xFF, 0xD8]),
            ("rpgItems/2.webp", vec![b'R', b'I', b'F', b'F']),
            ("rpgGrimoires/4_page2.gif", vec![7, 7, 7]),
        ];
        for (name, bytes) in expected {
            let mut content = Vec::new();
            archive.by_name(name).unwrap().read_to_end(&mut content).unwrap();
            assert_eq!(content, bytes, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_empty_store_writes_empty_archive() {
        let store = LocalStore::new(DbConfig::in_memory());
        store.open().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(IMAGE_ARCHIVE_FILE_NAME);
        assert_eq!(store.export_images_to_file(&path).await.unwrap(), 0);

        let archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
    }
}

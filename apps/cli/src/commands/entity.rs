//! # Entity Commands
//!
//! `put`, `get` and `remove` against one collection. Entities travel as
//! the same JSON objects a snapshot holds (binaries as base64).

use serde_json::Value as JsonValue;
use std::path::Path;
use tokio::io::AsyncReadExt;
use vault_core::snapshot::{decode_entity, encode_entity};
use vault_core::{Collection, Entity, EntityId};
use vault_db::LocalStore;

use crate::error::{CliError, CliResult};

/// Parses an entity object. A missing `id` gets a fresh one.
pub fn entity_from_json(collection: Collection, text: &str) -> CliResult<Entity> {
    let mut value: JsonValue = serde_json::from_str(text)?;

    let JsonValue::Object(object) = &mut value else {
        return Err(CliError::invalid_input("Entity must be a JSON object"));
    };
    object
        .entry("id")
        .or_insert_with(|| JsonValue::String(EntityId::generate().into_string()));

    decode_entity(collection, value).map_err(|e| CliError::invalid_input(e.to_string()))
}

/// MIME type for an image path, from its extension.
pub fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

async fn read_input(input: &str) -> CliResult<String> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        Ok(text)
    } else {
        Ok(tokio::fs::read_to_string(input).await?)
    }
}

/// Inserts or replaces an entity read from a file (or `-` for stdin).
///
/// ## Arguments
/// * `image` - Optional picture stored in the entity's `image` field
/// * `mime` - MIME type of `image`; guessed from the extension if absent
pub async fn put(
    store: &LocalStore,
    collection: Collection,
    input: &str,
    image: Option<&Path>,
    mime: Option<&str>,
) -> CliResult<EntityId> {
    let mut entity = entity_from_json(collection, &read_input(input).await?)?;

    if let Some(path) = image {
        let mime = mime
            .or_else(|| guess_mime(path))
            .ok_or_else(|| CliError::invalid_input("Cannot tell the image type, pass --mime"))?;
        let bytes = tokio::fs::read(path).await?;
        entity.set_binary("image", bytes, mime);
    }

    let id = store.put(collection, &entity).await?;
    println!("{}", id);
    Ok(id)
}

/// Prints one entity, or the whole collection when `id` is absent.
pub async fn get(store: &LocalStore, collection: Collection, id: Option<&str>) -> CliResult<()> {
    let output = match id {
        Some(id) => {
            let entity = store
                .get(collection, id)
                .await?
                .ok_or_else(|| CliError::not_found(collection.name(), id))?;
            JsonValue::Object(encode_entity(&entity))
        }
        None => {
            let entities = store.get_all(collection).await?;
            JsonValue::Array(
                entities
                    .iter()
                    .map(|e| JsonValue::Object(encode_entity(e)))
                    .collect(),
            )
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Deletes an entity. Deleting a missing id is not an error.
pub async fn remove(store: &LocalStore, collection: Collection, id: &str) -> CliResult<bool> {
    let removed = store.remove(collection, id).await?;
    if removed {
        println!("🗑️  Removed {}/{}", collection, id);
    } else {
        println!("Nothing to remove at {}/{}", collection, id);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use vault_core::Value;
    use vault_db::DbConfig;

    #[test]
    fn test_entity_from_json_keeps_id() {
        let entity = entity_from_json(
            Collection::Items,
            r#"{"id": "7", "name": "Rope", "image": "iVBORw==", "imageMimeType": "image/png"}"#,
        )
        .unwrap();

        assert_eq!(entity.id().as_str(), "7");
        assert_eq!(entity.get("name"), Some(&Value::from("Rope")));
        assert_eq!(entity.binary("image"), Some((&[0x89, b'P', b'N', b'G'][..], "image/png")));
    }

    #[test]
    fn test_entity_from_json_generates_id() {
        let entity = entity_from_json(Collection::Spells, r#"{"name": "Shield"}"#).unwrap();
        assert!(!entity.id().is_empty());
    }

    #[test]
    fn test_entity_from_json_rejects_non_objects() {
        let err = entity_from_json(Collection::Spells, "[1, 2]").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let err = entity_from_json(Collection::Spells, "{").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("hero.PNG")), Some("image/png"));
        assert_eq!(guess_mime(Path::new("map.jpeg")), Some("image/jpeg"));
        assert_eq!(guess_mime(Path::new("notes.txt")), None);
        assert_eq!(guess_mime(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn test_put_with_image_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("hero.json");
        let image_path = dir.path().join("hero.png");
        std::fs::write(&json_path, r#"{"id": "1", "name": "Aria"}"#).unwrap();
        std::fs::write(&image_path, [0x89, b'P', b'N', b'G']).unwrap();

        let store = LocalStore::new(DbConfig::in_memory());
        store.open().await.unwrap();

        let id = put(
            &store,
            Collection::Characters,
            json_path.to_str().unwrap(),
            Some(&image_path),
            None,
        )
        .await
        .unwrap();

        let stored = store.get(Collection::Characters, id.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.binary("image").map(|(_, mime)| mime), Some("image/png"));

        let err = get(&store, Collection::Characters, Some("404")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        assert!(remove(&store, Collection::Characters, "1").await.unwrap());
        assert!(!remove(&store, Collection::Characters, "1").await.unwrap());
    }
}

//! # Snapshot Documents
//!
//! The whole-database JSON document used for cloud and file backups.
//!
//! ## Wire Format
//! ```text
//! {
//!   "rpgCards":      [ { "id": "1712...", "name": "Aria",
//!                        "image": "iVBORw0KGgo...", "imageMimeType": "image/png" } ],
//!   "rpgSpells":     [ ... ],
//!   "rpgItems":      [ ... ],
//!   "rpgAttacks":    [ ... ],
//!   "rpgCategories": [ ... ],
//!   "rpgGrimoires":  [ { "id": "...", "entries": [ { "image": "...", ... } ] } ]
//! }
//! ```
//!
//! ## Two Stages
//! ```text
//! bytes ──► SnapshotDocument::from_slice ──► shape checked (object of arrays of objects)
//!                                  │
//!                                  ▼
//!                       SnapshotDocument::decode ──► ids, base64, invariants checked
//!                                  │
//!                                  ▼
//!                           DecodedSnapshot (entities ready for the store)
//! ```
//!
//! Both stages are pure. A store import decodes the entire document before
//! it mutates anything, so a malformed backup never leaves a half-restored
//! database behind.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::collections::BTreeMap;

use crate::codec;
use crate::collection::Collection;
use crate::entity::{Entity, Value};
use crate::error::FormatError;
use crate::validation::{validate_entity, BinaryField, ID_FIELD, PAGE_ENTRIES_FIELD};

/// Entities decoded from a snapshot, grouped by collection.
///
/// Only collections present in the document appear as keys.
pub type DecodedSnapshot = BTreeMap<Collection, Vec<Entity>>;

/// A parsed snapshot document.
///
/// Holds JSON objects exactly as they appear on the wire; binary fields are
/// still base64 text until [`SnapshotDocument::decode`] runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotDocument {
    collections: BTreeMap<Collection, Vec<JsonMap<String, JsonValue>>>,
    ignored_keys: Vec<String>,
}

impl SnapshotDocument {
    /// A document with no collections at all.
    pub fn empty() -> Self {
        Self::default()
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Encodes entities into a document, turning binary fields into base64.
    ///
    /// Entity order inside each collection is preserved.
    pub fn encode<I>(collections: I) -> Self
    where
        I: IntoIterator<Item = (Collection, Vec<Entity>)>,
    {
        let collections = collections
            .into_iter()
            .map(|(collection, entities)| {
                let objects = entities
                    .iter()
                    .map(encode_entity)
                    .collect();
                (collection, objects)
            })
            .collect();

        SnapshotDocument {
            collections,
            ignored_keys: Vec::new(),
        }
    }

    /// Compact JSON text, as uploaded to the cloud.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Indented JSON text, as written to local backup files.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json_value(&self) -> JsonValue {
        let map = self
            .collections
            .iter()
            .map(|(collection, objects)| {
                let array = objects.iter().cloned().map(JsonValue::Object).collect();
                (collection.name().to_string(), JsonValue::Array(array))
            })
            .collect();
        JsonValue::Object(map)
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    /// Parses raw bytes (a download body or a backup file).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FormatError> {
        let value: JsonValue =
            serde_json::from_slice(bytes).map_err(|e| FormatError::InvalidJson(e.to_string()))?;
        Self::from_json(value)
    }

    /// Parses JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, FormatError> {
        Self::from_slice(text.as_bytes())
    }

    /// Checks the document shape.
    ///
    /// ## Rules
    /// - top level is an object
    /// - each known collection key maps to an array of objects
    /// - unknown keys are skipped and remembered in [`ignored_keys`]
    ///
    /// [`ignored_keys`]: SnapshotDocument::ignored_keys
    pub fn from_json(value: JsonValue) -> Result<Self, FormatError> {
        let object = match value {
            JsonValue::Object(object) => object,
            other => {
                return Err(FormatError::NotAnObject {
                    found: json_kind(&other),
                })
            }
        };

        let mut doc = SnapshotDocument::empty();
        for (key, value) in object {
            let Some(collection) = Collection::from_name(&key) else {
                doc.ignored_keys.push(key);
                continue;
            };

            let items = match value {
                JsonValue::Array(items) => items,
                other => {
                    return Err(FormatError::CollectionNotArray {
                        collection: key,
                        found: json_kind(&other),
                    })
                }
            };

            let mut objects = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                match item {
                    JsonValue::Object(object) => objects.push(object),
                    _ => {
                        return Err(FormatError::EntityNotObject {
                            collection: key,
                            index,
                        })
                    }
                }
            }
            doc.collections.insert(collection, objects);
        }

        Ok(doc)
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Turns every object back into an [`Entity`], base64 fields into bytes.
    ///
    /// Fails on the first malformed entity; nothing partial is returned.
    pub fn decode(&self) -> Result<DecodedSnapshot, FormatError> {
        let mut decoded = DecodedSnapshot::new();
        for (&collection, objects) in &self.collections {
            let mut entities = Vec::with_capacity(objects.len());
            for (index, object) in objects.iter().enumerate() {
                entities.push(decode_object(collection, index, object)?);
            }
            decoded.insert(collection, entities);
        }
        Ok(decoded)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Collections present in the document, in snapshot order.
    pub fn collections(&self) -> impl Iterator<Item = Collection> + '_ {
        self.collections.keys().copied()
    }

    pub fn contains(&self, collection: Collection) -> bool {
        self.collections.contains_key(&collection)
    }

    /// Number of entities in one collection (0 if absent).
    pub fn len_of(&self, collection: Collection) -> usize {
        self.collections.get(&collection).map_or(0, Vec::len)
    }

    /// Number of entities across all collections.
    pub fn entity_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Top-level keys that did not name a collection.
    pub fn ignored_keys(&self) -> &[String] {
        &self.ignored_keys
    }
}

impl Serialize for SnapshotDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.collections.len()))?;
        for (collection, objects) in &self.collections {
            map.serialize_entry(collection.name(), objects)?;
        }
        map.end()
    }
}

// =============================================================================
// Entity Encoding
// =============================================================================

/// Encodes a single entity into its snapshot object.
pub fn encode_entity(entity: &Entity) -> JsonMap<String, JsonValue> {
    let mut object = JsonMap::new();
    object.insert(
        ID_FIELD.to_string(),
        JsonValue::String(entity.id().as_str().to_string()),
    );
    for (name, value) in entity.fields() {
        object.insert(name.clone(), value_to_json(value));
    }
    object
}

/// Decodes a single snapshot object into an entity of `collection`.
pub fn decode_entity(collection: Collection, value: JsonValue) -> Result<Entity, FormatError> {
    match value {
        JsonValue::Object(object) => decode_object(collection, 0, &object),
        _ => Err(FormatError::EntityNotObject {
            collection: collection.name().to_string(),
            index: 0,
        }),
    }
}

fn decode_object(
    collection: Collection,
    index: usize,
    object: &JsonMap<String, JsonValue>,
) -> Result<Entity, FormatError> {
    let id = match object.get(ID_FIELD) {
        Some(JsonValue::String(id)) if !id.trim().is_empty() => id.clone(),
        Some(JsonValue::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => {
            return Err(FormatError::MissingId {
                collection: collection.name().to_string(),
                index,
            })
        }
    };

    let binary_error = |field: &str, reason: String| FormatError::InvalidBinary {
        collection: collection.name().to_string(),
        id: id.clone(),
        field: field.to_string(),
        reason,
    };

    let mut fields = BTreeMap::new();
    for (name, value) in object {
        if name == ID_FIELD {
            continue;
        }
        let decoded = if is_binary(collection.binary_fields(), name) {
            decode_binary(value).map_err(|reason| binary_error(name, reason))?
        } else if name == PAGE_ENTRIES_FIELD && collection.page_binary_fields().is_some() {
            decode_pages(collection, value).map_err(|(field, reason)| binary_error(&field, reason))?
        } else {
            json_to_value(value)
        };
        fields.insert(name.clone(), decoded);
    }

    let entity = Entity::from_parts(id, fields);
    validate_entity(collection, &entity).map_err(|source| FormatError::InvalidEntity {
        collection: collection.name().to_string(),
        id: entity.id().to_string(),
        source,
    })?;
    Ok(entity)
}

/// Decodes a grimoire page list; binary fields inside each page become bytes.
fn decode_pages(collection: Collection, value: &JsonValue) -> Result<Value, (String, String)> {
    let (JsonValue::Array(pages), Some(page_fields)) = (value, collection.page_binary_fields())
    else {
        return Ok(json_to_value(value));
    };

    let mut decoded = Vec::with_capacity(pages.len());
    for (index, page) in pages.iter().enumerate() {
        let JsonValue::Object(page) = page else {
            decoded.push(json_to_value(page));
            continue;
        };
        let mut map = BTreeMap::new();
        for (name, value) in page {
            let field = if is_binary(page_fields, name) {
                decode_binary(value)
                    .map_err(|reason| (format!("{}[{}].{}", PAGE_ENTRIES_FIELD, index, name), reason))?
            } else {
                json_to_value(value)
            };
            map.insert(name.clone(), field);
        }
        decoded.push(Value::Map(map));
    }
    Ok(Value::Array(decoded))
}

fn is_binary(fields: &[BinaryField], name: &str) -> bool {
    fields.iter().any(|b| b.field == name)
}

fn decode_binary(value: &JsonValue) -> Result<Value, String> {
    match value {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(text) => codec::decode(text)
            .map(Value::Bytes)
            .map_err(|e| e.to_string()),
        other => Err(format!("expected base64 text, found {}", json_kind(other))),
    }
}

// =============================================================================
// JSON ⇄ Value
// =============================================================================

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::Number(Number::from(*i)),
        // NaN and infinities have no JSON form.
        Value::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => JsonValue::String(codec::encode(b)),
        Value::Array(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Array(items) => Value::Array(items.iter().map(json_to_value).collect()),
        JsonValue::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hero() -> Entity {
        Entity::new("1700000000001")
            .with("name", "Aria")
            .with("level", 7)
            .with("stats", Value::map([("str", Value::from(14)), ("dex", Value::from(17))]))
            .with_binary("image", vec![0x89, b'P', b'N', b'G'], "image/png")
    }

    fn grimoire() -> Entity {
        let mut g = Entity::new("1700000000002").with("title", "Book of Ash");
        g.push_page(Value::map([
            ("title", Value::from("Cover")),
            ("image", Value::Bytes(vec![0, 1, 2, 255])),
            ("imageMimeType", Value::from("image/webp")),
        ]));
        g.push_page(Value::map([("title", Value::from("Blank"))]));
        g
    }

    #[test]
    fn test_encode_turns_bytes_into_base64() {
        let doc = SnapshotDocument::encode([(Collection::Characters, vec![hero()])]);
        let json = doc.to_json_value();

        assert_eq!(json["rpgCards"][0]["id"], "1700000000001");
        assert_eq!(json["rpgCards"][0]["image"], "iVBORw==");
        assert_eq!(json["rpgCards"][0]["imageMimeType"], "image/png");
        assert_eq!(json["rpgCards"][0]["stats"]["dex"], 17);
    }

    #[test]
    fn test_encode_reaches_grimoire_pages() {
        let doc = SnapshotDocument::encode([(Collection::Grimoires, vec![grimoire()])]);
        let json = doc.to_json_value();
        assert_eq!(json["rpgGrimoires"][0]["entries"][0]["image"], "AAEC/w==");
    }

    #[test]
    fn test_round_trip_through_text() {
        let original = vec![
            (Collection::Characters, vec![hero()]),
            (Collection::Grimoires, vec![grimoire()]),
            (Collection::Items, vec![]),
        ];
        let doc = SnapshotDocument::encode(original.clone());
        let text = doc.to_json_string().unwrap();

        let parsed = SnapshotDocument::from_json_str(&text).unwrap();
        let decoded = parsed.decode().unwrap();

        assert_eq!(decoded.len(), 3);
        for (collection, entities) in original {
            assert_eq!(decoded[&collection], entities);
        }
    }

    #[test]
    fn test_absent_collections_stay_absent() {
        let doc = SnapshotDocument::from_json(json!({ "rpgItems": [] })).unwrap();
        assert!(doc.contains(Collection::Items));
        assert!(!doc.contains(Collection::Characters));
        assert_eq!(doc.decode().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let doc = SnapshotDocument::from_json(json!({
            "rpgCards": [{ "id": "1" }],
            "rpgDice": [{ "id": "d20" }],
        }))
        .unwrap();

        assert_eq!(doc.ignored_keys(), ["rpgDice".to_string()]);
        assert_eq!(doc.entity_count(), 1);
    }

    #[test]
    fn test_shape_errors() {
        assert!(matches!(
            SnapshotDocument::from_json(json!([1, 2])),
            Err(FormatError::NotAnObject { found: "array" })
        ));
        assert!(matches!(
            SnapshotDocument::from_json(json!({ "rpgSpells": {} })),
            Err(FormatError::CollectionNotArray { .. })
        ));
        assert!(matches!(
            SnapshotDocument::from_json(json!({ "rpgSpells": ["fireball"] })),
            Err(FormatError::EntityNotObject { index: 0, .. })
        ));
        assert!(matches!(
            SnapshotDocument::from_slice(b"{ not json"),
            Err(FormatError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_missing_id_is_a_format_error() {
        let doc = SnapshotDocument::from_json(json!({
            "rpgAttacks": [{ "id": "a" }, { "name": "Bite" }],
        }))
        .unwrap();
        assert_eq!(
            doc.decode().unwrap_err(),
            FormatError::MissingId {
                collection: "rpgAttacks".into(),
                index: 1
            }
        );
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let doc = SnapshotDocument::from_json(json!({ "rpgItems": [{ "id": 1712 }] })).unwrap();
        let decoded = doc.decode().unwrap();
        assert_eq!(decoded[&Collection::Items][0].id().as_str(), "1712");
    }

    #[test]
    fn test_bad_base64_is_a_format_error() {
        let doc = SnapshotDocument::from_json(json!({
            "rpgCards": [{ "id": "1", "image": "%%%", "imageMimeType": "image/png" }],
        }))
        .unwrap();
        assert!(matches!(
            doc.decode(),
            Err(FormatError::InvalidBinary { ref field, .. }) if field == "image"
        ));
    }

    #[test]
    fn test_bad_page_base64_names_the_page() {
        let doc = SnapshotDocument::from_json(json!({
            "rpgGrimoires": [{ "id": "g", "entries": [{ "image": 42 }] }],
        }))
        .unwrap();
        assert!(matches!(
            doc.decode(),
            Err(FormatError::InvalidBinary { ref field, .. }) if field == "entries[0].image"
        ));
    }

    #[test]
    fn test_unpaired_binary_is_a_format_error() {
        let doc = SnapshotDocument::from_json(json!({
            "rpgCards": [{ "id": "1", "trueImage": "AAAA" }],
        }))
        .unwrap();
        assert!(matches!(doc.decode(), Err(FormatError::InvalidEntity { .. })));
    }

    #[test]
    fn test_numbers_keep_their_kind() {
        let doc = SnapshotDocument::from_json(json!({
            "rpgItems": [{ "id": "1", "weight": 2.0, "count": 3 }],
        }))
        .unwrap();
        let item = &doc.decode().unwrap()[&Collection::Items][0];
        assert_eq!(item.get("weight"), Some(&Value::Float(2.0)));
        assert_eq!(item.get("count"), Some(&Value::Integer(3)));
    }
}

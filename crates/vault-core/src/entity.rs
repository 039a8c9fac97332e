//! # Entities
//!
//! A keyed record with an open-ended set of fields.
//!
//! ## Shape
//! ```text
//! Entity
//! ├── id: EntityId                  "1712345678901"  (immutable)
//! └── fields: name → Value
//!     ├── name             Text("Aria")
//!     ├── level            Integer(7)
//!     ├── image            Bytes([...])      ┐ set or cleared
//!     ├── imageMimeType    Text("image/png") ┘ together
//!     └── entries          Array([Map{..}, ..])   (grimoires only)
//! ```
//!
//! Fields are kept sorted by name, so two entities with the same content
//! always compare equal regardless of insertion order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::validation::{mime_field_for, PAGE_ENTRIES_FIELD};

// =============================================================================
// Value
// =============================================================================

/// A field value.
///
/// Mirrors JSON plus a dedicated `Bytes` variant, so binary payloads stay
/// binary in the store and only become text inside a snapshot document.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Builds a map value from key/value pairs.
    ///
    /// ## Example
    /// ```rust
    /// use vault_core::Value;
    ///
    /// let page = Value::map([("title", Value::from("Fireball")), ("page", Value::from(3))]);
    /// assert_eq!(page.as_map().unwrap().len(), 2);
    /// ```
    pub fn map<K, I>(pairs: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Entity Id
// =============================================================================

/// Key of an entity within its collection.
///
/// New ids are the creation time in Unix milliseconds, rendered as decimal
/// text. Ids loaded from storage or snapshots are taken verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

static PROCESS_IDS: IdGenerator = IdGenerator::new();

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    /// Issues a fresh timestamp-derived id.
    ///
    /// Strictly increasing within the process, even when called twice in
    /// the same millisecond.
    pub fn generate() -> Self {
        PROCESS_IDS.next()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId(id)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Monotonic millisecond id source.
#[derive(Debug)]
pub struct IdGenerator {
    last_issued: AtomicI64,
}

impl IdGenerator {
    pub const fn new() -> Self {
        IdGenerator {
            last_issued: AtomicI64::new(0),
        }
    }

    /// Next id based on the wall clock.
    pub fn next(&self) -> EntityId {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }

    /// Next id given the current time in milliseconds.
    ///
    /// Returns `now_ms` unless an id at or after it was already issued, in
    /// which case the previous value plus one.
    pub fn next_at(&self, now_ms: i64) -> EntityId {
        let mut last = self.last_issued.load(Ordering::Relaxed);
        loop {
            let candidate = if now_ms > last { now_ms } else { last + 1 };
            match self.last_issued.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return EntityId(candidate.to_string()),
                Err(actual) => last = actual,
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Entity
// =============================================================================

/// A record in a collection.
///
/// `id` lives outside `fields`; the name `id` is reserved and validation
/// rejects it as a regular field.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    fields: BTreeMap<String, Value>,
}

impl Entity {
    /// Creates an empty entity with the given key.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Entity {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Creates an empty entity with a freshly generated key.
    pub fn create() -> Self {
        Entity::new(EntityId::generate())
    }

    /// Builds an entity from an existing field map.
    pub fn from_parts(id: impl Into<EntityId>, fields: BTreeMap<String, Value>) -> Self {
        Entity {
            id: id.into(),
            fields,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn into_parts(self) -> (EntityId, BTreeMap<String, Value>) {
        (self.id, self.fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Builder form of [`Entity::insert`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Sets a binary field together with its MIME sibling.
    pub fn set_binary(&mut self, field: &str, bytes: Vec<u8>, mime_type: impl Into<String>) {
        let mime_field = mime_field_for(field);
        self.fields.insert(field.to_string(), Value::Bytes(bytes));
        self.fields.insert(mime_field, Value::Text(mime_type.into()));
    }

    /// Builder form of [`Entity::set_binary`].
    pub fn with_binary(mut self, field: &str, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.set_binary(field, bytes, mime_type);
        self
    }

    /// Clears a binary field and its MIME sibling.
    pub fn clear_binary(&mut self, field: &str) {
        let mime_field = mime_field_for(field);
        self.fields.insert(field.to_string(), Value::Null);
        self.fields.insert(mime_field, Value::Null);
    }

    /// Returns the payload and MIME type of a binary field, if set.
    pub fn binary(&self, field: &str) -> Option<(&[u8], &str)> {
        let bytes = self.fields.get(field)?.as_bytes()?;
        let mime = self.fields.get(&mime_field_for(field))?.as_text()?;
        Some((bytes, mime))
    }

    /// Page entries of a grimoire, if the field is present.
    pub fn pages(&self) -> Option<&[Value]> {
        self.fields.get(PAGE_ENTRIES_FIELD)?.as_array()
    }

    /// Appends a page entry, creating the list on first use.
    pub fn push_page(&mut self, page: Value) {
        match self.fields.get_mut(PAGE_ENTRIES_FIELD) {
            Some(Value::Array(pages)) => pages.push(page),
            _ => {
                self.fields
                    .insert(PAGE_ENTRIES_FIELD.to_string(), Value::Array(vec![page]));
            }
        }
    }

    /// Total size of all binary payloads, including page images.
    pub fn binary_len(&self) -> usize {
        fn walk(value: &Value) -> usize {
            match value {
                Value::Bytes(b) => b.len(),
                Value::Array(items) => items.iter().map(walk).sum(),
                Value::Map(map) => map.values().map(walk).sum(),
                _ => 0,
            }
        }
        self.fields.values().map(walk).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator_is_strictly_increasing() {
        let ids = IdGenerator::new();
        let a = ids.next_at(1_700_000_000_000);
        let b = ids.next_at(1_700_000_000_000);
        let c = ids.next_at(1_699_999_999_999);
        let d = ids.next_at(1_700_000_000_500);

        assert_eq!(a.as_str(), "1700000000000");
        assert_eq!(b.as_str(), "1700000000001");
        assert_eq!(c.as_str(), "1700000000002");
        assert_eq!(d.as_str(), "1700000000500");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let first = EntityId::generate();
        let second = EntityId::generate();
        assert_ne!(first, second);
        assert!(first.as_str().parse::<i64>().is_ok());
    }

    #[test]
    fn test_binary_helpers() {
        let mut card = Entity::new("42").with("name", "Aria");
        card.set_binary("backgroundImage", vec![1, 2, 3], "image/jpeg");

        assert_eq!(
            card.get("backgroundMimeType"),
            Some(&Value::Text("image/jpeg".into()))
        );
        assert_eq!(card.binary("backgroundImage"), Some((&[1u8, 2, 3][..], "image/jpeg")));

        card.clear_binary("backgroundImage");
        assert_eq!(card.binary("backgroundImage"), None);
        assert_eq!(card.get("backgroundMimeType"), Some(&Value::Null));
    }

    #[test]
    fn test_pages() {
        let mut grimoire = Entity::new("g1");
        assert!(grimoire.pages().is_none());

        grimoire.push_page(Value::map([("title", Value::from("Intro"))]));
        grimoire.push_page(Value::map([
            ("image", Value::Bytes(vec![9; 10])),
            ("imageMimeType", Value::from("image/png")),
        ]));

        assert_eq!(grimoire.pages().map(|p| p.len()), Some(2));
        assert_eq!(grimoire.binary_len(), 10);
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let a = Entity::new("1").with("a", 1).with("b", 2);
        let b = Entity::new("1").with("b", 2).with("a", 1);
        assert_eq!(a, b);
    }
}

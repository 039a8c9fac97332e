//! # Validation Module
//!
//! Binary field schema and the invariants every stored entity satisfies.
//!
//! ## Binary Fields
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Binary / MIME pairs                                │
//! │                                                                         │
//! │  Top level (every collection)                                          │
//! │  ├── image            ↔ imageMimeType                                  │
//! │  ├── backgroundImage  ↔ backgroundMimeType                             │
//! │  ├── enhanceImage     ↔ enhanceImageMimeType                           │
//! │  └── trueImage        ↔ trueImageMimeType                              │
//! │                                                                         │
//! │  Grimoire page entries (entries[i])                                    │
//! │  └── image            ↔ imageMimeType                                  │
//! │                                                                         │
//! │  Rule: both set (Bytes + Text) or both cleared (absent / Null)         │
//! │  Rule: Bytes never appear anywhere else                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use crate::collection::Collection;
use crate::entity::{Entity, Value};
use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A binary payload field and the field naming its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryField {
    pub field: &'static str,
    pub mime_field: &'static str,
}

/// Binary fields at the top level of any entity.
pub const TOP_LEVEL_BINARY_FIELDS: &[BinaryField] = &[
    BinaryField {
        field: "image",
        mime_field: "imageMimeType",
    },
    BinaryField {
        field: "backgroundImage",
        mime_field: "backgroundMimeType",
    },
    BinaryField {
        field: "enhanceImage",
        mime_field: "enhanceImageMimeType",
    },
    BinaryField {
        field: "trueImage",
        mime_field: "trueImageMimeType",
    },
];

/// Binary fields inside a grimoire page entry.
pub const PAGE_BINARY_FIELDS: &[BinaryField] = &[BinaryField {
    field: "image",
    mime_field: "imageMimeType",
}];

/// Field of a grimoire holding its ordered page entries.
pub const PAGE_ENTRIES_FIELD: &str = "entries";

/// Field name reserved for the entity key.
pub const ID_FIELD: &str = "id";

/// Name of the MIME sibling for a binary field.
///
/// Known fields use the fixed schema (`backgroundImage` pairs with
/// `backgroundMimeType`); anything else gets a `MimeType` suffix.
pub fn mime_field_for(field: &str) -> String {
    TOP_LEVEL_BINARY_FIELDS
        .iter()
        .find(|b| b.field == field)
        .map(|b| b.mime_field.to_string())
        .unwrap_or_else(|| format!("{}MimeType", field))
}

/// Validates an entity before it is written to `collection`.
///
/// ## Rules
/// - id is not blank
/// - `id` is not used as a regular field
/// - every binary field holds Bytes or Null, every MIME field Text or Null
/// - each binary field and its MIME sibling are set or cleared together
/// - grimoire page entries are objects obeying the same pairing rule
///
/// ## Example
/// ```rust
/// use vault_core::{Collection, Entity, Value};
/// use vault_core::validation::validate_entity;
///
/// let ok = Entity::new("1").with_binary("image", vec![1], "image/png");
/// assert!(validate_entity(Collection::Characters, &ok).is_ok());
///
/// let broken = Entity::new("2").with("image", Value::Bytes(vec![1]));
/// assert!(validate_entity(Collection::Characters, &broken).is_err());
/// ```
pub fn validate_entity(collection: Collection, entity: &Entity) -> ValidationResult<()> {
    if entity.id().is_empty() {
        return Err(ValidationError::EmptyId);
    }

    if entity.fields().contains_key(ID_FIELD) {
        return Err(ValidationError::ReservedField {
            field: ID_FIELD.to_string(),
        });
    }

    validate_pairs(entity.fields(), collection.binary_fields(), "")?;
    reject_stray_bytes(entity.fields(), collection.binary_fields(), collection, "")?;

    if let Some(page_fields) = collection.page_binary_fields() {
        match entity.get(PAGE_ENTRIES_FIELD) {
            None | Some(Value::Null) => {}
            Some(Value::Array(pages)) => {
                for (index, page) in pages.iter().enumerate() {
                    let map = page
                        .as_map()
                        .ok_or(ValidationError::InvalidPageEntry { index })?;
                    let prefix = format!("{}[{}].", PAGE_ENTRIES_FIELD, index);
                    validate_pairs(map, page_fields, &prefix)?;
                    reject_stray_bytes(map, page_fields, collection, &prefix)?;
                }
            }
            Some(other) => {
                return Err(ValidationError::PagesNotArray {
                    found: other.kind(),
                })
            }
        }
    }

    Ok(())
}

/// Checks one set of binary/MIME pairs inside a field map.
fn validate_pairs(
    fields: &BTreeMap<String, Value>,
    pairs: &[BinaryField],
    prefix: &str,
) -> ValidationResult<()> {
    for pair in pairs {
        let binary = fields.get(pair.field).unwrap_or(&Value::Null);
        let mime = fields.get(pair.mime_field).unwrap_or(&Value::Null);

        let has_binary = match binary {
            Value::Null => false,
            Value::Bytes(_) => true,
            other => {
                return Err(ValidationError::NotBinary {
                    field: format!("{}{}", prefix, pair.field),
                    found: other.kind(),
                })
            }
        };

        let has_mime = match mime {
            Value::Null => false,
            Value::Text(_) => true,
            other => {
                return Err(ValidationError::NotMimeType {
                    field: format!("{}{}", prefix, pair.mime_field),
                    found: other.kind(),
                })
            }
        };

        if has_binary != has_mime {
            return Err(ValidationError::UnpairedBinary {
                field: format!("{}{}", prefix, pair.field),
                mime_field: format!("{}{}", prefix, pair.mime_field),
            });
        }
    }
    Ok(())
}

/// Rejects binary payloads outside the declared binary fields.
///
/// Snapshots carry bytes as base64 text only where the schema expects them,
/// so bytes anywhere else would come back as plain text after a restore.
fn reject_stray_bytes(
    fields: &BTreeMap<String, Value>,
    pairs: &[BinaryField],
    collection: Collection,
    prefix: &str,
) -> ValidationResult<()> {
    for (name, value) in fields {
        if pairs.iter().any(|p| p.field == name) {
            continue;
        }
        // Page entries are checked one by one by the caller.
        if prefix.is_empty() && name == PAGE_ENTRIES_FIELD && collection.page_binary_fields().is_some() {
            continue;
        }
        if contains_bytes(value) {
            return Err(ValidationError::UnexpectedBinary {
                field: format!("{}{}", prefix, name),
            });
        }
    }
    Ok(())
}

fn contains_bytes(value: &Value) -> bool {
    match value {
        Value::Bytes(_) => true,
        Value::Array(items) => items.iter().any(contains_bytes),
        Value::Map(map) => map.values().any(contains_bytes),
        _ => false,
    }
}

//! # Record Encoding
//!
//! Entity fields ⇄ the CBOR `body` column.
//!
//! CBOR keeps byte strings as byte strings, so images go into SQLite exactly
//! as they came in. Only snapshots ever see base64.
//!
//! ```text
//! Entity.fields ──► ciborium::Value::Map ──► Vec<u8> ──► body BLOB
//!                                                          │
//! Entity ◄── fields ◄── ciborium::Value::Map ◄── Vec<u8> ◄─┘
//! ```

use ciborium::value::{Integer, Value as Cbor};
use std::collections::BTreeMap;
use vault_core::{Collection, Entity, EntityId, Value};

use crate::error::{DbError, DbResult};

/// Encodes the fields of an entity into a CBOR document.
pub fn encode_body(entity: &Entity) -> DbResult<Vec<u8>> {
    let map = Cbor::Map(
        entity
            .fields()
            .iter()
            .map(|(k, v)| (Cbor::Text(k.clone()), to_cbor(v)))
            .collect(),
    );

    let mut body = Vec::new();
    ciborium::ser::into_writer(&map, &mut body).map_err(|e| DbError::Encoding(e.to_string()))?;
    Ok(body)
}

/// Rebuilds an entity from its id column and CBOR body.
pub fn decode_body(collection: Collection, id: String, body: &[u8]) -> DbResult<Entity> {
    let value: Cbor = ciborium::de::from_reader(body)
        .map_err(|e| DbError::corrupt(collection.name(), id.as_str(), e.to_string()))?;

    let fields = match from_cbor(value) {
        Ok(Value::Map(fields)) => fields,
        Ok(other) => {
            return Err(DbError::corrupt(
                collection.name(),
                id,
                format!("body is {}, expected object", other.kind()),
            ))
        }
        Err(reason) => return Err(DbError::corrupt(collection.name(), id, reason)),
    };

    Ok(Entity::from_parts(EntityId::new(id), fields))
}

fn to_cbor(value: &Value) -> Cbor {
    match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Integer(i) => Cbor::Integer(Integer::from(*i)),
        Value::Float(f) => Cbor::Float(*f),
        Value::Text(s) => Cbor::Text(s.clone()),
        Value::Bytes(b) => Cbor::Bytes(b.clone()),
        Value::Array(items) => Cbor::Array(items.iter().map(to_cbor).collect()),
        Value::Map(map) => Cbor::Map(
            map.iter()
                .map(|(k, v)| (Cbor::Text(k.clone()), to_cbor(v)))
                .collect(),
        ),
    }
}

fn from_cbor(value: Cbor) -> Result<Value, String> {
    Ok(match value {
        Cbor::Null => Value::Null,
        Cbor::Bool(b) => Value::Bool(b),
        Cbor::Integer(i) => {
            let wide = i128::from(i);
            Value::Integer(i64::try_from(wide).map_err(|_| format!("integer {} out of range", wide))?)
        }
        Cbor::Float(f) => Value::Float(f),
        Cbor::Text(s) => Value::Text(s),
        Cbor::Bytes(b) => Value::Bytes(b),
        Cbor::Array(items) => Value::Array(
            items
                .into_iter()
                .map(from_cbor)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Cbor::Map(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                let Cbor::Text(key) = key else {
                    return Err("map key is not text".to_string());
                };
                map.insert(key, from_cbor(value)?);
            }
            Value::Map(map)
        }
        Cbor::Tag(_, inner) => from_cbor(*inner)?,
        _ => return Err("unsupported CBOR value".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_preserves_every_value_kind() {
        let mut entity = Entity::new("7")
            .with("name", "Mirror Shield")
            .with("equipped", true)
            .with("weight", 6.5)
            .with("charges", -3)
            .with("tags", vec![Value::from("armor"), Value::Null])
            .with("stats", Value::map([("ac", Value::from(2))]))
            .with_binary("image", (0..=255u8).collect(), "image/png");
        entity.insert("big", i64::MAX);

        let body = encode_body(&entity).unwrap();
        let decoded = decode_body(Collection::Items, "7".into(), &body).unwrap();

        assert_eq!(decoded, entity);
    }

    #[test]
    fn test_garbage_body_is_corrupt() {
        let err = decode_body(Collection::Spells, "x".into(), &[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, DbError::CorruptRecord { .. }));
    }

    #[test]
    fn test_non_map_body_is_corrupt() {
        let mut body = Vec::new();
        ciborium::ser::into_writer(&Cbor::Text("hello".into()), &mut body).unwrap();
        let err = decode_body(Collection::Spells, "x".into(), &body).unwrap_err();
        assert!(err.to_string().contains("expected object"));
    }
}

//! Cursor Codec
//!
//! A cursor is `base64(TypeName + ":" + JSON(map))` where the map holds the
//! record's key attributes in their stored form, e.g.
//! `Department:{"id":{"S":"d1"}}`. The map has the same shape as the store's
//! last-evaluated key, so a decoded cursor can be handed straight back to a scan.

use crate::error::ResolveError;
use crate::model::{AttributeKind, AttributeValue, KeyValue, PrimaryKey, Record, RecordType};
use crate::registry::KeyRegistry;
use crate::relay::{from_global_id, to_global_id};
use crate::storage::{codec, StorageError, ValueSerializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds and parses pagination cursors
#[derive(Debug, Clone)]
pub struct CursorCodec {
    keys: Arc<KeyRegistry>,
}

impl CursorCodec {
    pub fn new(keys: Arc<KeyRegistry>) -> Self {
        Self { keys }
    }

    /// Cursor pointing at `record`
    ///
    /// Key values are serialized with `serializer`, the same rule the store
    /// applies to stored items.
    pub fn encode<S>(
        &self,
        record_type: &RecordType,
        record: &Record,
        serializer: &S,
    ) -> Result<String, ResolveError>
    where
        S: ValueSerializer + ?Sized,
    {
        let hash_name = self.keys.key_attribute_name(record_type)?;
        let mut names = vec![hash_name];
        names.extend(self.keys.range_key_attribute_name(record_type));

        let mut data = Map::new();
        for name in names {
            let (attribute, value) = record_type
                .get_attribute(&name)
                .zip(record.get(&name))
                .ok_or_else(|| StorageError::MissingKey {
                    record_type: record_type.name().to_string(),
                })?;
            data.insert(name, serializer.serialize_value(attribute, value)?);
        }

        let json = serde_json::to_string(&data).map_err(StorageError::from)?;
        Ok(to_global_id(record_type.name(), &json))
    }

    /// Type name and key values carried by a cursor
    pub fn decode(
        &self,
        cursor: &str,
    ) -> Result<(String, BTreeMap<String, AttributeValue>), ResolveError> {
        let (type_name, data) = split(cursor)?;
        let values = data
            .iter()
            .map(|(name, raw)| {
                codec::deserialize_value(raw)
                    .map(|value| (name.clone(), value))
                    .map_err(|e| ResolveError::malformed_cursor(e.to_string()))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok((type_name, values))
    }

    /// Decode a cursor of `record_type` into the primary key it points at
    ///
    /// The type name must match and the map must hold exactly the declared key
    /// attributes, each of the declared kind.
    pub fn decode_for<S>(
        &self,
        record_type: &RecordType,
        cursor: &str,
        serializer: &S,
    ) -> Result<PrimaryKey, ResolveError>
    where
        S: ValueSerializer + ?Sized,
    {
        let (type_name, data) = split(cursor)?;
        if type_name != record_type.name() {
            return Err(ResolveError::malformed_cursor(format!(
                "cursor belongs to '{}', expected '{}'",
                type_name,
                record_type.name()
            )));
        }

        let hash_name = self.keys.key_attribute_name(record_type)?;
        let range_name = self.keys.range_key_attribute_name(record_type);
        let expected = 1 + usize::from(range_name.is_some());
        if data.len() != expected {
            return Err(ResolveError::malformed_cursor(format!(
                "expected {} key attribute(s), found {}",
                expected,
                data.len()
            )));
        }

        let hash = key_component(record_type, &hash_name, &data, serializer)?;
        let range = range_name
            .map(|name| key_component(record_type, &name, &data, serializer))
            .transpose()?;
        Ok(PrimaryKey { hash, range })
    }
}

fn split(cursor: &str) -> Result<(String, Map<String, Value>), ResolveError> {
    let (type_name, json) = from_global_id(cursor)
        .ok_or_else(|| ResolveError::malformed_cursor("not a base64 'Type:data' string"))?;
    let data: Map<String, Value> = serde_json::from_str(&json)
        .map_err(|e| ResolveError::malformed_cursor(format!("invalid key JSON: {}", e)))?;
    if data.is_empty() {
        return Err(ResolveError::malformed_cursor("cursor carries no key attributes"));
    }
    Ok((type_name, data))
}

fn key_component<S>(
    record_type: &RecordType,
    name: &str,
    data: &Map<String, Value>,
    serializer: &S,
) -> Result<KeyValue, ResolveError>
where
    S: ValueSerializer + ?Sized,
{
    let raw = data
        .get(name)
        .ok_or_else(|| ResolveError::malformed_cursor(format!("missing key attribute '{}'", name)))?;
    let attribute = record_type.get_attribute(name);
    let value = serializer
        .deserialize_value(attribute, raw)
        .map_err(|e| ResolveError::malformed_cursor(e.to_string()))?;

    let key = KeyValue::from_attribute_value(&value).ok_or_else(|| {
        ResolveError::malformed_cursor(format!("'{}' is not a usable key value", name))
    })?;
    let numeric = attribute.is_some_and(|a| a.kind == AttributeKind::Number);
    match (&key, numeric) {
        (KeyValue::Num(_), true) | (KeyValue::Str(_), false) => Ok(key),
        _ => Err(ResolveError::malformed_cursor(format!(
            "'{}' has the wrong key kind",
            name
        ))),
    }
}

//! Attribute Converter
//!
//! Maps storage-layer attribute declarations to graph-layer fields, and stored
//! values to the JSON the graph layer returns.
//!
//! | Attribute kind | Graph type |
//! |---|---|
//! | string, binary, datetime | `String` |
//! | number | `ID` for the hash key, otherwise `Int` |
//! | boolean | `Boolean` |
//! | string/number/binary set | `[String]` |
//! | json | `JSONString` |
//! | custom | registered extension converter |
//!
//! Relationship attributes have no rule here; they are exposed through
//! explicitly declared relationship fields.

use crate::error::SchemaError;
use crate::graph::{FieldType, GraphField, ScalarType};
use crate::model::{AttributeDescriptor, AttributeKind, AttributeValue};
use crate::storage::codec::format_datetime;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Converter for a custom attribute kind
pub type ExtensionConverter =
    Arc<dyn Fn(&AttributeDescriptor) -> Result<GraphField, SchemaError> + Send + Sync>;

/// Converts attribute descriptors to graph fields
#[derive(Default)]
pub struct AttributeConverter {
    extensions: RwLock<HashMap<String, ExtensionConverter>>,
}

impl AttributeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the converter for `AttributeKind::Custom(kind)`
    ///
    /// A later registration for the same kind replaces the earlier one.
    pub fn register<F>(&self, kind: impl Into<String>, converter: F)
    where
        F: Fn(&AttributeDescriptor) -> Result<GraphField, SchemaError> + Send + Sync + 'static,
    {
        let kind = kind.into();
        debug!("Registering converter for custom kind '{}'", kind);
        self.extensions.write().insert(kind, Arc::new(converter));
    }

    pub fn has_extension(&self, kind: &str) -> bool {
        self.extensions.read().contains_key(kind)
    }

    /// Convert one attribute declaration
    pub fn convert(&self, attribute: &AttributeDescriptor) -> Result<GraphField, SchemaError> {
        let required = !attribute.nullable;
        let scalar = |scalar: ScalarType| {
            GraphField::scalar(attribute.name.clone(), scalar)
                .required(required)
                .with_description(attribute.name.clone())
        };

        let field = match &attribute.kind {
            AttributeKind::String | AttributeKind::Binary | AttributeKind::DateTime => {
                scalar(ScalarType::String)
            }
            AttributeKind::Number if attribute.is_hash_key => scalar(ScalarType::Id),
            AttributeKind::Number => scalar(ScalarType::Int),
            AttributeKind::Boolean => scalar(ScalarType::Boolean),
            AttributeKind::Json => scalar(ScalarType::JsonString),
            AttributeKind::StringSet | AttributeKind::NumberSet | AttributeKind::BinarySet => {
                GraphField::new(
                    attribute.name.clone(),
                    FieldType::list_of(FieldType::Scalar(ScalarType::String)),
                )
                .with_description(attribute.name.clone())
            }
            AttributeKind::Custom(kind) => {
                let converter = self.extensions.read().get(kind).cloned();
                match converter {
                    Some(converter) => converter(attribute)?,
                    None => return Err(SchemaError::unsupported_kind(&attribute.name, kind)),
                }
            }
            AttributeKind::Relationship(_) => {
                return Err(SchemaError::unsupported_kind(
                    &attribute.name,
                    attribute.kind.as_str(),
                ))
            }
        };
        Ok(field)
    }
}

/// JSON output of a stored value for the given field
pub fn graph_value(field: &GraphField, value: &AttributeValue) -> Value {
    if field.field_type == FieldType::Scalar(ScalarType::Id) {
        return match value {
            AttributeValue::Null => Value::Null,
            AttributeValue::String(s) => Value::String(s.clone()),
            AttributeValue::Number(n) => Value::String(n.to_string()),
            other => to_json(other),
        };
    }
    to_json(value)
}

/// JSON form of a stored value
///
/// Binary data is base64 text, sets become string arrays, JSON attributes are
/// returned as their JSON text and date-times in storage format.
pub fn to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Number(n) => Value::Number(n.clone()),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Binary(bytes) => Value::String(BASE64.encode(bytes)),
        AttributeValue::StringSet(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::NumberSet(items) => Value::Array(
            items
                .iter()
                .map(|n| Value::String(n.to_string()))
                .collect(),
        ),
        AttributeValue::BinarySet(items) => Value::Array(
            items
                .iter()
                .map(|b| Value::String(BASE64.encode(b)))
                .collect(),
        ),
        AttributeValue::Json(json) => Value::String(json.to_string()),
        AttributeValue::DateTime(dt) => Value::String(format_datetime(dt)),
        AttributeValue::List(items) => Value::Array(items.iter().map(to_json).collect()),
    }
}

//! Typed JSON Value Encoding
//!
//! Stored values use the DynamoDB attribute-value shape: a single-entry object
//! whose key is a type tag.
//!
//! | Value | Encoding |
//! |---|---|
//! | string | `{"S": "d1"}` |
//! | number | `{"N": "42"}` |
//! | boolean | `{"BOOL": true}` |
//! | binary | `{"B": "<base64>"}` |
//! | sets | `{"SS": [..]}`, `{"NS": [..]}`, `{"BS": [..]}` |
//! | list | `{"L": [<encoded>, ..]}` |
//! | null | `{"NULL": true}` |
//!
//! JSON attributes are stored as `S` holding the JSON text; date-times as `S` in
//! [`DATETIME_FORMAT`].

use crate::model::{AttributeDescriptor, AttributeKind, AttributeValue, Cardinality};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Number, Value};
use thiserror::Error;

/// Storage format of date-time attributes
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f+0000";

/// Format accepted when parsing date-times (any offset, any fraction length)
const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Errors raised while encoding or decoding typed values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("expected a single-entry object with a type tag, found {0}")]
    NotTagged(String),

    #[error("unknown type tag '{0}'")]
    UnknownTag(String),

    #[error("invalid {tag} payload: {reason}")]
    InvalidPayload { tag: String, reason: String },

    #[error("attribute '{attribute}' of kind '{kind}' cannot hold a {found} value")]
    KindMismatch {
        attribute: String,
        kind: String,
        found: String,
    },
}

impl CodecError {
    fn invalid(tag: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }
}

/// Name of a value's variant, for error messages
pub fn value_kind_name(value: &AttributeValue) -> &'static str {
    match value {
        AttributeValue::Null => "null",
        AttributeValue::String(_) => "string",
        AttributeValue::Number(_) => "number",
        AttributeValue::Bool(_) => "boolean",
        AttributeValue::Binary(_) => "binary",
        AttributeValue::StringSet(_) => "string-set",
        AttributeValue::NumberSet(_) => "number-set",
        AttributeValue::BinarySet(_) => "binary-set",
        AttributeValue::Json(_) => "json",
        AttributeValue::DateTime(_) => "datetime",
        AttributeValue::List(_) => "list",
    }
}

/// Whether a declared kind may hold the given value
fn accepts(kind: &AttributeKind, value: &AttributeValue) -> bool {
    match (kind, value) {
        (_, AttributeValue::Null) => true,
        (AttributeKind::Custom(_), _) => true,
        (AttributeKind::String, AttributeValue::String(_))
        | (AttributeKind::Number, AttributeValue::Number(_))
        | (AttributeKind::Boolean, AttributeValue::Bool(_))
        | (AttributeKind::Binary, AttributeValue::Binary(_))
        | (AttributeKind::StringSet, AttributeValue::StringSet(_))
        | (AttributeKind::NumberSet, AttributeValue::NumberSet(_))
        | (AttributeKind::BinarySet, AttributeValue::BinarySet(_))
        | (AttributeKind::Json, AttributeValue::Json(_))
        | (AttributeKind::DateTime, AttributeValue::DateTime(_)) => true,
        (AttributeKind::Relationship(rel), value) => match rel.cardinality {
            Cardinality::One => matches!(
                value,
                AttributeValue::String(_) | AttributeValue::Number(_)
            ),
            Cardinality::Many => matches!(
                value,
                AttributeValue::List(_)
                    | AttributeValue::StringSet(_)
                    | AttributeValue::NumberSet(_)
            ),
        },
        _ => false,
    }
}

/// Encode a value declared by `attribute`, rejecting kind mismatches
pub fn serialize_attribute(
    attribute: &AttributeDescriptor,
    value: &AttributeValue,
) -> Result<Value, CodecError> {
    if !accepts(&attribute.kind, value) {
        return Err(CodecError::KindMismatch {
            attribute: attribute.name.clone(),
            kind: attribute.kind.to_string(),
            found: value_kind_name(value).to_string(),
        });
    }
    Ok(serialize_value(value))
}

/// Encode a value by its own variant
pub fn serialize_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => json!({ "NULL": true }),
        AttributeValue::String(s) => json!({ "S": s }),
        AttributeValue::Number(n) => json!({ "N": n.to_string() }),
        AttributeValue::Bool(b) => json!({ "BOOL": b }),
        AttributeValue::Binary(bytes) => json!({ "B": BASE64.encode(bytes) }),
        AttributeValue::StringSet(items) => json!({ "SS": items }),
        AttributeValue::NumberSet(items) => {
            let items: Vec<String> = items.iter().map(|n| n.to_string()).collect();
            json!({ "NS": items })
        }
        AttributeValue::BinarySet(items) => {
            let items: Vec<String> = items.iter().map(|b| BASE64.encode(b)).collect();
            json!({ "BS": items })
        }
        AttributeValue::Json(v) => json!({ "S": v.to_string() }),
        AttributeValue::DateTime(dt) => json!({ "S": format_datetime(dt) }),
        AttributeValue::List(items) => {
            let items: Vec<Value> = items.iter().map(serialize_value).collect();
            json!({ "L": items })
        }
    }
}

/// Decode a value using the declared kind to interpret `S` payloads
pub fn deserialize_attribute(
    attribute: &AttributeDescriptor,
    raw: &Value,
) -> Result<AttributeValue, CodecError> {
    let value = deserialize_value(raw)?;
    match (&attribute.kind, value) {
        (AttributeKind::Json, AttributeValue::String(text)) => serde_json::from_str(&text)
            .map(AttributeValue::Json)
            .map_err(|e| CodecError::invalid("S", format!("invalid JSON text: {}", e))),
        (AttributeKind::DateTime, AttributeValue::String(text)) => {
            parse_datetime(&text).map(AttributeValue::DateTime)
        }
        (_, value) => Ok(value),
    }
}

/// Decode a value from its type tag alone
pub fn deserialize_value(raw: &Value) -> Result<AttributeValue, CodecError> {
    let (tag, payload) = match raw.as_object() {
        Some(map) if map.len() == 1 => map
            .iter()
            .next()
            .ok_or_else(|| CodecError::NotTagged(raw.to_string()))?,
        _ => return Err(CodecError::NotTagged(raw.to_string())),
    };

    match tag.as_str() {
        "NULL" => Ok(AttributeValue::Null),
        "S" => payload
            .as_str()
            .map(|s| AttributeValue::String(s.to_string()))
            .ok_or_else(|| CodecError::invalid(tag, "expected a string")),
        "N" => payload
            .as_str()
            .ok_or_else(|| CodecError::invalid(tag, "expected a numeric string"))
            .and_then(parse_number)
            .map(AttributeValue::Number),
        "BOOL" => payload
            .as_bool()
            .map(AttributeValue::Bool)
            .ok_or_else(|| CodecError::invalid(tag, "expected a boolean")),
        "B" => payload
            .as_str()
            .ok_or_else(|| CodecError::invalid(tag, "expected a base64 string"))
            .and_then(decode_binary)
            .map(AttributeValue::Binary),
        "SS" => string_items(tag, payload)
            .map(|items| AttributeValue::StringSet(items.into_iter().map(str::to_string).collect())),
        "NS" => string_items(tag, payload)?
            .into_iter()
            .map(parse_number)
            .collect::<Result<Vec<_>, _>>()
            .map(AttributeValue::NumberSet),
        "BS" => string_items(tag, payload)?
            .into_iter()
            .map(decode_binary)
            .collect::<Result<Vec<_>, _>>()
            .map(AttributeValue::BinarySet),
        "L" => payload
            .as_array()
            .ok_or_else(|| CodecError::invalid(tag, "expected an array"))?
            .iter()
            .map(deserialize_value)
            .collect::<Result<Vec<_>, _>>()
            .map(AttributeValue::List),
        other => Err(CodecError::UnknownTag(other.to_string())),
    }
}

/// Encode a whole attribute map (used for stored items)
pub fn serialize_item<'a>(
    attributes: impl IntoIterator<Item = (&'a String, &'a AttributeValue)>,
) -> Map<String, Value> {
    attributes
        .into_iter()
        .map(|(name, value)| (name.clone(), serialize_value(value)))
        .collect()
}

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_str(text, DATETIME_PARSE_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CodecError::invalid("S", format!("invalid date-time '{}': {}", text, e)))
}

fn parse_number(text: &str) -> Result<Number, CodecError> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Number::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| CodecError::invalid("N", format!("'{}' is not a number", text)))
}

fn decode_binary(text: &str) -> Result<Vec<u8>, CodecError> {
    BASE64
        .decode(text)
        .map_err(|e| CodecError::invalid("B", e.to_string()))
}

fn string_items<'a>(tag: &str, payload: &'a Value) -> Result<Vec<&'a str>, CodecError> {
    payload
        .as_array()
        .ok_or_else(|| CodecError::invalid(tag, "expected an array"))?
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| CodecError::invalid(tag, "expected string elements"))
        })
        .collect()
}

//! Error types for schema construction and field resolution.
//!
//! Schema errors are raised while binding record types and abort schema
//! construction. Resolve errors are raised per field while answering a query and
//! never affect sibling fields.

use crate::model::KeyValue;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised while building the graph schema from record types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No converter exists for the attribute kind
    #[error("don't know how to convert attribute '{attribute}' of kind '{kind}'")]
    UnsupportedAttributeKind { attribute: String, kind: String },

    /// The record type declares no hash key
    #[error("record type '{record_type}' does not declare a hash key")]
    NoHashKeyDefined { record_type: String },

    /// The record type is not a valid, registered declaration
    #[error("invalid record type '{record_type}': {reason}")]
    InvalidModel { record_type: String, reason: String },

    /// A relationship attribute reached automatic projection
    #[error(
        "relationship attribute '{attribute}' on '{record_type}' cannot be projected automatically; \
         exclude it and declare a relationship field instead"
    )]
    UnsupportedRelationshipProjection {
        record_type: String,
        attribute: String,
    },

    /// A record type name was looked up but never registered
    #[error("record type '{0}' is not registered")]
    UnknownRecordType(String),
}

impl SchemaError {
    /// Create an InvalidModel error.
    pub fn invalid_model(record_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            record_type: record_type.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAttributeKind error.
    pub fn unsupported_kind(attribute: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedAttributeKind {
            attribute: attribute.into(),
            kind: kind.into(),
        }
    }
}

/// Errors raised while resolving a single field.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The pagination cursor could not be decoded
    #[error("malformed cursor: {reason}")]
    MalformedCursor { reason: String },

    /// A relationship points at a record that does not exist
    #[error("dangling reference: {record_type} with key '{key}' does not exist")]
    DanglingReference { record_type: String, key: KeyValue },

    /// A batch fetch did not return every requested key
    #[error("batch resolution of {record_type} is missing keys: {}", format_keys(.missing_keys))]
    PartialBatchResolution {
        record_type: String,
        missing_keys: Vec<KeyValue>,
    },

    /// A node id could not be converted to the key's native kind
    #[error("invalid identifier '{id}' for {record_type}: {reason}")]
    InvalidIdentifier {
        record_type: String,
        id: String,
        reason: String,
    },

    /// A stored relationship value uses an unknown encoding
    #[error("invalid value for relationship '{attribute}': {reason}")]
    InvalidRelationshipValue { attribute: String, reason: String },

    /// A selection names a field the type does not have
    #[error("type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    /// A page request asked for an unusable page size
    #[error("invalid page size {requested}: must be between 1 and {max}")]
    InvalidPageSize { requested: usize, max: usize },

    /// Storage collaborator failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Schema lookups failed during resolution
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl ResolveError {
    /// Create a MalformedCursor error.
    pub fn malformed_cursor(reason: impl Into<String>) -> Self {
        Self::MalformedCursor {
            reason: reason.into(),
        }
    }

    /// Create an InvalidIdentifier error.
    pub fn invalid_identifier(
        record_type: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidIdentifier {
            record_type: record_type.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidRelationshipValue error.
    pub fn invalid_relationship(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRelationshipValue {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }
}

fn format_keys(keys: &[KeyValue]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

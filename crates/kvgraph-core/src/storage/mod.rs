//! Record Storage
//!
//! The storage engine is an external collaborator of the graph layer. This module
//! defines the interface the graph layer consumes ([`RecordStore`]) and ships two
//! implementations:
//! - [`MemoryStore`]: in-process tables, with fetch counters for tests
//! - [`SqliteStore`]: one SQLite table per record-type table
//!
//! # Shared tables
//!
//! Record types with a discriminator share their parent's table. Stores only
//! return rows whose discriminator matches the requested variant; rows of other
//! variants behave as if absent.

pub mod codec;
pub mod memory;
pub mod schema;
pub mod sqlite;

use crate::model::{AttributeDescriptor, AttributeValue, PrimaryKey, Record, RecordType};
use async_trait::async_trait;
use thiserror::Error;

pub use codec::CodecError;
pub use memory::{MemoryStore, StoreMetrics};
pub use sqlite::SqliteStore;

/// Errors raised by a record store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("value encoding error: {0}")]
    Codec(#[from] CodecError),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("invalid table name: {0}")]
    InvalidTableName(String),

    #[error("record of type '{record_type}' has no usable primary key")]
    MissingKey { record_type: String },

    #[error("record of type '{record_type}' is missing required attribute '{attribute}'")]
    MissingAttribute {
        record_type: String,
        attribute: String,
    },

    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: String, found: String },
}

/// The value-serialization rule of a store
///
/// Cursors and relationship keys are serialized through this rule so that they
/// stay in step with the stored representation.
pub trait ValueSerializer {
    /// Serialize one attribute value to its stored form
    fn serialize_value(
        &self,
        attribute: &AttributeDescriptor,
        value: &AttributeValue,
    ) -> Result<serde_json::Value, StorageError> {
        Ok(codec::serialize_attribute(attribute, value)?)
    }

    /// Parse a stored form back into a value
    ///
    /// Without a descriptor the type tag alone decides the value variant.
    fn deserialize_value(
        &self,
        attribute: Option<&AttributeDescriptor>,
        raw: &serde_json::Value,
    ) -> Result<AttributeValue, StorageError> {
        let value = match attribute {
            Some(attr) => codec::deserialize_attribute(attr, raw)?,
            None => codec::deserialize_value(raw)?,
        };
        Ok(value)
    }
}

/// Conditions applied to scanned records
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Attribute is present and equal to the value
    Equals(String, AttributeValue),
    /// Attribute is present and not null
    Exists(String),
    /// Attribute is absent or null
    NotExists(String),
}

impl Condition {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Condition::Equals(name, value) => record.get(name) == Some(value),
            Condition::Exists(name) => record.get(name).is_some_and(|v| !v.is_null()),
            Condition::NotExists(name) => record.get(name).is_none_or(AttributeValue::is_null),
        }
    }
}

/// Conjunction of conditions evaluated during a scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanFilter {
    conditions: Vec<Condition>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `name == value`
    pub fn eq(self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.and(Condition::Equals(name.into(), value.into()))
    }

    /// Require `name` to be present
    pub fn exists(self, name: impl Into<String>) -> Self {
        self.and(Condition::Exists(name.into()))
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// Arguments of a range scan
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    /// Resume after this key (exclusive)
    pub exclusive_start_key: Option<PrimaryKey>,
    /// Maximum number of matching records to return
    pub limit: Option<usize>,
    /// Conditions every returned record satisfies
    pub filter: ScanFilter,
}

impl ScanRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, key: PrimaryKey) -> Self {
        self.exclusive_start_key = Some(key);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, filter: ScanFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// One page of a range scan, in key order
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub records: Vec<Record>,
    /// Key of the last returned record when more matching records follow
    pub last_evaluated_key: Option<PrimaryKey>,
    /// Item count of the (variant's) table, reported only for unfiltered scans
    pub table_count: Option<usize>,
}

/// Storage engine consumed by the graph layer
///
/// Only the fetch operations (`get`, `batch_get`, `scan`) are used while
/// answering queries; the rest serve schema setup and seeding.
#[async_trait]
pub trait RecordStore: ValueSerializer + Send + Sync {
    /// Create the table backing a record type (no-op if it exists)
    async fn create_table(&self, record_type: &RecordType) -> Result<(), StorageError>;

    /// Drop the table backing a record type
    async fn delete_table(&self, record_type: &RecordType) -> Result<(), StorageError>;

    /// Whether the table backing a record type exists
    async fn table_exists(&self, record_type: &RecordType) -> Result<bool, StorageError>;

    /// Point fetch by primary key
    async fn get(
        &self,
        record_type: &RecordType,
        key: &PrimaryKey,
    ) -> Result<Option<Record>, StorageError>;

    /// Fetch many keys in one call
    ///
    /// Result order is unspecified and missing keys are silently omitted.
    async fn batch_get(
        &self,
        record_type: &RecordType,
        keys: &[PrimaryKey],
    ) -> Result<Vec<Record>, StorageError>;

    /// Insert or replace a record
    async fn put(&self, record_type: &RecordType, record: &Record) -> Result<(), StorageError>;

    /// Ordered range scan
    async fn scan(
        &self,
        record_type: &RecordType,
        request: &ScanRequest,
    ) -> Result<ScanPage, StorageError>;
}

/// Validate a record before a put and return it with defaults applied
pub(crate) fn prepare_record(
    record_type: &RecordType,
    record: &Record,
) -> Result<(PrimaryKey, Record), StorageError> {
    let mut record = record.clone().with_record_type(record_type.name());
    record.apply_defaults(record_type);

    if let Some(missing) = record_type.missing_attributes(&record).first() {
        return Err(StorageError::MissingAttribute {
            record_type: record_type.name().to_string(),
            attribute: missing.to_string(),
        });
    }

    let key = record_type
        .key_of(&record)
        .ok_or_else(|| StorageError::MissingKey {
            record_type: record_type.name().to_string(),
        })?;
    Ok((key, record))
}

/// Whether a stored record belongs to the requested variant
pub(crate) fn matches_discriminator(record_type: &RecordType, record: &Record) -> bool {
    match record_type.discriminator() {
        Some(d) => record.get(&d.attribute).and_then(AttributeValue::as_str) == Some(&d.value),
        None => true,
    }
}

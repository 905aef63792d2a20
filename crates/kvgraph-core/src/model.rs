//! Record Type Declarations and Attribute Values
//!
//! A [`RecordType`] is the storage-layer schema of one table: an ordered list of
//! [`AttributeDescriptor`]s with exactly one hash key and at most one range key.
//! Several record types may share a table when they carry a [`Discriminator`]
//! (e.g. `SalaryEmployee` and `HourlyEmployee` stored alongside `Employee`).
//!
//! Record types are immutable once declared and are shared as `Arc<RecordType>`
//! through the [`ModelRegistry`](crate::registry::ModelRegistry).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;

/// Default name of the attribute holding a discriminator value
pub const DEFAULT_DISCRIMINATOR_ATTRIBUTE: &str = "cls";

// =============================================================================
// Attribute kinds
// =============================================================================

/// How many related records a relationship attribute points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// A single foreign key
    One,
    /// An ordered list of foreign keys
    Many,
}

/// Foreign-key declaration carried by a relationship attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    /// Name of the target record type (resolved through the model registry)
    pub target: String,
    /// Defer the fetch until a non-key attribute is read
    pub lazy: bool,
    /// One or many related records
    pub cardinality: Cardinality,
}

impl RelationshipDescriptor {
    /// A lazy single-record relationship
    pub fn one(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            lazy: true,
            cardinality: Cardinality::One,
        }
    }

    /// A lazy list-of-records relationship
    pub fn many(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            lazy: true,
            cardinality: Cardinality::Many,
        }
    }

    /// Set the laziness flag
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }
}

/// Declared kind of a stored attribute
///
/// `Custom` kinds are opaque to the core and must be handled by an extension
/// converter registered on the [`AttributeConverter`](crate::convert::AttributeConverter).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    String,
    Number,
    Boolean,
    Binary,
    StringSet,
    NumberSet,
    BinarySet,
    Json,
    DateTime,
    Relationship(RelationshipDescriptor),
    Custom(String),
}

impl AttributeKind {
    /// Stable name of the kind (used in error messages and SDL descriptions)
    pub fn as_str(&self) -> &str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::Number => "number",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Binary => "binary",
            AttributeKind::StringSet => "string-set",
            AttributeKind::NumberSet => "number-set",
            AttributeKind::BinarySet => "binary-set",
            AttributeKind::Json => "json",
            AttributeKind::DateTime => "datetime",
            AttributeKind::Relationship(_) => "relationship",
            AttributeKind::Custom(name) => name.as_str(),
        }
    }

    /// Whether the kind is one of the three set kinds
    pub fn is_set(&self) -> bool {
        matches!(
            self,
            AttributeKind::StringSet | AttributeKind::NumberSet | AttributeKind::BinarySet
        )
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value filled in for an attribute missing from a record before it is stored
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DefaultValue {
    #[default]
    None,
    /// A fixed value
    Value(AttributeValue),
    /// The current UTC time
    Now,
    /// A random v4 UUID string
    Uuid,
}

impl DefaultValue {
    /// Produce the default, if any
    pub fn generate(&self) -> Option<AttributeValue> {
        match self {
            DefaultValue::None => None,
            DefaultValue::Value(v) => Some(v.clone()),
            DefaultValue::Now => Some(AttributeValue::DateTime(Utc::now())),
            DefaultValue::Uuid => Some(AttributeValue::String(uuid::Uuid::new_v4().to_string())),
        }
    }
}

/// Declaration of one stored attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    pub is_hash_key: bool,
    pub is_range_key: bool,
    pub nullable: bool,
    pub default: DefaultValue,
}

impl AttributeDescriptor {
    /// A non-nullable, non-key attribute of the given kind
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_hash_key: false,
            is_range_key: false,
            nullable: false,
            default: DefaultValue::None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Boolean)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::DateTime)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Json)
    }

    /// A relationship attribute; relationships are always nullable
    pub fn relationship(name: impl Into<String>, descriptor: RelationshipDescriptor) -> Self {
        Self::new(name, AttributeKind::Relationship(descriptor)).nullable()
    }

    /// Mark as the hash key
    pub fn hash_key(mut self) -> Self {
        self.is_hash_key = true;
        self
    }

    /// Mark as the range key
    pub fn range_key(mut self) -> Self {
        self.is_range_key = true;
        self
    }

    /// Allow the attribute to be absent
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the default value rule
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = default;
        self
    }

    /// The relationship declaration, if this is a relationship attribute
    pub fn relationship_descriptor(&self) -> Option<&RelationshipDescriptor> {
        match &self.kind {
            AttributeKind::Relationship(descriptor) => Some(descriptor),
            _ => None,
        }
    }
}

// =============================================================================
// Record types
// =============================================================================

/// Marks a record type as one variant of a shared table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    /// Attribute holding the variant name
    pub attribute: String,
    /// Value identifying this variant
    pub value: String,
}

/// A named storage schema
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    name: String,
    table_name: String,
    attributes: Vec<AttributeDescriptor>,
    discriminator_attribute: Option<String>,
    discriminator: Option<Discriminator>,
}

impl RecordType {
    /// Declare a record type stored in `table_name`
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            attributes: Vec::new(),
            discriminator_attribute: None,
            discriminator: None,
        }
    }

    /// Append an attribute declaration
    pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declare a discriminator attribute so variants can share this table
    pub fn discriminated_by(mut self, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        self.attributes
            .push(AttributeDescriptor::string(attribute.clone()).nullable());
        self.discriminator_attribute = Some(attribute);
        self
    }

    /// Derive a variant stored in the same table
    ///
    /// The variant inherits every attribute of `self`; records created through
    /// [`RecordType::new_record`] carry `value` in the discriminator attribute.
    pub fn variant(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let attribute = self
            .discriminator_attribute
            .clone()
            .unwrap_or_else(|| DEFAULT_DISCRIMINATOR_ATTRIBUTE.to_string());
        Self {
            name: name.into(),
            table_name: self.table_name.clone(),
            attributes: self.attributes.clone(),
            discriminator_attribute: Some(attribute.clone()),
            discriminator: Some(Discriminator {
                attribute,
                value: value.into(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn discriminator(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    /// Attribute distinguishing variants of the shared table, if any
    pub fn discriminator_attribute(&self) -> Option<&str> {
        self.discriminator_attribute.as_deref()
    }

    /// First attribute with the given name
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The hash key attribute, if declared
    pub fn hash_key(&self) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.is_hash_key)
    }

    /// The range key attribute, if declared
    pub fn range_key(&self) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.is_range_key)
    }

    /// Whether the hash key is numeric
    pub fn has_numeric_hash_key(&self) -> bool {
        self.hash_key()
            .is_some_and(|a| a.kind == AttributeKind::Number)
    }

    /// Extract the primary key of a record of this type
    pub fn key_of(&self, record: &Record) -> Option<PrimaryKey> {
        let hash = record
            .get(&self.hash_key()?.name)
            .and_then(KeyValue::from_attribute_value)?;
        let range = match self.range_key() {
            Some(attr) => Some(
                record
                    .get(&attr.name)
                    .and_then(KeyValue::from_attribute_value)?,
            ),
            None => None,
        };
        Some(PrimaryKey { hash, range })
    }

    /// Start a record of this type, pre-filled with the discriminator value
    pub fn new_record(&self) -> Record {
        let mut record = Record::new(self.name.clone());
        if let Some(discriminator) = &self.discriminator {
            record.set(
                discriminator.attribute.clone(),
                AttributeValue::String(discriminator.value.clone()),
            );
        }
        record
    }

    /// Non-nullable attributes without a value or default in `record`
    pub fn missing_attributes<'a>(&'a self, record: &Record) -> Vec<&'a str> {
        self.attributes
            .iter()
            .filter(|attr| !attr.nullable && attr.default == DefaultValue::None)
            .filter(|attr| record.get(&attr.name).is_none_or(AttributeValue::is_null))
            .map(|attr| attr.name.as_str())
            .collect()
    }
}

// =============================================================================
// Values
// =============================================================================

/// A stored attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    String(String),
    Number(Number),
    Bool(bool),
    Binary(Vec<u8>),
    StringSet(Vec<String>),
    NumberSet(Vec<Number>),
    BinarySet(Vec<Vec<u8>>),
    Json(serde_json::Value),
    DateTime(DateTime<Utc>),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// An integer number value
    pub fn int(n: i64) -> Self {
        AttributeValue::Number(Number::from(n))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::int(i64::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// One component of a primary key
///
/// Integer keys order before string keys; within a variant the natural order applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Num(i64),
    Str(String),
}

impl KeyValue {
    /// Interpret a stored value as a key component
    pub fn from_attribute_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::String(s) => Some(KeyValue::Str(s.clone())),
            AttributeValue::Number(n) => n.as_i64().map(KeyValue::Num),
            _ => None,
        }
    }

    pub fn to_attribute_value(&self) -> AttributeValue {
        match self {
            KeyValue::Num(n) => AttributeValue::int(*n),
            KeyValue::Str(s) => AttributeValue::String(s.clone()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Num(n) => write!(f, "{}", n),
            KeyValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Str(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Str(value)
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Num(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Num(i64::from(value))
    }
}

/// Hash key plus optional range key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey {
    pub hash: KeyValue,
    pub range: Option<KeyValue>,
}

impl PrimaryKey {
    /// A key without a range component
    pub fn hash(hash: impl Into<KeyValue>) -> Self {
        Self {
            hash: hash.into(),
            range: None,
        }
    }

    /// Add a range component
    pub fn with_range(mut self, range: impl Into<KeyValue>) -> Self {
        self.range = Some(range.into());
        self
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}/{}", self.hash, range),
            None => write!(f, "{}", self.hash),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A stored record: its record-type name plus attribute values
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    record_type: String,
    attributes: BTreeMap<String, AttributeValue>,
}

impl Record {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style [`Record::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Re-label the record (used when a shared table is read through a variant)
    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = record_type.into();
        self
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Fill absent attributes from their default rules
    pub fn apply_defaults(&mut self, record_type: &RecordType) {
        for attr in record_type.attributes() {
            if self.attributes.contains_key(&attr.name) {
                continue;
            }
            if let Some(value) = attr.default.generate() {
                self.attributes.insert(attr.name.clone(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> RecordType {
        RecordType::new("Employee", "employees")
            .attribute(AttributeDescriptor::string("id").hash_key())
            .attribute(AttributeDescriptor::string("name"))
            .attribute(AttributeDescriptor::datetime("hired_on").with_default(DefaultValue::Now))
            .discriminated_by("cls")
    }

    #[test]
    fn test_key_lookup() {
        let rt = employee();
        assert_eq!(rt.hash_key().unwrap().name, "id");
        assert!(rt.range_key().is_none());
        assert!(!rt.has_numeric_hash_key());
    }

    #[test]
    fn test_key_of_record() {
        let rt = employee();
        let record = rt.new_record().with("id", "e1").with("name", "Peter");
        assert_eq!(rt.key_of(&record), Some(PrimaryKey::hash("e1")));

        let keyless = rt.new_record().with("name", "Nobody");
        assert_eq!(rt.key_of(&keyless), None);
    }

    #[test]
    fn test_variant_shares_table_and_sets_discriminator() {
        let base = employee();
        let salaried = base
            .variant("SalaryEmployee", "SalaryEmployee")
            .attribute(AttributeDescriptor::number("salary"));

        assert_eq!(salaried.table_name(), "employees");
        assert_eq!(salaried.attributes().len(), base.attributes().len() + 1);

        let record = salaried.new_record();
        assert_eq!(record.record_type(), "SalaryEmployee");
        assert_eq!(record.get("cls"), Some(&AttributeValue::from("SalaryEmployee")));
    }

    #[test]
    fn test_apply_defaults() {
        let rt = employee();
        let mut record = rt.new_record().with("id", "e1").with("name", "Peter");
        record.apply_defaults(&rt);
        assert!(matches!(record.get("hired_on"), Some(AttributeValue::DateTime(_))));
    }

    #[test]
    fn test_missing_attributes() {
        let rt = employee();
        let record = rt.new_record().with("id", "e1");
        assert_eq!(rt.missing_attributes(&record), vec!["name"]);
    }

    #[test]
    fn test_key_value_ordering() {
        let mut keys = vec![
            KeyValue::from("b"),
            KeyValue::from(10),
            KeyValue::from("a"),
            KeyValue::from(9),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                KeyValue::from(9),
                KeyValue::from(10),
                KeyValue::from("a"),
                KeyValue::from("b"),
            ]
        );
    }
}

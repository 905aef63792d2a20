//! Relationship Proxies
//!
//! A relationship attribute stores the foreign key(s) of related records. When
//! it is read back it becomes a proxy that knows the target record type and the
//! key, and fetches the related record only when something other than the key
//! is asked for.
//!
//! - [`LazyRecord`]: one related record, fetched by a single point `get`
//! - [`LazyRecordList`]: many related records, fetched by a single `batch_get`
//! - [`Relationship`]: encodes records to keys and decodes keys to proxies
//!
//! Fetched records are memoized in a `tokio::sync::OnceCell`. Concurrent first
//! accesses share one fetch, and a cancelled fetch leaves the cell empty so the
//! next access retries.

use crate::error::{ResolveError, SchemaError};
use crate::model::{
    AttributeDescriptor, AttributeValue, Cardinality, KeyValue, PrimaryKey, Record, RecordType,
    RelationshipDescriptor,
};
use crate::registry::{KeyRegistry, ModelRegistry};
use crate::storage::{RecordStore, StorageError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

// =============================================================================
// Single proxy
// =============================================================================

/// A related record that is fetched on first non-key access
pub struct LazyRecord {
    target: Arc<RecordType>,
    key_name: String,
    key: KeyValue,
    store: Arc<dyn RecordStore>,
    record: OnceCell<Record>,
}

impl LazyRecord {
    /// An unresolved proxy
    pub fn new(
        target: Arc<RecordType>,
        key_name: impl Into<String>,
        key: KeyValue,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            target,
            key_name: key_name.into(),
            key,
            store,
            record: OnceCell::new(),
        }
    }

    /// A proxy resolved at construction
    pub async fn eager(
        target: Arc<RecordType>,
        key_name: impl Into<String>,
        key: KeyValue,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, ResolveError> {
        let proxy = Self::new(target, key_name, key, store);
        proxy.resolve().await?;
        Ok(proxy)
    }

    pub fn target(&self) -> &Arc<RecordType> {
        &self.target
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// The foreign key (never fetches)
    pub fn key(&self) -> &KeyValue {
        &self.key
    }

    /// Read an attribute of the related record
    ///
    /// The key attribute is answered from the proxy; any other name resolves
    /// the record first.
    pub async fn attribute(&self, name: &str) -> Result<Option<AttributeValue>, ResolveError> {
        if name == self.key_name {
            return Ok(Some(self.key.to_attribute_value()));
        }
        Ok(self.resolve().await?.get(name).cloned())
    }

    /// The related record, fetching it on first call
    pub async fn resolve(&self) -> Result<&Record, ResolveError> {
        self.record.get_or_try_init(|| self.fetch()).await
    }

    async fn fetch(&self) -> Result<Record, ResolveError> {
        debug!("Resolving {} '{}'", self.target.name(), self.key);
        let key = PrimaryKey {
            hash: self.key.clone(),
            range: None,
        };
        self.store
            .get(&self.target, &key)
            .await?
            .ok_or_else(|| ResolveError::DanglingReference {
                record_type: self.target.name().to_string(),
                key: self.key.clone(),
            })
    }

    pub fn is_resolved(&self) -> bool {
        self.record.initialized()
    }

    /// The record if it has already been fetched
    pub fn cached(&self) -> Option<&Record> {
        self.record.get()
    }
}

impl fmt::Debug for LazyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRecord")
            .field("target", &self.target.name())
            .field("key", &self.key)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Compares target type and key; never fetches
impl PartialEq<Record> for LazyRecord {
    fn eq(&self, other: &Record) -> bool {
        other.record_type() == self.target.name()
            && other
                .get(&self.key_name)
                .and_then(KeyValue::from_attribute_value)
                .as_ref()
                == Some(&self.key)
    }
}

impl PartialEq for LazyRecord {
    fn eq(&self, other: &Self) -> bool {
        self.target.name() == other.target.name() && self.key == other.key
    }
}

// =============================================================================
// List proxy
// =============================================================================

/// An ordered list of related records fetched together
pub struct LazyRecordList {
    target: Arc<RecordType>,
    key_name: String,
    keys: Vec<KeyValue>,
    store: Arc<dyn RecordStore>,
    records: OnceCell<Vec<Record>>,
}

impl LazyRecordList {
    /// An unresolved list
    pub fn new(
        target: Arc<RecordType>,
        key_name: impl Into<String>,
        keys: Vec<KeyValue>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            target,
            key_name: key_name.into(),
            keys,
            store,
            records: OnceCell::new(),
        }
    }

    /// A list resolved at construction
    pub async fn eager(
        target: Arc<RecordType>,
        key_name: impl Into<String>,
        keys: Vec<KeyValue>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, ResolveError> {
        let list = Self::new(target, key_name, keys, store);
        list.resolve_all().await?;
        Ok(list)
    }

    pub fn target(&self) -> &Arc<RecordType> {
        &self.target
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn keys(&self) -> &[KeyValue] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Lazy proxy for the element at `index`
    pub fn get(&self, index: usize) -> Option<LazyRecord> {
        self.keys.get(index).map(|key| self.proxy(key))
    }

    /// Lazy sub-list; `None` when the range is out of bounds
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Option<LazyRecordList> {
        let bounds = (range.start_bound().cloned(), range.end_bound().cloned());
        self.keys.get(bounds).map(|keys| {
            LazyRecordList::new(
                Arc::clone(&self.target),
                self.key_name.clone(),
                keys.to_vec(),
                Arc::clone(&self.store),
            )
        })
    }

    /// Lazy proxies in key order
    pub fn iter(&self) -> impl Iterator<Item = LazyRecord> + '_ {
        self.keys.iter().map(|key| self.proxy(key))
    }

    fn proxy(&self, key: &KeyValue) -> LazyRecord {
        LazyRecord::new(
            Arc::clone(&self.target),
            self.key_name.clone(),
            key.clone(),
            Arc::clone(&self.store),
        )
    }

    /// All related records in key order, fetched by one batch call
    ///
    /// Duplicate keys are requested once and repeat the same record in the
    /// result. Any key the store does not return fails the whole call.
    pub async fn resolve_all(&self) -> Result<&[Record], ResolveError> {
        let records = self.records.get_or_try_init(|| self.fetch_all()).await?;
        Ok(records.as_slice())
    }

    async fn fetch_all(&self) -> Result<Vec<Record>, ResolveError> {
        if self.keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<&KeyValue> = self.keys.iter().filter(|key| seen.insert(*key)).collect();
        let request: Vec<PrimaryKey> = unique
            .iter()
            .map(|key| PrimaryKey {
                hash: (*key).clone(),
                range: None,
            })
            .collect();

        debug!(
            "Batch resolving {} {} records",
            request.len(),
            self.target.name()
        );
        let fetched = self.store.batch_get(&self.target, &request).await?;

        let by_key: HashMap<KeyValue, Record> = fetched
            .into_iter()
            .filter_map(|record| {
                record
                    .get(&self.key_name)
                    .and_then(KeyValue::from_attribute_value)
                    .map(|key| (key, record))
            })
            .collect();

        let missing_keys: Vec<KeyValue> = unique
            .into_iter()
            .filter(|key| !by_key.contains_key(*key))
            .cloned()
            .collect();
        if !missing_keys.is_empty() {
            return Err(ResolveError::PartialBatchResolution {
                record_type: self.target.name().to_string(),
                missing_keys,
            });
        }

        Ok(self
            .keys
            .iter()
            .filter_map(|key| by_key.get(key).cloned())
            .collect())
    }

    pub fn is_resolved(&self) -> bool {
        self.records.initialized()
    }
}

impl fmt::Debug for LazyRecordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRecordList")
            .field("target", &self.target.name())
            .field("keys", &self.keys)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

// =============================================================================
// Relationship attribute codec
// =============================================================================

/// Decoded value of a relationship attribute
#[derive(Debug)]
pub enum RelatedValue {
    One(LazyRecord),
    Many(LazyRecordList),
}

/// Encodes related records as keys and decodes stored keys as proxies
#[derive(Debug, Clone)]
pub struct Relationship {
    attribute: String,
    descriptor: RelationshipDescriptor,
    target: Arc<RecordType>,
    key_name: String,
}

impl Relationship {
    /// Codec for a relationship attribute
    ///
    /// The target record type is looked up by name in `models`.
    pub fn new(
        attribute: &AttributeDescriptor,
        models: &ModelRegistry,
        keys: &KeyRegistry,
    ) -> Result<Self, SchemaError> {
        let descriptor = attribute.relationship_descriptor().ok_or_else(|| {
            SchemaError::invalid_model(
                attribute.name.clone(),
                "attribute is not a relationship",
            )
        })?;
        let target = models.require(&descriptor.target)?;
        let key_name = keys.key_attribute_name(&target)?;
        Ok(Self {
            attribute: attribute.name.clone(),
            descriptor: descriptor.clone(),
            target,
            key_name,
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn descriptor(&self) -> &RelationshipDescriptor {
        &self.descriptor
    }

    pub fn target(&self) -> &Arc<RecordType> {
        &self.target
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    fn key_of(&self, record: &Record) -> Result<KeyValue, ResolveError> {
        record
            .get(&self.key_name)
            .and_then(KeyValue::from_attribute_value)
            .ok_or_else(|| {
                ResolveError::from(StorageError::MissingKey {
                    record_type: self.target.name().to_string(),
                })
            })
    }

    /// Stored form of a single related record: its key as a string
    pub fn serialize_one(&self, record: &Record) -> Result<AttributeValue, ResolveError> {
        Ok(AttributeValue::String(self.key_of(record)?.to_string()))
    }

    /// Stored form of many related records: a list of typed keys
    pub fn serialize_many(&self, records: &[Record]) -> Result<AttributeValue, ResolveError> {
        records
            .iter()
            .map(|record| self.key_of(record).map(|key| key.to_attribute_value()))
            .collect::<Result<Vec<_>, _>>()
            .map(AttributeValue::List)
    }

    /// Proxy (or proxy list) for a stored relationship value
    ///
    /// Non-lazy relationships resolve before returning.
    pub async fn deserialize(
        &self,
        value: &AttributeValue,
        store: &Arc<dyn RecordStore>,
    ) -> Result<RelatedValue, ResolveError> {
        let lazy = self.descriptor.lazy;
        match self.descriptor.cardinality {
            Cardinality::One => {
                let key = self.parse_key(value)?;
                let (target, store) = (Arc::clone(&self.target), Arc::clone(store));
                let proxy = if lazy {
                    LazyRecord::new(target, self.key_name.clone(), key, store)
                } else {
                    LazyRecord::eager(target, self.key_name.clone(), key, store).await?
                };
                Ok(RelatedValue::One(proxy))
            }
            Cardinality::Many => {
                let keys = self.parse_keys(value)?;
                let (target, store) = (Arc::clone(&self.target), Arc::clone(store));
                let list = if lazy {
                    LazyRecordList::new(target, self.key_name.clone(), keys, store)
                } else {
                    LazyRecordList::eager(target, self.key_name.clone(), keys, store).await?
                };
                Ok(RelatedValue::Many(list))
            }
        }
    }

    fn parse_keys(&self, value: &AttributeValue) -> Result<Vec<KeyValue>, ResolveError> {
        match value {
            AttributeValue::List(items) => items.iter().map(|item| self.parse_key(item)).collect(),
            AttributeValue::StringSet(items) => {
                warn!(
                    "Relationship '{}' uses the legacy string-set encoding",
                    self.attribute
                );
                items
                    .iter()
                    .map(|item| self.parse_key(&AttributeValue::String(item.clone())))
                    .collect()
            }
            AttributeValue::NumberSet(items) => {
                warn!(
                    "Relationship '{}' uses the legacy number-set encoding",
                    self.attribute
                );
                items
                    .iter()
                    .map(|item| self.parse_key(&AttributeValue::Number(item.clone())))
                    .collect()
            }
            other => Err(ResolveError::invalid_relationship(
                &self.attribute,
                format!("expected a list of keys, found {}", kind_name(other)),
            )),
        }
    }

    fn parse_key(&self, value: &AttributeValue) -> Result<KeyValue, ResolveError> {
        let numeric = self.target.has_numeric_hash_key();
        match value {
            AttributeValue::String(s) if numeric => s.parse::<i64>().map(KeyValue::Num).map_err(|_| {
                ResolveError::invalid_relationship(
                    &self.attribute,
                    format!("'{}' is not a numeric key", s),
                )
            }),
            AttributeValue::String(s) => Ok(KeyValue::Str(s.clone())),
            AttributeValue::Number(n) => match n.as_i64() {
                Some(n) if numeric => Ok(KeyValue::Num(n)),
                Some(n) => Ok(KeyValue::Str(n.to_string())),
                None => Err(ResolveError::invalid_relationship(
                    &self.attribute,
                    format!("'{}' is not an integer key", n),
                )),
            },
            other => Err(ResolveError::invalid_relationship(
                &self.attribute,
                format!("expected a key, found {}", kind_name(other)),
            )),
        }
    }
}

fn kind_name(value: &AttributeValue) -> &'static str {
    crate::storage::codec::value_kind_name(value)
}

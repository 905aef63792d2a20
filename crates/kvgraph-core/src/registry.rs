//! Schema Registries
//!
//! Three append-only registries back schema construction and query answering:
//! - [`KeyRegistry`]: memoized hash-key attribute name per record type
//! - [`ModelRegistry`]: declared record types by name (relationship targets are
//!   resolved through it)
//! - [`TypeRegistry`]: bound graph types by record-type name
//!
//! All three are `DashMap`-based and safe for concurrent use. They are bundled
//! in a [`SchemaContext`] that is constructed explicitly and passed by reference.

use crate::binder::{BoundType, TypeBinder};
use crate::connection::{ConnectionField, PageLimits};
use crate::convert::AttributeConverter;
use crate::cursor::CursorCodec;
use crate::error::SchemaError;
use crate::graph::{NODE_INTERFACE_SDL, PAGE_INFO_SDL};
use crate::model::RecordType;
use crate::relationship::Relationship;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

// =============================================================================
// Key registry
// =============================================================================

/// Memoized hash-key attribute names
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: DashMap<String, String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the hash key attribute of `record_type`
    ///
    /// Computed on first use and cached by record-type name. Concurrent first
    /// calls compute the same value; the first insert wins.
    pub fn key_attribute_name(&self, record_type: &RecordType) -> Result<String, SchemaError> {
        if let Some(name) = self.keys.get(record_type.name()) {
            trace!("Key registry hit for {}", record_type.name());
            return Ok(name.value().clone());
        }

        let attribute = record_type
            .hash_key()
            .ok_or_else(|| SchemaError::NoHashKeyDefined {
                record_type: record_type.name().to_string(),
            })?;

        let name = self
            .keys
            .entry(record_type.name().to_string())
            .or_insert_with(|| attribute.name.clone())
            .value()
            .clone();
        debug!("Key attribute of {} is '{}'", record_type.name(), name);
        Ok(name)
    }

    /// Name of the range key attribute, if declared
    pub fn range_key_attribute_name(&self, record_type: &RecordType) -> Option<String> {
        record_type.range_key().map(|attr| attr.name.clone())
    }

    /// Number of memoized entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// =============================================================================
// Model registry
// =============================================================================

/// Declared record types by name
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: DashMap<String, Arc<RecordType>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record type
    ///
    /// Registering an identical declaration again returns the existing entry;
    /// a different declaration under the same name is rejected.
    pub fn register(&self, record_type: RecordType) -> Result<Arc<RecordType>, SchemaError> {
        let name = record_type.name().to_string();
        let entry = self
            .models
            .entry(name.clone())
            .or_insert_with(|| Arc::new(record_type.clone()));

        if **entry.value() != record_type {
            return Err(SchemaError::invalid_model(
                name,
                "a different record type is already registered under this name",
            ));
        }
        debug!("Registered record type {}", name);
        Ok(Arc::clone(entry.value()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<RecordType>> {
        self.models.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`ModelRegistry::get`], failing for unknown names
    pub fn require(&self, name: &str) -> Result<Arc<RecordType>, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownRecordType(name.to_string()))
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

// =============================================================================
// Type registry
// =============================================================================

/// Bound graph types by record-type name
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: DashMap<String, Arc<BoundType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a bound type
    pub fn register(&self, bound: Arc<BoundType>) {
        debug!(
            "Registered graph type {} for {}",
            bound.name(),
            bound.record_type().name()
        );
        self.types
            .insert(bound.record_type().name().to_string(), bound);
    }

    /// Bound type of a record type
    pub fn get(&self, record_type: &str) -> Option<Arc<BoundType>> {
        self.types.get(record_type).map(|entry| Arc::clone(entry.value()))
    }

    /// Bound type by graph type name
    pub fn by_type_name(&self, type_name: &str) -> Option<Arc<BoundType>> {
        self.types
            .iter()
            .find(|entry| entry.value().name() == type_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// All bound types, ordered by graph type name
    pub fn all(&self) -> Vec<Arc<BoundType>> {
        let mut types: Vec<Arc<BoundType>> =
            self.types.iter().map(|e| Arc::clone(e.value())).collect();
        types.sort_by(|a, b| a.name().cmp(b.name()));
        types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// =============================================================================
// Schema context
// =============================================================================

/// Registries, converter and paging limits shared by one schema
#[derive(Default)]
pub struct SchemaContext {
    models: ModelRegistry,
    keys: Arc<KeyRegistry>,
    types: TypeRegistry,
    converter: AttributeConverter,
    limits: PageLimits,
}

impl SchemaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given paging limits for connection fields
    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn keys(&self) -> &Arc<KeyRegistry> {
        &self.keys
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn converter(&self) -> &AttributeConverter {
        &self.converter
    }

    pub fn page_limits(&self) -> PageLimits {
        self.limits
    }

    /// Shorthand for `models().register(..)`
    pub fn register_model(&self, record_type: RecordType) -> Result<Arc<RecordType>, SchemaError> {
        self.models.register(record_type)
    }

    pub fn binder(&self) -> TypeBinder<'_> {
        TypeBinder::new(self)
    }

    pub fn cursor_codec(&self) -> CursorCodec {
        CursorCodec::new(Arc::clone(&self.keys))
    }

    /// Relationship codec for `attribute` of a registered record type
    pub fn relationship(&self, record_type: &str, attribute: &str) -> Result<Relationship, SchemaError> {
        let model = self.models.require(record_type)?;
        let descriptor = model.get_attribute(attribute).ok_or_else(|| {
            SchemaError::invalid_model(record_type, format!("no attribute named '{}'", attribute))
        })?;
        Relationship::new(descriptor, &self.models, &self.keys)
    }

    /// Connection field listing the bound type of `record_type`
    pub fn connection_field(&self, record_type: &str) -> Result<ConnectionField, SchemaError> {
        let bound = self
            .types
            .get(record_type)
            .ok_or_else(|| SchemaError::UnknownRecordType(record_type.to_string()))?;
        Ok(ConnectionField::new(bound, self.cursor_codec()).with_limits(self.limits))
    }

    /// SDL of every bound type, in type-name order
    pub fn sdl(&self) -> String {
        let types = self.types.all();
        let mut parts = Vec::new();
        if types.iter().any(|t| t.implements_node()) {
            parts.push(NODE_INTERFACE_SDL.to_string());
        }
        if types.iter().any(|t| t.connection().is_some()) {
            parts.push(PAGE_INFO_SDL.to_string());
        }
        parts.extend(types.iter().map(|t| t.to_sdl()));
        parts.join("\n")
    }
}

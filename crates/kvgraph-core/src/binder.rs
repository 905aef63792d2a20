//! Type Binder
//!
//! Binds a registered record type to a graph object type: validates the
//! declaration, projects its attributes, merges interface fields, derives the
//! connection type and registers the result.
//!
//! ```text
//! RecordType ──► FieldProjector ──► interface fields ──► extra fields
//!                                                           │
//!                        TypeRegistry ◄── BoundType ◄───────┘
//! ```

use crate::error::{ResolveError, SchemaError};
use crate::graph::{is_valid_type_name, object_sdl, ConnectionType, GraphField, Interface};
use crate::model::{KeyValue, PrimaryKey, Record, RecordType};
use crate::projector::FieldProjector;
use crate::registry::SchemaContext;
use crate::relationship::LazyRecord;
use crate::relay::to_global_id;
use crate::storage::RecordStore;
use std::sync::Arc;
use tracing::debug;

/// Options of a [`TypeBinder::bind`] call
#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    /// Graph type name (defaults to the record-type name)
    pub type_name: Option<String>,
    /// Keep only these attributes (empty keeps all)
    pub only_fields: Vec<String>,
    /// Drop these attributes
    pub exclude_fields: Vec<String>,
    pub interfaces: Vec<Interface>,
    /// Explicit connection type
    pub connection: Option<ConnectionType>,
    /// Whether the type is listed through a connection (default: it implements `Node`)
    pub use_connection: Option<bool>,
    /// Name of the `Node` id field (default `id`)
    pub id_field: Option<String>,
    /// Manually declared fields, e.g. relationship fields
    pub extra_fields: Vec<GraphField>,
    /// Do not register the bound type
    pub skip_registry: bool,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Implement the relay `Node` interface
    pub fn node() -> Self {
        Self::new().interface(Interface::Node)
    }

    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn interface(mut self, interface: Interface) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn connection(mut self, connection: ConnectionType) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn use_connection(mut self, use_connection: bool) -> Self {
        self.use_connection = Some(use_connection);
        self
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = Some(name.into());
        self
    }

    pub fn field(mut self, field: GraphField) -> Self {
        self.extra_fields.push(field);
        self
    }

    pub fn skip_registry(mut self) -> Self {
        self.skip_registry = true;
        self
    }
}

/// A candidate value for [`BoundType::is_instance`]
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    Record(&'a Record),
    Proxy(&'a LazyRecord),
}

impl<'a> From<&'a Record> for Candidate<'a> {
    fn from(record: &'a Record) -> Self {
        Candidate::Record(record)
    }
}

impl<'a> From<&'a LazyRecord> for Candidate<'a> {
    fn from(proxy: &'a LazyRecord) -> Self {
        Candidate::Proxy(proxy)
    }
}

/// A record type bound to a graph object type
#[derive(Debug, Clone)]
pub struct BoundType {
    name: String,
    record_type: Arc<RecordType>,
    fields: Vec<GraphField>,
    interfaces: Vec<Interface>,
    connection: Option<ConnectionType>,
    id_field: String,
    key_name: String,
}

impl BoundType {
    /// Graph type name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[GraphField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&GraphField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn connection(&self) -> Option<&ConnectionType> {
        self.connection.as_ref()
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Hash key attribute of the record type
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn implements_node(&self) -> bool {
        self.interfaces.iter().any(Interface::is_node)
    }

    /// Whether `candidate` is a value of this type
    ///
    /// Proxies count when they target this record type; they are not resolved.
    pub fn is_instance<'a>(&self, candidate: impl Into<Candidate<'a>>) -> bool {
        match candidate.into() {
            Candidate::Record(record) => record.record_type() == self.record_type.name(),
            Candidate::Proxy(proxy) => proxy.target().name() == self.record_type.name(),
        }
    }

    /// The node id of `record`: its hash key, for `Node` types only
    pub fn node_id(&self, record: &Record) -> Option<KeyValue> {
        if !self.implements_node() {
            return None;
        }
        record
            .get(&self.key_name)
            .and_then(KeyValue::from_attribute_value)
    }

    /// Relay global ID of `record`
    pub fn global_id(&self, record: &Record) -> Option<String> {
        self.node_id(record)
            .map(|id| to_global_id(&self.name, &id.to_string()))
    }

    /// Fetch a record by its node id
    ///
    /// The id is converted to the key's native kind first; numeric keys must
    /// parse as integers.
    pub async fn by_id(
        &self,
        store: &dyn RecordStore,
        id: &str,
    ) -> Result<Option<Record>, ResolveError> {
        let key = if self.record_type.has_numeric_hash_key() {
            id.parse::<i64>().map(KeyValue::Num).map_err(|_| {
                ResolveError::invalid_identifier(
                    self.record_type.name(),
                    id,
                    "expected an integer key",
                )
            })?
        } else {
            KeyValue::Str(id.to_string())
        };
        Ok(store.get(&self.record_type, &PrimaryKey::hash(key)).await?)
    }

    /// SDL of this type and its connection types
    pub fn to_sdl(&self) -> String {
        let mut sdl = object_sdl(&self.name, &self.interfaces, &self.fields);
        if let Some(connection) = &self.connection {
            sdl.push('\n');
            sdl.push_str(&connection.to_sdl());
        }
        sdl
    }
}

/// Binds record types registered in a [`SchemaContext`]
pub struct TypeBinder<'a> {
    context: &'a SchemaContext,
}

impl<'a> TypeBinder<'a> {
    pub fn new(context: &'a SchemaContext) -> Self {
        Self { context }
    }

    /// Bind the registered record type `record_type`
    pub fn bind(
        &self,
        record_type: &str,
        options: BindOptions,
    ) -> Result<Arc<BoundType>, SchemaError> {
        let model = self.context.models().get(record_type).ok_or_else(|| {
            SchemaError::invalid_model(record_type, "record type is not registered")
        })?;
        let name = options
            .type_name
            .clone()
            .unwrap_or_else(|| model.name().to_string());
        validate(&model, &name)?;
        let key_name = self.context.keys().key_attribute_name(&model)?;

        let projected = FieldProjector::new(self.context.converter()).project(
            &model,
            &options.only_fields,
            &options.exclude_fields,
        )?;
        let mut fields: Vec<GraphField> = projected.into_values().collect();

        let id_field = options.id_field.clone().unwrap_or_else(|| "id".to_string());
        for interface in &options.interfaces {
            for field in interface.fields(&id_field) {
                upsert(&mut fields, field);
            }
        }
        for field in options.extra_fields {
            upsert(&mut fields, field);
        }

        let use_connection = options
            .use_connection
            .unwrap_or_else(|| options.interfaces.iter().any(Interface::is_node));
        let connection = match options.connection {
            Some(connection) => Some(connection),
            None if use_connection => Some(ConnectionType::derive(&name)),
            None => None,
        };

        let bound = Arc::new(BoundType {
            name,
            record_type: model,
            fields,
            interfaces: options.interfaces,
            connection,
            id_field,
            key_name,
        });
        debug!(
            "Bound {} with {} fields",
            bound.name(),
            bound.fields().len()
        );

        if !options.skip_registry {
            self.context.types().register(Arc::clone(&bound));
        }
        Ok(bound)
    }
}

fn validate(model: &RecordType, type_name: &str) -> Result<(), SchemaError> {
    if !is_valid_type_name(type_name) {
        return Err(SchemaError::invalid_model(
            model.name(),
            format!("'{}' is not a valid type name", type_name),
        ));
    }
    if model.attributes().is_empty() {
        return Err(SchemaError::invalid_model(model.name(), "no attributes declared"));
    }
    let hash_keys = model.attributes().iter().filter(|a| a.is_hash_key).count();
    let range_keys = model.attributes().iter().filter(|a| a.is_range_key).count();
    if hash_keys > 1 || range_keys > 1 {
        return Err(SchemaError::invalid_model(
            model.name(),
            "at most one hash key and one range key may be declared",
        ));
    }
    if hash_keys == 0 {
        return Err(SchemaError::NoHashKeyDefined {
            record_type: model.name().to_string(),
        });
    }
    Ok(())
}

/// Replace a same-named field in place, or append
fn upsert(fields: &mut Vec<GraphField>, field: GraphField) {
    match fields.iter_mut().find(|f| f.name == field.name) {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

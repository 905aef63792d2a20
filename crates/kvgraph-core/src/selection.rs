//! Field Selection
//!
//! A [`Selection`] is the set of fields a client asked for, as a tree:
//! `"name,department.name"` selects `name` plus `name` beneath `department`.
//! Rendering a record against a selection only resolves relationship proxies
//! when a non-key field is selected beneath them.

use crate::binder::BoundType;
use crate::convert::graph_value;
use crate::error::{ResolveError, SchemaError};
use crate::graph::{FieldSource, GraphField};
use crate::model::{AttributeValue, KeyValue, Record};
use crate::registry::SchemaContext;
use crate::relationship::RelatedValue;
use crate::relay::Connection;
use crate::storage::RecordStore;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::trace;

type RenderFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ResolveError>> + Send + 'a>>;

/// A selected field and the fields selected beneath it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedField {
    pub name: String,
    pub children: Selection,
}

/// Fields requested from one object, in request order
///
/// An empty selection stands for every non-relationship field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    fields: Vec<SelectedField>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse comma-separated dotted paths (`"id,department.name"`)
    pub fn parse(spec: &str) -> Self {
        let mut selection = Self::new();
        for path in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let segments: Vec<&str> = path
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            selection.insert(&segments);
        }
        selection
    }

    fn insert(&mut self, path: &[&str]) {
        let Some((head, rest)) = path.split_first() else {
            return;
        };
        let index = match self.fields.iter().position(|f| f.name == *head) {
            Some(index) => index,
            None => {
                self.fields.push(SelectedField {
                    name: head.to_string(),
                    children: Selection::new(),
                });
                self.fields.len() - 1
            }
        };
        self.fields[index].children.insert(rest);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedField> {
        self.fields.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Sub-selection of a field
    pub fn get(&self, name: &str) -> Option<&Selection> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.children)
    }

    /// The node fields of a connection selection
    ///
    /// A selection naming `edges`, `pageInfo` or `totalCount` is read as a
    /// connection selection: its `edges.node.*` paths are the node fields, and
    /// without them nodes render their default fields. A selection naming
    /// none of those is taken as node fields directly (`"name,department.name"`).
    pub fn node_fields(&self) -> &Selection {
        if !self.names().any(|name| CONNECTION_FIELDS.contains(&name)) {
            return self;
        }
        self.get("edges")
            .and_then(|edges| edges.get("node"))
            .unwrap_or(&DEFAULT_SELECTION)
    }
}

/// Fields of a connection object itself
const CONNECTION_FIELDS: [&str; 3] = ["edges", "pageInfo", "totalCount"];

static DEFAULT_SELECTION: Selection = Selection { fields: Vec::new() };

impl SchemaContext {
    /// Render `record` of `bound` as JSON for `selection`
    pub fn render<'a>(
        &'a self,
        store: &'a Arc<dyn RecordStore>,
        bound: &'a BoundType,
        record: &'a Record,
        selection: &'a Selection,
    ) -> RenderFuture<'a> {
        Box::pin(async move {
            let mut out = Map::new();

            if selection.is_empty() {
                for field in bound.fields() {
                    if !matches!(field.source, FieldSource::Relationship(_)) {
                        out.insert(field.name.clone(), scalar_value(bound, record, field));
                    }
                }
                return Ok(Value::Object(out));
            }

            for selected in selection.iter() {
                let field = bound
                    .field(&selected.name)
                    .ok_or_else(|| ResolveError::UnknownField {
                        type_name: bound.name().to_string(),
                        field: selected.name.clone(),
                    })?;
                let value = match &field.source {
                    FieldSource::Attribute(_) | FieldSource::GlobalId => {
                        scalar_value(bound, record, field)
                    }
                    FieldSource::Relationship(attribute) => {
                        self.render_related(store, bound, record, attribute, &selected.children)
                            .await?
                    }
                };
                out.insert(selected.name.clone(), value);
            }
            Ok::<_, ResolveError>(Value::Object(out))
        })
    }

    /// Render a connection page; `selection` may use `edges.node.*` paths
    pub async fn render_connection(
        &self,
        store: &Arc<dyn RecordStore>,
        bound: &BoundType,
        connection: &Connection,
        selection: &Selection,
    ) -> Result<Value, ResolveError> {
        let nodes = selection.node_fields();
        let mut edges = Vec::with_capacity(connection.edges.len());
        for edge in &connection.edges {
            let node = self.render(store, bound, &edge.node, nodes).await?;
            edges.push(json!({ "cursor": edge.cursor, "node": node }));
        }

        let page_info = serde_json::to_value(&connection.page_info)
            .map_err(crate::storage::StorageError::from)?;
        Ok(json!({
            "edges": edges,
            "pageInfo": page_info,
            "totalCount": connection.total_count.value(),
        }))
    }

    async fn render_related(
        &self,
        store: &Arc<dyn RecordStore>,
        bound: &BoundType,
        record: &Record,
        attribute: &str,
        children: &Selection,
    ) -> Result<Value, ResolveError> {
        let raw = match record.get(attribute) {
            None | Some(AttributeValue::Null) => return Ok(Value::Null),
            Some(raw) => raw,
        };

        let relationship = self.relationship(bound.record_type().name(), attribute)?;
        let target_name = relationship.target().name();
        let target = self
            .types()
            .get(target_name)
            .ok_or_else(|| SchemaError::UnknownRecordType(target_name.to_string()))?;

        let needs_fetch =
            children.is_empty() || children.names().any(|name| !is_key_field(&target, name));
        trace!(
            "Rendering {}.{} (fetch: {})",
            bound.name(),
            attribute,
            needs_fetch
        );

        match relationship.deserialize(raw, store).await? {
            RelatedValue::One(proxy) => {
                let related = if needs_fetch {
                    proxy.resolve().await?.clone()
                } else {
                    key_record(&target, proxy.key())
                };
                self.render(store, &target, &related, children).await
            }
            RelatedValue::Many(list) => {
                let related: Vec<Record> = if needs_fetch {
                    list.resolve_all().await?.to_vec()
                } else {
                    list.keys().iter().map(|key| key_record(&target, key)).collect()
                };
                let mut items = Vec::with_capacity(related.len());
                for record in &related {
                    items.push(self.render(store, &target, record, children).await?);
                }
                Ok(Value::Array(items))
            }
        }
    }
}

fn scalar_value(bound: &BoundType, record: &Record, field: &GraphField) -> Value {
    match &field.source {
        FieldSource::GlobalId => bound
            .global_id(record)
            .map(Value::String)
            .unwrap_or(Value::Null),
        FieldSource::Attribute(name) => record
            .get(name)
            .map(|value| graph_value(field, value))
            .unwrap_or(Value::Null),
        FieldSource::Relationship(_) => Value::Null,
    }
}

/// Whether a field can be answered from the key alone
fn is_key_field(target: &BoundType, name: &str) -> bool {
    name == target.key_name() || (target.implements_node() && name == target.id_field())
}

fn key_record(target: &BoundType, key: &KeyValue) -> Record {
    Record::new(target.record_type().name()).with(target.key_name(), key.to_attribute_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths() {
        let selection = Selection::parse("name, department.name,department.id,,");
        assert_eq!(selection.names().collect::<Vec<_>>(), vec!["name", "department"]);

        let department = selection.get("department").unwrap();
        assert_eq!(department.names().collect::<Vec<_>>(), vec!["name", "id"]);
        assert!(selection.get("name").unwrap().is_empty());
    }

    #[test]
    fn test_empty_selection() {
        assert!(Selection::parse("").is_empty());
        assert!(Selection::parse(" , ").is_empty());
    }

    #[test]
    fn test_node_fields_unwraps_edges() {
        let selection = Selection::parse("edges.node.id,edges.node.name,edges.cursor");
        let nodes = selection.node_fields();
        assert_eq!(nodes.names().collect::<Vec<_>>(), vec!["id", "name"]);

        let plain = Selection::parse("id");
        assert_eq!(plain.node_fields(), &plain);
    }

    #[test]
    fn test_connection_fields_are_not_node_fields() {
        for spec in ["totalCount", "pageInfo.hasNextPage", "edges.cursor", "totalCount,name"] {
            assert!(Selection::parse(spec).node_fields().is_empty(), "{}", spec);
        }
    }
}

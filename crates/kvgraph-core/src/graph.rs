//! Graph-Layer Type Descriptors
//!
//! The graph-query engine itself is external; this module holds the field,
//! interface and connection descriptors the core produces for it, and renders
//! them as GraphQL SDL so a bound schema can be snapshotted and diffed.

use crate::model::Cardinality;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Built-in scalar types of the graph layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Id,
    String,
    Int,
    Boolean,
    /// Arbitrary JSON, transported as its text
    JsonString,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Id => "ID",
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::Boolean => "Boolean",
            ScalarType::JsonString => "JSONString",
        }
    }
}

/// Type of a graph field (nullability is carried by [`GraphField::required`])
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Scalar(ScalarType),
    /// List of nullable elements
    List(Box<FieldType>),
    /// Reference to another object type by name
    Object(String),
}

impl FieldType {
    pub fn list_of(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    /// The innermost named type
    pub fn named_type(&self) -> &str {
        match self {
            FieldType::Scalar(scalar) => scalar.name(),
            FieldType::List(inner) => inner.named_type(),
            FieldType::Object(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(scalar) => f.write_str(scalar.name()),
            FieldType::List(inner) => write!(f, "[{}]", inner),
            FieldType::Object(name) => f.write_str(name),
        }
    }
}

/// Where a field's value comes from when it is resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldSource {
    /// Value of a stored attribute
    Attribute(String),
    /// Relay global ID built from the record's hash key
    GlobalId,
    /// Proxy (or proxy list) decoded from a relationship attribute
    Relationship(String),
}

/// A field of a graph object type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphField {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: Option<String>,
    pub source: FieldSource,
}

impl GraphField {
    /// A nullable field backed by the attribute of the same name
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            source: FieldSource::Attribute(name.clone()),
            name,
            field_type,
            required: false,
            description: None,
        }
    }

    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar))
    }

    /// A field resolving the related record(s) stored in `attribute`
    pub fn relationship(
        name: impl Into<String>,
        attribute: impl Into<String>,
        target_type: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        let target = FieldType::Object(target_type.into());
        let field_type = match cardinality {
            Cardinality::One => target,
            Cardinality::Many => FieldType::list_of(target),
        };
        Self::new(name, field_type).with_source(FieldSource::Relationship(attribute.into()))
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source(mut self, source: FieldSource) -> Self {
        self.source = source;
        self
    }

    /// Render as an SDL field line (two-space indented)
    pub fn to_sdl(&self) -> String {
        let mut out = String::new();
        if let Some(description) = &self.description {
            out.push_str(&format!("  \"{}\"\n", escape_description(description)));
        }
        out.push_str(&format!(
            "  {}: {}{}",
            self.name,
            self.field_type,
            if self.required { "!" } else { "" }
        ));
        out
    }
}

fn escape_description(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Interfaces a bound type may implement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Interface {
    /// Relay `Node`: contributes a mandatory `id: ID!` field
    Node,
    /// Any other interface with its own fields
    Custom { name: String, fields: Vec<GraphField> },
}

impl Interface {
    pub fn name(&self) -> &str {
        match self {
            Interface::Node => "Node",
            Interface::Custom { name, .. } => name,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Interface::Node)
    }

    /// Fields this interface contributes to an implementing type
    pub fn fields(&self, id_field: &str) -> Vec<GraphField> {
        match self {
            Interface::Node => vec![node_id_field(id_field)],
            Interface::Custom { fields, .. } => fields.clone(),
        }
    }
}

/// The `id: ID!` field of the `Node` interface
pub fn node_id_field(name: &str) -> GraphField {
    GraphField::scalar(name, ScalarType::Id)
        .required(true)
        .with_description("The ID of the object")
        .with_source(FieldSource::GlobalId)
}

/// A connection type paginating one node type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionType {
    pub name: String,
    pub node_type: String,
    /// Fields beyond `pageInfo` and `edges`
    pub extra_fields: Vec<GraphField>,
}

impl ConnectionType {
    /// A plain connection without extra fields
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            extra_fields: Vec::new(),
        }
    }

    /// The `{Type}Connection` derived for a bound type, with `totalCount`
    pub fn derive(node_type: &str) -> Self {
        let mut connection = Self::new(format!("{}Connection", node_type), node_type);
        connection
            .extra_fields
            .push(GraphField::scalar("totalCount", ScalarType::Int));
        connection
    }

    pub fn has_total_count(&self) -> bool {
        self.extra_fields.iter().any(|f| f.name == "totalCount")
    }

    /// Name of the edge type (`FooConnection` has edges `FooEdge`)
    pub fn edge_name(&self) -> String {
        let base = self.name.strip_suffix("Connection").unwrap_or(&self.name);
        format!("{}Edge", base)
    }

    /// Render the connection and edge types as SDL
    pub fn to_sdl(&self) -> String {
        let mut fields = vec![
            "  \"Pagination data for this connection.\"\n  pageInfo: PageInfo!".to_string(),
            format!(
                "  \"Contains the nodes in this connection.\"\n  edges: [{}]!",
                self.edge_name()
            ),
        ];
        fields.extend(self.extra_fields.iter().map(GraphField::to_sdl));

        format!(
            "type {} {{\n{}\n}}\n\ntype {} {{\n  \"The item at the end of the edge\"\n  node: {}\n  \"A cursor for use in pagination\"\n  cursor: String!\n}}\n",
            self.name,
            fields.join("\n"),
            self.edge_name(),
            self.node_type
        )
    }
}

/// SDL of the relay `Node` interface
pub const NODE_INTERFACE_SDL: &str = r#"interface Node {
  "The ID of the object"
  id: ID!
}
"#;

/// SDL of the relay `PageInfo` type
pub const PAGE_INFO_SDL: &str = r#"type PageInfo {
  hasNextPage: Boolean!
  hasPreviousPage: Boolean!
  startCursor: String
  endCursor: String
}
"#;

static TYPE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("valid type name regex"));

/// Whether `name` is usable as a graph type name
pub fn is_valid_type_name(name: &str) -> bool {
    TYPE_NAME_RE.is_match(name) && !name.starts_with("__")
}

/// Render an object type as SDL
pub fn object_sdl(name: &str, interfaces: &[Interface], fields: &[GraphField]) -> String {
    let implements = if interfaces.is_empty() {
        String::new()
    } else {
        let names: Vec<&str> = interfaces.iter().map(Interface::name).collect();
        format!(" implements {}", names.join(" & "))
    };
    let body: Vec<String> = fields.iter().map(GraphField::to_sdl).collect();
    format!("type {}{} {{\n{}\n}}\n", name, implements, body.join("\n"))
}

//! kvgraph Core - graph projection of key-value record stores
//!
//! This crate turns record types stored in a key-value/table store into graph
//! object types, and answers graph queries against the store:
//! - Attribute conversion from storage kinds to graph field types
//! - Lazy relationship proxies that fetch related records on demand
//! - Batched, order-preserving resolution of list relationships
//! - Opaque pagination cursors built from record keys
//! - Relay-style nodes, global IDs and connections

pub mod binder;
pub mod connection;
pub mod convert;
pub mod cursor;
pub mod error;
pub mod graph;
pub mod model;
pub mod projector;
pub mod registry;
pub mod relationship;
pub mod relay;
pub mod selection;
pub mod storage;

// Model re-exports
pub use model::{
    AttributeDescriptor, AttributeKind, AttributeValue, Cardinality, DefaultValue, Discriminator,
    KeyValue, PrimaryKey, Record, RecordType, RelationshipDescriptor,
};

// Error re-exports
pub use error::{ResolveError, SchemaError};

// Schema construction re-exports
pub use binder::{BindOptions, BoundType, Candidate, TypeBinder};
pub use convert::AttributeConverter;
pub use graph::{ConnectionType, FieldSource, FieldType, GraphField, Interface, ScalarType};
pub use projector::FieldProjector;
pub use registry::{KeyRegistry, ModelRegistry, SchemaContext, TypeRegistry};

// Query answering re-exports
pub use connection::{ConnectionField, PageLimits, PageRequest};
pub use cursor::CursorCodec;
pub use relationship::{LazyRecord, LazyRecordList, RelatedValue, Relationship};
pub use relay::{from_global_id, to_global_id, Connection, Edge, PageInfo, TotalCount};
pub use selection::{SelectedField, Selection};

// Storage re-exports
pub use storage::{
    MemoryStore, RecordStore, ScanFilter, ScanPage, ScanRequest, SqliteStore, StorageError,
    StoreMetrics, ValueSerializer,
};

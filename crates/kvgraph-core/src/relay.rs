//! Relay conventions: global IDs and connection pages.

use crate::model::Record;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;

/// Encode `type_name` and `id` as an opaque global ID
pub fn to_global_id(type_name: &str, id: &str) -> String {
    BASE64.encode(format!("{}:{}", type_name, id))
}

/// Split a global ID into type name and id
///
/// Returns `None` when the input is not base64, not UTF-8, or has no `:`.
/// Only the first `:` separates; the id may contain further colons.
pub fn from_global_id(global_id: &str) -> Option<(String, String)> {
    let bytes = BASE64.decode(global_id).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (type_name, id) = text.split_once(':')?;
    Some((type_name.to_string(), id.to_string()))
}

/// Pagination state of a connection page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// A node plus the cursor pointing at it
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub cursor: String,
    pub node: Record,
}

/// Total item count reported by a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalCount {
    /// Count reported by the store for the whole table
    Exact(usize),
    /// Fallback: number of edges on this page
    Approximate(usize),
}

impl TotalCount {
    pub fn value(&self) -> usize {
        match self {
            TotalCount::Exact(n) | TotalCount::Approximate(n) => *n,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, TotalCount::Exact(_))
    }
}

/// One resolved page of a connection field
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
    pub total_count: TotalCount,
}

impl Connection {
    /// Nodes in page order
    pub fn nodes(&self) -> impl Iterator<Item = &Record> {
        self.edges.iter().map(|edge| &edge.node)
    }
}

//! Connection Fields
//!
//! A connection field lists the records of one bound type a page at a time.
//! Each call is a single store scan that resumes after the record the `after`
//! cursor points at.

use crate::binder::BoundType;
use crate::cursor::CursorCodec;
use crate::error::ResolveError;
use crate::relay::{Connection, Edge, PageInfo, TotalCount};
use crate::storage::{RecordStore, ScanFilter, ScanRequest};
use std::sync::Arc;
use tracing::warn;

/// Default number of edges per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size bounds of connection fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Arguments of a connection field
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub first: Option<usize>,
    pub after: Option<String>,
    pub filter: ScanFilter,
}

impl PageRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first(mut self, first: usize) -> Self {
        self.first = Some(first);
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn filter(mut self, filter: ScanFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Paginated listing of one bound type
#[derive(Debug, Clone)]
pub struct ConnectionField {
    bound: Arc<BoundType>,
    codec: CursorCodec,
    limits: PageLimits,
}

impl ConnectionField {
    pub fn new(bound: Arc<BoundType>, codec: CursorCodec) -> Self {
        Self {
            bound,
            codec,
            limits: PageLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn bound_type(&self) -> &Arc<BoundType> {
        &self.bound
    }

    /// Resolve one page
    pub async fn resolve(
        &self,
        store: &dyn RecordStore,
        request: &PageRequest,
    ) -> Result<Connection, ResolveError> {
        let record_type = self.bound.record_type();
        let page_size = self.page_size(request.first)?;

        let start = request
            .after
            .as_deref()
            .map(|cursor| self.codec.decode_for(record_type, cursor, store))
            .transpose()?;

        let mut scan = ScanRequest::new()
            .limit(page_size)
            .filter(request.filter.clone());
        if let Some(start) = start {
            scan = scan.after(start);
        }
        let page = store.scan(record_type, &scan).await?;

        let edges = page
            .records
            .into_iter()
            .map(|node| {
                let cursor = self.codec.encode(record_type, &node, store)?;
                Ok(Edge { cursor, node })
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;

        let has_next_page = page.last_evaluated_key.is_some();
        let page_info = PageInfo {
            has_next_page,
            has_previous_page: request.after.is_some(),
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: if has_next_page {
                edges.last().map(|e| e.cursor.clone())
            } else {
                None
            },
        };

        let total_count = match page.table_count {
            Some(count) => TotalCount::Exact(count),
            None => {
                warn!(
                    "No table count for {}; reporting page size",
                    record_type.name()
                );
                TotalCount::Approximate(edges.len())
            }
        };

        Ok(Connection {
            edges,
            page_info,
            total_count,
        })
    }

    fn page_size(&self, first: Option<usize>) -> Result<usize, ResolveError> {
        match first {
            Some(0) => Err(ResolveError::InvalidPageSize {
                requested: 0,
                max: self.limits.max_page_size,
            }),
            Some(n) if n > self.limits.max_page_size => {
                warn!(
                    "Page size {} exceeds the maximum of {}; clamping",
                    n, self.limits.max_page_size
                );
                Ok(self.limits.max_page_size)
            }
            Some(n) => Ok(n),
            None => Ok(self.limits.default_page_size),
        }
    }
}

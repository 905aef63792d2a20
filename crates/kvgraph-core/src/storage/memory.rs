//! In-Memory Record Store
//!
//! Tables are ordered maps from primary key to record, guarded by a
//! `parking_lot::RwLock`. Every fetch is counted in [`StoreMetrics`], which is
//! what the relationship tests use to prove that proxies stay lazy.

use super::{
    matches_discriminator, prepare_record, RecordStore, ScanPage, ScanRequest, StorageError,
    ValueSerializer,
};
use crate::model::{PrimaryKey, Record, RecordType};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::time::Duration;
use tracing::{debug, trace};

type Table = BTreeMap<PrimaryKey, Record>;

/// Fetch counters for a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Number of point fetches
    pub gets: u64,
    /// Number of batch fetches
    pub batch_gets: u64,
    /// Total keys requested across batch fetches
    pub batch_keys: u64,
    /// Number of range scans
    pub scans: u64,
    /// Number of puts
    pub puts: u64,
}

impl StoreMetrics {
    /// Total fetch calls of any kind
    pub fn fetches(&self) -> u64 {
        self.gets + self.batch_gets + self.scans
    }
}

/// Record store keeping every table in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    metrics: Mutex<StoreMetrics>,
    /// Artificial delay applied to fetches (for cancellation tests)
    latency: Option<Duration>,
    /// Return batch results in reverse request order
    reverse_batches: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Return `batch_get` results in reverse request order, like a store that
    /// gives no ordering guarantee
    pub fn with_reversed_batches(mut self) -> Self {
        self.reverse_batches = true;
        self
    }

    /// Snapshot of the fetch counters
    pub fn metrics(&self) -> StoreMetrics {
        self.metrics.lock().clone()
    }

    /// Reset the fetch counters
    pub fn reset_metrics(&self) {
        *self.metrics.lock() = StoreMetrics::default();
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn lookup(&self, record_type: &RecordType, key: &PrimaryKey) -> Result<Option<Record>, StorageError> {
        let tables = self.tables.read();
        let table = tables
            .get(record_type.table_name())
            .ok_or_else(|| StorageError::TableNotFound(record_type.table_name().to_string()))?;
        Ok(table
            .get(key)
            .filter(|record| matches_discriminator(record_type, record))
            .map(|record| record.clone().with_record_type(record_type.name())))
    }
}

impl ValueSerializer for MemoryStore {}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_table(&self, record_type: &RecordType) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        if !tables.contains_key(record_type.table_name()) {
            debug!("Creating in-memory table {}", record_type.table_name());
            tables.insert(record_type.table_name().to_string(), Table::new());
        }
        Ok(())
    }

    async fn delete_table(&self, record_type: &RecordType) -> Result<(), StorageError> {
        self.tables
            .write()
            .remove(record_type.table_name())
            .map(|_| ())
            .ok_or_else(|| StorageError::TableNotFound(record_type.table_name().to_string()))
    }

    async fn table_exists(&self, record_type: &RecordType) -> Result<bool, StorageError> {
        Ok(self.tables.read().contains_key(record_type.table_name()))
    }

    async fn get(
        &self,
        record_type: &RecordType,
        key: &PrimaryKey,
    ) -> Result<Option<Record>, StorageError> {
        self.metrics.lock().gets += 1;
        self.simulate_latency().await;
        trace!("get {} {}", record_type.name(), key);
        self.lookup(record_type, key)
    }

    async fn batch_get(
        &self,
        record_type: &RecordType,
        keys: &[PrimaryKey],
    ) -> Result<Vec<Record>, StorageError> {
        {
            let mut metrics = self.metrics.lock();
            metrics.batch_gets += 1;
            metrics.batch_keys += keys.len() as u64;
        }
        self.simulate_latency().await;
        trace!("batch_get {} ({} keys)", record_type.name(), keys.len());

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.lookup(record_type, key)? {
                records.push(record);
            }
        }
        if self.reverse_batches {
            records.reverse();
        }
        Ok(records)
    }

    async fn put(&self, record_type: &RecordType, record: &Record) -> Result<(), StorageError> {
        let (key, record) = prepare_record(record_type, record)?;
        self.metrics.lock().puts += 1;

        let mut tables = self.tables.write();
        let table = tables
            .get_mut(record_type.table_name())
            .ok_or_else(|| StorageError::TableNotFound(record_type.table_name().to_string()))?;
        table.insert(key, record);
        Ok(())
    }

    async fn scan(
        &self,
        record_type: &RecordType,
        request: &ScanRequest,
    ) -> Result<ScanPage, StorageError> {
        self.metrics.lock().scans += 1;
        self.simulate_latency().await;

        let tables = self.tables.read();
        let table = tables
            .get(record_type.table_name())
            .ok_or_else(|| StorageError::TableNotFound(record_type.table_name().to_string()))?;

        let lower = match &request.exclusive_start_key {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let limit = request.limit.unwrap_or(usize::MAX);

        let matched = table
            .range((lower, Bound::Unbounded))
            .filter(|(_, record)| matches_discriminator(record_type, record))
            .filter(|(_, record)| request.filter.matches(record));

        let mut records = Vec::new();
        let mut last_evaluated_key = None;
        let mut has_more = false;
        for (key, record) in matched {
            if records.len() == limit {
                has_more = true;
                break;
            }
            records.push(record.clone().with_record_type(record_type.name()));
            last_evaluated_key = Some(key.clone());
        }
        // Only report a resume key when something is left to read
        if !has_more {
            last_evaluated_key = None;
        }

        let table_count = request.filter.is_empty().then(|| {
            table
                .values()
                .filter(|record| matches_discriminator(record_type, record))
                .count()
        });

        debug!(
            "scan {} returned {} records (more: {})",
            record_type.name(),
            records.len(),
            has_more
        );

        Ok(ScanPage {
            records,
            last_evaluated_key,
            table_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeDescriptor;
    use crate::storage::ScanFilter;

    fn department() -> RecordType {
        RecordType::new("Department", "departments")
            .attribute(AttributeDescriptor::string("id").hash_key())
            .attribute(AttributeDescriptor::string("name"))
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let rt = department();
        store.create_table(&rt).await.unwrap();
        for (id, name) in [("d1", "Engineering"), ("d2", "Human Resources"), ("d3", "Sales")] {
            store
                .put(&rt, &Record::new("Department").with("id", id).with("name", name))
                .await
                .unwrap();
        }
        store.reset_metrics();
        store
    }

    #[tokio::test]
    async fn test_get_and_metrics() {
        let store = seeded().await;
        let rt = department();

        let record = store.get(&rt, &PrimaryKey::hash("d1")).await.unwrap().unwrap();
        assert_eq!(record.get("name").and_then(|v| v.as_str()), Some("Engineering"));
        assert!(store.get(&rt, &PrimaryKey::hash("zz")).await.unwrap().is_none());
        assert_eq!(store.metrics().gets, 2);
    }

    #[tokio::test]
    async fn test_batch_get_omits_missing() {
        let store = seeded().await;
        let keys = vec![PrimaryKey::hash("d2"), PrimaryKey::hash("d9"), PrimaryKey::hash("d1")];
        let records = store.batch_get(&department(), &keys).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(store.metrics().batch_gets, 1);
        assert_eq!(store.metrics().batch_keys, 3);
    }

    #[tokio::test]
    async fn test_reversed_batches() {
        let store = MemoryStore::new().with_reversed_batches();
        let rt = department();
        store.create_table(&rt).await.unwrap();
        for id in ["d1", "d2"] {
            store
                .put(&rt, &Record::new("Department").with("id", id).with("name", id))
                .await
                .unwrap();
        }

        let keys = vec![PrimaryKey::hash("d1"), PrimaryKey::hash("d2")];
        let ids: Vec<_> = store
            .batch_get(&rt, &keys)
            .await
            .unwrap()
            .iter()
            .map(|r| r.get("id").and_then(|v| v.as_str()).unwrap().to_string())
            .collect();
        assert_eq!(ids, ["d2", "d1"]);
    }

    #[tokio::test]
    async fn test_scan_pages_in_key_order() {
        let store = seeded().await;
        let rt = department();

        let page = store.scan(&rt, &ScanRequest::new().limit(2)).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.last_evaluated_key, Some(PrimaryKey::hash("d2")));
        assert_eq!(page.table_count, Some(3));

        let page = store
            .scan(&rt, &ScanRequest::new().limit(2).after(PrimaryKey::hash("d2")))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn test_scan_with_filter_has_no_table_count() {
        let store = seeded().await;
        let page = store
            .scan(
                &department(),
                &ScanRequest::new().filter(ScanFilter::new().eq("name", "Sales")),
            )
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.table_count, None);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let store = MemoryStore::new();
        let err = store.get(&department(), &PrimaryKey::hash("d1")).await.unwrap_err();
        assert!(matches!(err, StorageError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_variants_share_table() {
        let store = MemoryStore::new();
        let base = RecordType::new("Employee", "employees")
            .attribute(AttributeDescriptor::string("id").hash_key())
            .discriminated_by("cls");
        let salaried = base.variant("SalaryEmployee", "SalaryEmployee");
        let hourly = base.variant("HourlyEmployee", "HourlyEmployee");

        store.create_table(&base).await.unwrap();
        store.put(&salaried, &salaried.new_record().with("id", "e1")).await.unwrap();
        store.put(&hourly, &hourly.new_record().with("id", "e2")).await.unwrap();

        assert!(store.get(&salaried, &PrimaryKey::hash("e2")).await.unwrap().is_none());
        let e2 = store.get(&base, &PrimaryKey::hash("e2")).await.unwrap().unwrap();
        assert_eq!(e2.record_type(), "Employee");

        let page = store.scan(&hourly, &ScanRequest::new()).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.table_count, Some(1));
        assert_eq!(store.scan(&base, &ScanRequest::new()).await.unwrap().table_count, Some(2));
    }
}

//! SQLite Record Store
//!
//! Each record-type table maps to one SQLite table (see [`super::schema`]). The
//! attribute map is stored as typed JSON in `item_json`; key columns and the
//! discriminator are duplicated into their own columns so that point fetches,
//! ordered scans and variant filtering run in SQL.
//!
//! The connection is shared behind a `parking_lot::Mutex`; every operation holds
//! the lock only for the duration of its statements.

use super::codec;
use super::schema::{
    create_table_sql, drop_table_sql, is_valid_table_name, ITEM_COLUMNS, SCHEMA_CREATE_METADATA,
    STORE_SCHEMA_VERSION,
};
use super::{
    matches_discriminator, prepare_record, RecordStore, ScanPage, ScanRequest, StorageError,
    ValueSerializer,
};
use crate::model::{AttributeValue, KeyValue, PrimaryKey, Record, RecordType};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Record store backed by a single SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        conn.execute(SCHEMA_CREATE_METADATA, [])?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };

        match store.get_metadata("schema_version")? {
            Some(version) if version == STORE_SCHEMA_VERSION => {}
            Some(version) => {
                return Err(StorageError::SchemaVersionMismatch {
                    expected: STORE_SCHEMA_VERSION.to_string(),
                    found: version,
                });
            }
            None => store.set_metadata("schema_version", STORE_SCHEMA_VERSION)?,
        }

        info!("Opened record store at {}", path.display());
        Ok(store)
    }

    /// Create a private in-memory database
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        conn.execute(SCHEMA_CREATE_METADATA, [])?;

        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.set_metadata("schema_version", STORE_SCHEMA_VERSION)?;
        Ok(store)
    }

    fn configure_connection(conn: &Connection) -> SqliteResult<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "cache_size", -64000)?; // 64MB
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "mmap_size", 268435456)?; // 256MB
        Ok(())
    }

    /// Path of the database file (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM kvgraph_metadata WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO kvgraph_metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Names of every record table in the database
    pub fn table_names(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'kvgraph_%' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(names)
    }

    fn table_name(record_type: &RecordType) -> Result<&str, StorageError> {
        let table = record_type.table_name();
        if is_valid_table_name(table) {
            Ok(table)
        } else {
            Err(StorageError::InvalidTableName(table.to_string()))
        }
    }

    fn ensure_table(conn: &Connection, table: &str) -> Result<(), StorageError> {
        if Self::table_present(conn, table)? {
            Ok(())
        } else {
            Err(StorageError::TableNotFound(table.to_string()))
        }
    }

    fn table_present(conn: &Connection, table: &str) -> Result<bool, StorageError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Decode a stored item through the record type's declarations
    fn decode_item(&self, record_type: &RecordType, item_json: &str) -> Result<Record, StorageError> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(item_json)?;
        let mut record = Record::new(record_type.name());
        for (name, value) in &raw {
            let value = self.deserialize_value(record_type.get_attribute(name), value)?;
            record.set(name.clone(), value);
        }
        Ok(record)
    }

    /// Encode a record, checking declared attributes against their kinds
    fn encode_item(&self, record_type: &RecordType, record: &Record) -> Result<String, StorageError> {
        let mut item = serde_json::Map::new();
        for (name, value) in record.attributes() {
            let encoded = match record_type.get_attribute(name) {
                Some(attr) => self.serialize_value(attr, value)?,
                None => codec::serialize_value(value),
            };
            item.insert(name.clone(), encoded);
        }
        Ok(serde_json::to_string(&item)?)
    }

    fn fetch_one(
        &self,
        conn: &Connection,
        table: &str,
        record_type: &RecordType,
        key: &PrimaryKey,
    ) -> Result<Option<Record>, StorageError> {
        let sql = format!(
            r#"SELECT {ITEM_COLUMNS} FROM "{table}" WHERE hash_key = ?1 AND range_key = ?2"#
        );
        let item: Option<String> = conn
            .query_row(
                &sql,
                params![key_param(&key.hash), range_param(key)],
                |row| row.get(3),
            )
            .optional()?;

        match item {
            Some(item) => {
                let record = self.decode_item(record_type, &item)?;
                Ok(matches_discriminator(record_type, &record).then_some(record))
            }
            None => Ok(None),
        }
    }
}

fn key_param(key: &KeyValue) -> SqlValue {
    match key {
        KeyValue::Num(n) => SqlValue::Integer(*n),
        KeyValue::Str(s) => SqlValue::Text(s.clone()),
    }
}

fn range_param(key: &PrimaryKey) -> SqlValue {
    key.range
        .as_ref()
        .map(key_param)
        .unwrap_or_else(|| SqlValue::Text(String::new()))
}

fn discriminator_param(record_type: &RecordType) -> SqlValue {
    match record_type.discriminator() {
        Some(d) => SqlValue::Text(d.value.clone()),
        None => SqlValue::Null,
    }
}

impl ValueSerializer for SqliteStore {}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create_table(&self, record_type: &RecordType) -> Result<(), StorageError> {
        let table = Self::table_name(record_type)?;
        debug!("Creating SQLite table {}", table);
        self.conn.lock().execute_batch(&create_table_sql(table))?;
        Ok(())
    }

    async fn delete_table(&self, record_type: &RecordType) -> Result<(), StorageError> {
        let table = Self::table_name(record_type)?;
        let conn = self.conn.lock();
        Self::ensure_table(&conn, table)?;
        conn.execute_batch(&drop_table_sql(table))?;
        Ok(())
    }

    async fn table_exists(&self, record_type: &RecordType) -> Result<bool, StorageError> {
        let table = Self::table_name(record_type)?;
        Self::table_present(&self.conn.lock(), table)
    }

    async fn get(
        &self,
        record_type: &RecordType,
        key: &PrimaryKey,
    ) -> Result<Option<Record>, StorageError> {
        let table = Self::table_name(record_type)?;
        trace!("get {} {}", record_type.name(), key);
        let conn = self.conn.lock();
        Self::ensure_table(&conn, table)?;
        self.fetch_one(&conn, table, record_type, key)
    }

    async fn batch_get(
        &self,
        record_type: &RecordType,
        keys: &[PrimaryKey],
    ) -> Result<Vec<Record>, StorageError> {
        let table = Self::table_name(record_type)?;
        trace!("batch_get {} ({} keys)", record_type.name(), keys.len());
        let conn = self.conn.lock();
        Self::ensure_table(&conn, table)?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.fetch_one(&conn, table, record_type, key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn put(&self, record_type: &RecordType, record: &Record) -> Result<(), StorageError> {
        let table = Self::table_name(record_type)?;
        let (key, record) = prepare_record(record_type, record)?;
        let item_json = self.encode_item(record_type, &record)?;
        let discriminator = record_type
            .discriminator_attribute()
            .and_then(|attr| record.get(attr))
            .and_then(AttributeValue::as_str)
            .map(str::to_string);

        let conn = self.conn.lock();
        Self::ensure_table(&conn, table)?;
        conn.execute(
            &format!(r#"INSERT OR REPLACE INTO "{table}" ({ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"#),
            params![key_param(&key.hash), range_param(&key), discriminator, item_json],
        )?;
        Ok(())
    }

    async fn scan(
        &self,
        record_type: &RecordType,
        request: &ScanRequest,
    ) -> Result<ScanPage, StorageError> {
        let table = Self::table_name(record_type)?;
        let conn = self.conn.lock();
        Self::ensure_table(&conn, table)?;

        let mut sql = format!(
            r#"SELECT {ITEM_COLUMNS} FROM "{table}" WHERE (?1 IS NULL OR discriminator = ?1)"#
        );
        let mut args = vec![discriminator_param(record_type)];
        if let Some(start) = &request.exclusive_start_key {
            sql.push_str(" AND (hash_key, range_key) > (?2, ?3)");
            args.push(key_param(&start.hash));
            args.push(range_param(start));
        }
        sql.push_str(" ORDER BY hash_key, range_key");

        let limit = request.limit.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        let mut has_more = false;
        {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(args))?;
            while let Some(row) = rows.next()? {
                let item: String = row.get(3)?;
                let record = self.decode_item(record_type, &item)?;
                if !request.filter.matches(&record) {
                    continue;
                }
                if records.len() == limit {
                    has_more = true;
                    break;
                }
                records.push(record);
            }
        }

        let last_evaluated_key = if has_more {
            records.last().and_then(|r| record_type.key_of(r))
        } else {
            None
        };

        let table_count = if request.filter.is_empty() {
            let count: i64 = conn.query_row(
                &format!(
                    r#"SELECT COUNT(*) FROM "{table}" WHERE (?1 IS NULL OR discriminator = ?1)"#
                ),
                [discriminator_param(record_type)],
                |row| row.get(0),
            )?;
            Some(count as usize)
        } else {
            None
        };

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
    use crate::model::{AttributeDescriptor, RelationshipDescriptor};
    use crate::storage::ScanFilter;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn employee() -> RecordType {
        RecordType::new("Employee", "employees")
            .attribute(AttributeDescriptor::string("id").hash_key())
            .attribute(AttributeDescriptor::string("name"))
            .attribute(AttributeDescriptor::datetime("hired_on").nullable())
            .attribute(AttributeDescriptor::relationship(
                "department",
                RelationshipDescriptor::one("Department"),
            ))
            .discriminated_by("cls")
    }

    fn pets() -> RecordType {
        RecordType::new("Pet", "pets")
            .attribute(AttributeDescriptor::number("id").hash_key())
            .attribute(AttributeDescriptor::string("name"))
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteStore::in_memory().unwrap();
        let rt = employee();
        store.create_table(&rt).await.unwrap();

        let hired = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let record = rt
            .new_record()
            .with("id", "e1")
            .with("name", "Peter")
            .with("department", "d1")
            .with("hired_on", AttributeValue::DateTime(hired));
        store.put(&rt, &record).await.unwrap();

        let loaded = store.get(&rt, &PrimaryKey::hash("e1")).await.unwrap().unwrap();
        assert_eq!(loaded.get("name"), Some(&AttributeValue::from("Peter")));
        assert_eq!(loaded.get("hired_on"), Some(&AttributeValue::DateTime(hired)));
        assert!(store.get(&rt, &PrimaryKey::hash("e9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_kind_mismatch() {
        let store = SqliteStore::in_memory().unwrap();
        let rt = pets();
        store.create_table(&rt).await.unwrap();

        let bad = Record::new("Pet").with("id", 1).with("name", 42);
        let err = store.put(&rt, &bad).await.unwrap_err();
        assert!(matches!(err, StorageError::Codec(_)));
    }

    #[tokio::test]
    async fn test_numeric_keys_scan_in_order() {
        let store = SqliteStore::in_memory().unwrap();
        let rt = pets();
        store.create_table(&rt).await.unwrap();
        for (id, name) in [(10, "Rex"), (2, "Tom"), (7, "Kit")] {
            store
                .put(&rt, &Record::new("Pet").with("id", id).with("name", name))
                .await
                .unwrap();
        }

        let page = store.scan(&rt, &ScanRequest::new().limit(2)).await.unwrap();
        let names: Vec<_> = page
            .records
            .iter()
            .filter_map(|r| r.get("name").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(names, vec!["Tom", "Kit"]);
        assert_eq!(page.last_evaluated_key, Some(PrimaryKey::hash(7)));
        assert_eq!(page.table_count, Some(3));

        let rest = store
            .scan(&rt, &ScanRequest::new().limit(2).after(PrimaryKey::hash(7)))
            .await
            .unwrap();
        assert_eq!(rest.records.len(), 1);
        assert_eq!(rest.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn test_filtered_scan() {
        let store = SqliteStore::in_memory().unwrap();
        let rt = pets();
        store.create_table(&rt).await.unwrap();
        for (id, name) in [(1, "Rex"), (2, "Tom"), (3, "Rex")] {
            store
                .put(&rt, &Record::new("Pet").with("id", id).with("name", name))
                .await
                .unwrap();
        }

        let page = store
            .scan(&rt, &ScanRequest::new().filter(ScanFilter::new().eq("name", "Rex")))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.table_count, None);
    }

    #[tokio::test]
    async fn test_variants_filtered_by_discriminator() {
        let store = SqliteStore::in_memory().unwrap();
        let base = employee();
        let salaried = base.variant("SalaryEmployee", "SalaryEmployee");
        let hourly = base.variant("HourlyEmployee", "HourlyEmployee");
        store.create_table(&base).await.unwrap();

        for (rt, id) in [(&salaried, "e1"), (&hourly, "e2"), (&hourly, "e3")] {
            let record = rt.new_record().with("id", id).with("name", id);
            store.put(rt, &record).await.unwrap();
        }

        assert!(store.get(&salaried, &PrimaryKey::hash("e2")).await.unwrap().is_none());
        let keys = vec![PrimaryKey::hash("e1"), PrimaryKey::hash("e2")];
        assert_eq!(store.batch_get(&hourly, &keys).await.unwrap().len(), 1);

        let page = store.scan(&hourly, &ScanRequest::new()).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.table_count, Some(2));
        assert_eq!(store.scan(&base, &ScanRequest::new()).await.unwrap().table_count, Some(3));
    }

    #[tokio::test]
    async fn test_missing_and_invalid_tables() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.get(&pets(), &PrimaryKey::hash(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::TableNotFound(_)));

        let bad = RecordType::new("Bad", "bad table")
            .attribute(AttributeDescriptor::string("id").hash_key());
        let err = store.create_table(&bad).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidTableName(_)));
    }

    #[tokio::test]
    async fn test_reopen_file_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("kvgraph.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_table(&pets()).await.unwrap();
            store
                .put(&pets(), &Record::new("Pet").with("id", 1).with("name", "Rex"))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.table_names().unwrap(), vec!["pets".to_string()]);
        assert_eq!(
            store.get_metadata("schema_version").unwrap().as_deref(),
            Some(STORE_SCHEMA_VERSION)
        );
        assert!(store.get(&pets(), &PrimaryKey::hash(1)).await.unwrap().is_some());
    }

    #[test]
    fn test_schema_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kvgraph.db");
        SqliteStore::open(&path)
            .unwrap()
            .set_metadata("schema_version", "0.1")
            .unwrap();

        assert!(matches!(
            SqliteStore::open(&path),
            Err(StorageError::SchemaVersionMismatch { .. })
        ));
    }
}

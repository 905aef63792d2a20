//! SQLite Schema Definitions for Record Storage
//!
//! Every record-type table becomes one SQLite table holding the key columns and
//! the typed JSON item. Variants of a shared table use the same SQLite table and
//! are told apart by the `discriminator` column.

use once_cell::sync::Lazy;
use regex::Regex;

/// Schema version for record databases
pub const STORE_SCHEMA_VERSION: &str = "1.0";

/// SQL to create the metadata table
pub const SCHEMA_CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS kvgraph_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

/// Column names for item queries (in order for row mapping)
pub const ITEM_COLUMNS: &str = "hash_key, range_key, discriminator, item_json";

/// Table names must be plain identifiers; they are interpolated into SQL.
static TABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table name regex"));

/// Whether `name` can be used as a record table name
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME_RE.is_match(name) && !name.starts_with("kvgraph_") && !name.starts_with("sqlite_")
}

/// SQL to create the table for one record-type table
///
/// Key columns carry no type affinity, so integer keys stay integers and sort
/// numerically (and before text keys). `range_key` is `''` for hash-only tables.
pub fn create_table_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    -- Primary key components
    hash_key NOT NULL,
    range_key NOT NULL DEFAULT '',

    -- Variant name for shared tables
    discriminator TEXT,

    -- Attribute map in typed JSON form
    item_json TEXT NOT NULL,

    PRIMARY KEY (hash_key, range_key)
);
CREATE INDEX IF NOT EXISTS "idx_{table}_discriminator" ON "{table}"(discriminator);
"#
    )
}

/// SQL to drop the table for one record-type table
pub fn drop_table_sql(table: &str) -> String {
    format!(r#"DROP TABLE IF EXISTS "{table}""#)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("departments"));
        assert!(is_valid_table_name("flask_example_employee"));
        assert!(!is_valid_table_name("drop table x"));
        assert!(!is_valid_table_name("1abc"));
        assert!(!is_valid_table_name("kvgraph_metadata"));
    }

    #[test]
    fn test_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(SCHEMA_CREATE_METADATA, []).unwrap();
        conn.execute_batch(&create_table_sql("departments")).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"departments".to_string()));
        assert!(tables.contains(&"kvgraph_metadata".to_string()));
    }

    #[test]
    fn test_keys_without_affinity_sort_numerically() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&create_table_sql("pets")).unwrap();
        for key in [10i64, 9, 100] {
            conn.execute(
                "INSERT INTO pets (hash_key, item_json) VALUES (?1, '{}')",
                [key],
            )
            .unwrap();
        }

        let keys: Vec<i64> = conn
            .prepare("SELECT hash_key FROM pets ORDER BY hash_key")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(keys, vec![9, 10, 100]);
    }
}

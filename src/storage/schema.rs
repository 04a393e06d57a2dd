//! Table schema for the SQLite record store
//!
//! The column set mirrors the remote table: `id` is the conflict key and
//! every other column is overwritten on upsert.

use crate::config::is_valid_table_name;
use crate::storage::traits::{StorageError, StorageResult};
use rusqlite::Connection;

/// Returns the `CREATE TABLE` statement for a record table
pub fn table_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    facility_type TEXT NOT NULL,
    address TEXT NOT NULL,
    canonical_addr TEXT NOT NULL,
    available_dates TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_canonical_addr ON {table}(canonical_addr);
CREATE INDEX IF NOT EXISTS idx_{table}_facility_type ON {table}(facility_type);
"#
    )
}

/// Returns the upsert statement for a record table
pub fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} \
         (id, title, facility_type, address, canonical_addr, available_dates, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT(id) DO UPDATE SET \
         title = excluded.title, \
         facility_type = excluded.facility_type, \
         address = excluded.address, \
         canonical_addr = excluded.canonical_addr, \
         available_dates = excluded.available_dates, \
         last_updated = excluded.last_updated"
    )
}

/// Initializes the record table
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `table` - Table name; must be a plain identifier
pub fn initialize_schema(conn: &Connection, table: &str) -> StorageResult<()> {
    if !is_valid_table_name(table) {
        return Err(StorageError::InvalidTable(table.to_string()));
    }
    conn.execute_batch(&table_sql(table))?;
    Ok(())
}

//! SQLite record store
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::record::{ItemId, Record};
use crate::storage::schema::{initialize_schema, upsert_sql};
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
    table: String,
    location: String,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `table` - Name of the record table
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path, table: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn, table)?;

        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
            location: path.display().to_string(),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory(table: &str) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn, table)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
            location: ":memory:".to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Lock)
    }

    /// Writes one record, replacing any row with the same id
    pub fn upsert_record(&self, record: &Record) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            &upsert_sql(&self.table),
            params![
                record.id.to_string(),
                record.title,
                record.facility_type,
                record.address,
                record.canonical_addr,
                record.available_dates,
                record.last_updated,
            ],
        )?;
        Ok(())
    }

    /// Counts the stored records
    pub fn count_records(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Gets a record by id
    pub fn get_record(&self, id: &ItemId) -> StorageResult<Option<Record>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT id, title, facility_type, address, canonical_addr, \
                     available_dates, last_updated FROM {} WHERE id = ?1",
                    self.table
                ),
                params![id.to_string()],
                |row| {
                    let id: String = row.get(0)?;
                    Ok(Record {
                        id: parse_item_id(&id),
                        title: row.get(1)?,
                        facility_type: row.get(2)?,
                        address: row.get(3)?,
                        canonical_addr: row.get(4)?,
                        available_dates: row.get(5)?,
                        last_updated: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Counts stored records per facility type, largest first
    pub fn count_by_facility_type(&self) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT facility_type, COUNT(*) FROM {} GROUP BY facility_type \
             ORDER BY COUNT(*) DESC, facility_type",
            self.table
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Counts stored records with at least one available slot
    pub fn count_with_availability(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE available_dates != ''",
                self.table
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Most recent `last_updated` value
    pub fn latest_update(&self) -> StorageResult<Option<String>> {
        let conn = self.lock()?;
        let latest: Option<String> = conn.query_row(
            &format!("SELECT MAX(last_updated) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(latest)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn upsert(&self, record: &Record) -> StorageResult<()> {
        self.upsert_record(record)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.location, self.table)
    }
}

fn parse_item_id(raw: &str) -> ItemId {
    raw.parse::<i64>()
        .map(ItemId::Numeric)
        .unwrap_or_else(|_| ItemId::Text(raw.to_string()))
}

//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and the
//! associated error type.

use crate::record::Record;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during a single store operation
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store connection lock poisoned")]
    Lock,

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A keyed table that records are upserted into
///
/// Implementations must be safe to call from many enrichment workers at once.
/// An upsert replaces every column of an existing row with the same `id`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts `record`, or replaces the row with the same id
    async fn upsert(&self, record: &Record) -> StorageResult<()>;

    /// Human-readable destination, for logs
    fn describe(&self) -> String;
}

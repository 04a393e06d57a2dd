//! Storage module for persisting facility records
//!
//! This module handles all writes of completed records, including:
//! - The `RecordStore` interface and its error type
//! - A PostgREST backend (Supabase and friends)
//! - A SQLite backend for local tables
//! - The retrying persistence sink with run-level counters

mod postgrest;
mod schema;
mod sink;
mod sqlite;
mod traits;

pub use postgrest::PostgrestStore;
pub use sink::{PersistenceSink, WriteOutcome};
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StorageError, StorageResult};

use crate::config::SinkConfig;
use crate::{ConfigError, HarvestError};
use std::path::Path;
use std::sync::Arc;

/// Opens the record store named by the sink configuration
///
/// For a PostgREST sink the API key is read from the environment variable
/// named in the configuration.
///
/// # Returns
///
/// * `Ok(Arc<dyn RecordStore>)` - The opened store
/// * `Err(HarvestError)` - Missing API key, or the store could not be opened
pub fn open_store(config: &SinkConfig) -> Result<Arc<dyn RecordStore>, HarvestError> {
    match config {
        SinkConfig::Postgrest {
            url,
            table,
            api_key_env,
        } => {
            let api_key = std::env::var(api_key_env)
                .ok()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| ConfigError::MissingEnv(api_key_env.clone()))?;
            let store = PostgrestStore::new(url, table, api_key)?;
            tracing::info!("Writing records to {}", store.describe());
            Ok(Arc::new(store))
        }
        SinkConfig::Sqlite {
            database_path,
            table,
        } => {
            let store = SqliteStore::new(Path::new(database_path), table)?;
            tracing::info!("Writing records to {}", store.describe());
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_sqlite_store() {
        let dir = TempDir::new().unwrap();
        let config = SinkConfig::Sqlite {
            database_path: dir.path().join("courts.db").display().to_string(),
            table: "courts".to_string(),
        };

        let store = open_store(&config).unwrap();
        assert!(store.describe().contains("courts.db"));
    }

    #[test]
    fn test_open_postgrest_store_requires_key() {
        let config = SinkConfig::Postgrest {
            url: "https://abc.supabase.co".to_string(),
            table: "courts".to_string(),
            api_key_env: "SLOTSCOUT_TEST_UNSET_API_KEY".to_string(),
        };

        let result = open_store(&config);
        assert!(matches!(
            result,
            Err(HarvestError::Config(ConfigError::MissingEnv(_)))
        ));
    }
}

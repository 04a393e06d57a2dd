//! Retrying persistence sink
//!
//! Every completed record goes through [`PersistenceSink::upsert`], which
//! retries failed writes on a fixed schedule and keeps run-level
//! success/failure counters. Write failures are not classified; a rejected
//! row, a dropped connection and a serialization error are all retried alike.

use crate::record::Record;
use crate::retry::RetryPolicy;
use crate::storage::traits::{RecordStore, StorageError};
use crate::PersistenceError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of the sink counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub successes: u64,
    pub failures: u64,
}

/// Record store wrapper with retry and counters
pub struct PersistenceSink {
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl PersistenceSink {
    pub fn new(store: Arc<dyn RecordStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Zeroes the counters at the start of a run
    pub fn reset(&self) {
        self.successes.store(0, Ordering::SeqCst);
        self.failures.store(0, Ordering::SeqCst);
    }

    pub fn outcome(&self) -> WriteOutcome {
        WriteOutcome {
            successes: self.successes.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
        }
    }

    pub fn describe(&self) -> String {
        self.store.describe()
    }

    /// Writes `record`, retrying any failure until the attempt budget is spent
    ///
    /// Counts exactly one success or one failure per call.
    pub async fn upsert(&self, record: &Record) -> Result<(), PersistenceError> {
        let store = self.store.as_ref();
        let label = format!("upsert of record {}", record.id);

        let result = self
            .retry
            .run(&label, |_: &StorageError| true, move || store.upsert(record))
            .await;

        match result {
            Ok(()) => {
                self.successes.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("Stored record {}", record.id);
                Ok(())
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("Giving up on record {}: {}", record.id, e);
                Err(PersistenceError {
                    id: record.id.clone(),
                    attempts: e.attempts,
                    source: e.last,
                })
            }
        }
    }
}

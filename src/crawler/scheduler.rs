//! Request scheduler shared by every upstream call
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Pacing, so two request starts are never closer than the configured delay
//! - Shutdown, so pending callers stop waiting once a run is aborted

use crate::config::CrawlerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Permission to issue one request
///
/// The in-flight slot is released when this value is dropped.
#[derive(Debug)]
pub struct RequestSlot {
    _permit: OwnedSemaphorePermit,
}

/// Scheduler bounds in-flight requests and paces their start times
///
/// The scheduler coordinates:
/// - Global concurrency limits (max concurrent requests)
/// - Minimum spacing between successive request starts
#[derive(Debug)]
pub struct Scheduler {
    /// Global semaphore for limiting concurrent requests
    semaphore: Arc<Semaphore>,

    /// Minimum time between two request starts
    spacing: Duration,

    /// Earliest instant the next request may start
    next_slot: Mutex<Option<Instant>>,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_in_flight` - Maximum number of concurrent requests (at least 1)
    /// * `spacing` - Minimum delay between the starts of two requests
    pub fn new(max_in_flight: usize, spacing: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
            spacing,
            next_slot: Mutex::new(None),
        }
    }

    /// Creates a scheduler from the crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_concurrent_requests as usize,
            Duration::from_millis(config.request_delay_ms),
        )
    }

    /// Waits for a free slot and for the pacer, then returns the slot
    ///
    /// # Returns
    ///
    /// * `Some(RequestSlot)` - The caller may start its request now
    /// * `None` - The scheduler was closed
    pub async fn acquire(&self) -> Option<RequestSlot> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;

        // Reserve a start time under the lock, then sleep outside it
        let start_at = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let start_at = match *next_slot {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_slot = Some(start_at + self.spacing);
            start_at
        };

        if start_at > Instant::now() {
            tracing::trace!(
                "Pacing request, waiting {:?}",
                start_at - Instant::now()
            );
            tokio::time::sleep_until(start_at).await;
        }

        if self.semaphore.is_closed() {
            return None;
        }

        Some(RequestSlot { _permit: permit })
    }

    /// Closes the scheduler; pending and future `acquire` calls return `None`
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns whether the scheduler has been closed
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Returns the number of free in-flight slots
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns the configured spacing between request starts
    pub fn spacing(&self) -> Duration {
        self.spacing
    }
}

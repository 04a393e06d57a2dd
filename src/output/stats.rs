//! Statistics from a local record table
//!
//! This module provides functionality for extracting and displaying
//! statistics from a SQLite record store.

use crate::storage::{SqliteStore, StorageResult};

/// Record table statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Destination table
    pub table: String,

    /// Total number of stored records
    pub total_records: u64,

    /// Count of records by facility type, largest first
    pub records_by_type: Vec<(String, u64)>,

    /// Records with at least one available slot
    pub records_with_availability: u64,

    /// Most recent `last_updated` value
    pub latest_update: Option<String>,
}

/// Loads statistics from a record store
///
/// # Arguments
///
/// * `store` - The SQLite store to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(store: &SqliteStore) -> StorageResult<StoreStatistics> {
    Ok(StoreStatistics {
        table: store.table().to_string(),
        total_records: store.count_records()?,
        records_by_type: store.count_by_facility_type()?,
        records_with_availability: store.count_with_availability()?,
        latest_update: store.latest_update()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Record Statistics ({}) ===\n", stats.table);

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!(
        "  Last updated: {}",
        stats.latest_update.as_deref().unwrap_or("never")
    );
    println!();

    println!("Records by Facility Type:");
    for (facility_type, count) in &stats.records_by_type {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        let label = if facility_type.is_empty() {
            "(none)"
        } else {
            facility_type.as_str()
        };
        println!("  {}: {} ({:.1}%)", label, count, percentage);
    }
    println!();

    let availability_rate = if stats.total_records > 0 {
        (stats.records_with_availability as f64 / stats.total_records as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Availability: {:.1}% ({} / {} records have open slots)",
        availability_rate, stats.records_with_availability, stats.total_records
    );
}

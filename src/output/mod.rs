//! Output module for run reports and stored-record statistics
//!
//! This module handles:
//! - The per-run report, printed or serialized as JSON
//! - Statistics over a local record table

mod report;
pub mod stats;

pub use report::{print_report, RunReport, SkippedItem};
pub use stats::{load_statistics, print_statistics, StoreStatistics};

//! Run report
//!
//! One report is produced per run, whatever its outcome. It is printed for
//! humans at the end of a CLI run, or serialized to JSON for whatever
//! triggered the run.

use crate::record::ItemId;
use crate::state::RunState;
use crate::storage::WriteOutcome;
use chrono::NaiveDate;
use serde::Serialize;

/// An item that did not make it into the table, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    /// Missing only when a worker died without reporting its item
    pub id: Option<ItemId>,
    pub reason: String,
}

/// Outcome of one harvest run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub config_hash: String,
    pub target_date: NaiveDate,
    pub started_at: String,
    pub finished_at: Option<String>,
    /// Distinct items received from the listing
    pub items_seen: u64,
    pub successes: u64,
    pub write_failures: u64,
    pub skips: Vec<SkippedItem>,
    /// The error that ended the run, if it failed
    pub fatal: Option<String>,
}

impl RunReport {
    pub fn new(config_hash: impl Into<String>, target_date: NaiveDate, started_at: String) -> Self {
        Self {
            state: RunState::Start,
            config_hash: config_hash.into(),
            target_date,
            started_at,
            finished_at: None,
            items_seen: 0,
            successes: 0,
            write_failures: 0,
            skips: Vec::new(),
            fatal: None,
        }
    }

    pub fn record_skip(&mut self, id: Option<ItemId>, reason: impl Into<String>) {
        self.skips.push(SkippedItem {
            id,
            reason: reason.into(),
        });
    }

    /// Copies the sink counters into the report
    pub fn apply_outcome(&mut self, outcome: WriteOutcome) {
        self.successes = outcome.successes;
        self.write_failures = outcome.failures;
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Prints a run report to stdout in a formatted manner
pub fn print_report(report: &RunReport) {
    println!("=== Harvest Report ===\n");

    println!("Run:");
    println!("  State: {}", report.state);
    println!("  Target date: {}", report.target_date);
    println!("  Started: {}", report.started_at);
    if let Some(finished) = &report.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Config hash: {}", report.config_hash);
    println!();

    println!("Items:");
    println!("  Listed: {}", report.items_seen);
    println!("  Stored: {}", report.successes);
    println!("  Write failures: {}", report.write_failures);
    println!("  Skipped: {}", report.skips.len());
    println!();

    if !report.skips.is_empty() {
        println!("Skipped Items:");
        for skip in &report.skips {
            match &skip.id {
                Some(id) => println!("  - {}: {}", id, skip.reason),
                None => println!("  - (unknown): {}", skip.reason),
            }
        }
        println!();
    }

    if let Some(fatal) = &report.fatal {
        println!("Fatal error: {}", fatal);
    }
}

//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RunState`: the lifecycle of a single crawl run (authenticating, listing,
//!   enriching, done, failed)

mod run_state;

pub use run_state::RunState;

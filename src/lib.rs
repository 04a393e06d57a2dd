//! Slotscout: a reservation-availability harvester
//!
//! This crate signs in to an ActiveNet-style facility reservation platform,
//! walks its cursor-paginated resource listing, fetches detail and next-day
//! availability for every listed facility, and upserts one normalized record
//! per facility into a table store.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod retry;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Slotscout operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Task(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunState,
        to: state::RunState,
    },
}

impl HarvestError {
    /// Returns true if this error ends the whole run rather than a single item
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_fatal(),
            Self::Persistence(_) => false,
            _ => true,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),
}

/// Session establishment errors. Always fatal and never retried.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Landing page unavailable: {0}")]
    LandingUnavailable(crawler::RequestError),

    #[error("Anti-forgery token not found on landing page")]
    TokenNotFound,

    #[error("Sign-in rejected with HTTP {status}: {body}")]
    SignInRejected { status: u16, body: String },

    #[error("Sign-in request failed: {0}")]
    SignInFailed(crawler::RequestError),
}

/// Upstream fetch errors raised after the retry budget is spent
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Listing page at index {start_index} unreachable after {attempts} attempt(s): {reason}")]
    ListingPageUnreachable {
        start_index: u64,
        attempts: u32,
        reason: String,
    },

    #[error("Listing cursor did not advance (start {start_index}, next {next_start_index})")]
    ListingCursorStalled {
        start_index: u64,
        next_start_index: u64,
    },

    #[error("Item {id} unreachable during {stage} after {attempts} attempt(s): {reason}")]
    ItemUnreachable {
        id: record::ItemId,
        stage: crawler::EnrichStage,
        attempts: u32,
        reason: String,
    },
}

impl FetchError {
    /// Listing failures doom the run; item failures only skip the item
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ItemUnreachable { .. })
    }
}

/// A record write that failed on every attempt
#[derive(Debug, Error)]
#[error("Upsert of record {id} failed after {attempts} attempt(s): {source}")]
pub struct PersistenceError {
    pub id: record::ItemId,
    pub attempts: u32,
    #[source]
    pub source: storage::StorageError,
}

/// Result type alias for Slotscout operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Coordinator};
pub use output::RunReport;
pub use record::{canonicalize_address, ItemId, ItemStub, Record};
pub use state::RunState;

//! Configuration module for Slotscout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use slotscout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("slotscout.toml")).unwrap();
//! println!("Listing page size: {}", config.listing.page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, CredentialsConfig, ListingConfig, PlatformConfig, RetryConfig,
    RetryConfigs, SinkConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{is_valid_table_name, validate};

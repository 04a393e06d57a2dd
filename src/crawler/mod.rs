//! Crawler module for harvesting the reservation platform
//!
//! This module contains the core harvesting logic, including:
//! - Request scheduling, pacing and retry
//! - Sign-in and anti-forgery token extraction
//! - Cursor-paginated listing walks
//! - Per-item detail and availability enrichment
//! - Overall run coordination

mod api;
mod coordinator;
mod endpoints;
mod enricher;
mod fetcher;
mod paginator;
mod parser;
mod scheduler;
mod session;
mod wire;

pub use api::PlatformApi;
pub use coordinator::{run_crawl, Coordinator};
pub use endpoints::Endpoints;
pub use enricher::{
    render_available_dates, target_date_in, EnrichStage, Enricher, ItemSource, TimeSlot,
};
pub use fetcher::{build_http_client, Fetcher, RequestError};
pub use paginator::{ListingCursor, ListingPage, ListingSource, Paginator};
pub use parser::extract_token;
pub use scheduler::{RequestSlot, Scheduler};
pub use session::{Authenticator, Credentials, Session};

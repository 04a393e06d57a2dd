//! Crawler coordinator - main run orchestration logic
//!
//! This module drives a single harvest run through its states:
//! - Signing in and building the shared session
//! - Walking the listing in its own task, feeding a bounded channel
//! - Enriching and persisting items in a capped `JoinSet` as stubs arrive
//! - Handling cancellation and fatal failures
//! - Producing the run report

use crate::config::Config;
use crate::crawler::api::PlatformApi;
use crate::crawler::endpoints::Endpoints;
use crate::crawler::enricher::{target_date_in, Enricher};
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::paginator::Paginator;
use crate::crawler::scheduler::Scheduler;
use crate::crawler::session::{Authenticator, Credentials};
use crate::output::RunReport;
use crate::record::{ItemId, ItemStub};
use crate::retry::RetryPolicy;
use crate::state::RunState;
use crate::storage::{open_store, PersistenceSink, RecordStore};
use crate::HarvestError;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// What a worker hands back: the item it handled and how it went
type WorkerOutcome = (ItemId, Result<(), HarvestError>);

/// Main run coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    credentials: Credentials,
    sink: Arc<PersistenceSink>,
    config_hash: String,
    state: RunState,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated run configuration
    /// * `credentials` - Account to sign in with
    /// * `store` - Destination table for completed records
    pub fn new(config: Config, credentials: Credentials, store: Arc<dyn RecordStore>) -> Self {
        let retry = RetryPolicy::from(&config.retry.persistence);

        Self {
            config: Arc::new(config),
            credentials,
            sink: Arc::new(PersistenceSink::new(store, retry)),
            config_hash: String::new(),
            state: RunState::Start,
        }
    }

    /// Sets the configuration hash carried in the run report
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn sink(&self) -> &PersistenceSink {
        &self.sink
    }

    /// Moves the run to `next`, rejecting anything the state machine forbids
    pub fn transition(&mut self, next: RunState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs one harvest to completion and reports on it
    ///
    /// Never returns an error: fatal failures end the run in `Failed` and are
    /// described in the report. Records stored before a fatal failure stay
    /// stored.
    pub async fn run(&mut self, cancel: CancellationToken) -> RunReport {
        let timezone = self.config.crawler.timezone;
        let started = Utc::now();
        let target_date = target_date_in(timezone, started);
        let mut report = RunReport::new(
            self.config_hash.clone(),
            target_date,
            started.with_timezone(&timezone).to_rfc3339(),
        );

        tracing::info!(
            "Starting harvest of {} for {} into {}",
            self.config.platform.site,
            target_date,
            self.sink.describe()
        );

        self.sink.reset();
        let scheduler = Arc::new(Scheduler::from_config(&self.config.crawler));

        let result = self
            .execute(scheduler.clone(), target_date, &cancel, &mut report)
            .await;
        scheduler.close();

        report.apply_outcome(self.sink.outcome());
        match result {
            Ok(()) => {
                report.state = self.state;
                tracing::info!(
                    "Harvest completed: {} listed, {} stored, {} write failure(s), {} skipped",
                    report.items_seen,
                    report.successes,
                    report.write_failures,
                    report.skips.len()
                );
            }
            Err(e) => {
                tracing::error!("Harvest failed: {}", e);
                if self.state.can_transition_to(RunState::Failed) {
                    self.state = RunState::Failed;
                }
                report.state = RunState::Failed;
                report.fatal = Some(e.to_string());
            }
        }

        report.finished_at = Some(Utc::now().with_timezone(&timezone).to_rfc3339());
        report
    }

    async fn execute(
        &mut self,
        scheduler: Arc<Scheduler>,
        target_date: NaiveDate,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> Result<(), HarvestError> {
        self.transition(RunState::Authenticating)?;

        let config = self.config.clone();
        let client = build_http_client(&config.platform, &config.crawler)?;
        let fetcher = Fetcher::new(client, scheduler, RetryPolicy::from(&config.retry.fetch));
        let endpoints = Endpoints::from_config(&config.platform)?;

        let session = {
            let authenticator = Authenticator::new(&fetcher, &endpoints, &config.platform);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                session = authenticator.authenticate(&self.credentials) => session?,
            }
        };

        self.transition(RunState::Listing)?;

        let api = PlatformApi::new(Arc::new(session), endpoints, config.listing.clone());
        let limit = (config.crawler.max_concurrent_requests as usize).max(1);

        let (tx, mut rx) = mpsc::channel(limit * 2);
        let paginator = Paginator::new(api.clone(), config.listing.page_size);
        let mut listing = tokio::spawn(paginator.forward(tx));

        let enricher = Arc::new(Enricher::new(api, target_date, config.crawler.timezone));
        let mut workers: JoinSet<WorkerOutcome> = JoinSet::new();
        let mut listing_open = true;

        let outcome = loop {
            if !listing_open && workers.is_empty() {
                break Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(HarvestError::Cancelled),
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    settle(joined, report);
                }
                message = rx.recv(), if listing_open && workers.len() < limit => match message {
                    Some(Ok(stub)) => {
                        report.items_seen += 1;
                        tracing::debug!("Enriching item {}", stub.id);
                        workers.spawn(process_item(enricher.clone(), self.sink.clone(), stub));
                    }
                    Some(Err(e)) => break Err(e.into()),
                    None => {
                        listing_open = false;
                        if let Err(e) = (&mut listing).await {
                            break Err(HarvestError::Task(format!("listing task failed: {}", e)));
                        }
                        tracing::info!(
                            "Listing exhausted after {} item(s), {} still enriching",
                            report.items_seen,
                            workers.len()
                        );
                        if let Err(e) = self.transition(RunState::Enriching) {
                            break Err(e);
                        }
                    }
                },
            }
        };

        if let Err(e) = outcome {
            listing.abort();
            workers.abort_all();
            while workers.join_next().await.is_some() {}
            return Err(e);
        }

        self.transition(RunState::Done)
    }
}

/// Enriches one item and writes it to the sink
async fn process_item(
    enricher: Arc<Enricher<PlatformApi>>,
    sink: Arc<PersistenceSink>,
    stub: ItemStub,
) -> WorkerOutcome {
    let id = stub.id.clone();
    let result = async {
        let record = enricher.enrich(stub).await?;
        sink.upsert(&record).await?;
        Ok::<(), HarvestError>(())
    }
    .await;

    (id, result)
}

/// Folds a finished worker into the report
fn settle(joined: Result<WorkerOutcome, JoinError>, report: &mut RunReport) {
    match joined {
        Ok((_, Ok(()))) => {}
        Ok((id, Err(e))) => {
            tracing::warn!("Skipping item {}: {}", id, e);
            report.record_skip(Some(id), e.to_string());
        }
        Err(e) => {
            tracing::warn!("Enrichment worker died: {}", e);
            report.record_skip(None, format!("worker failed: {}", e));
        }
    }
}

/// Runs a complete harvest with credentials and store taken from `config`
///
/// # Returns
///
/// * `Ok(RunReport)` - The run happened; its report says whether it succeeded
/// * `Err(HarvestError)` - Credentials or the record store were unavailable
pub async fn run_crawl(
    config: Config,
    config_hash: String,
    cancel: CancellationToken,
) -> Result<RunReport, HarvestError> {
    let credentials = Credentials::from_env(&config.credentials)?;
    let store = open_store(&config.sink)?;

    let mut coordinator = Coordinator::new(config, credentials, store).with_config_hash(config_hash);
    Ok(coordinator.run(cancel).await)
}

//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests to the reservation platform, including:
//! - Building the cookie-carrying HTTP client
//! - Attaching the anti-forgery token and XHR headers to REST calls
//! - Routing every request through the shared scheduler
//! - Retry logic for transient failures
//! - Error classification

use crate::config::{CrawlerConfig, PlatformConfig};
use crate::crawler::scheduler::Scheduler;
use crate::retry::{RetryError, RetryPolicy};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longest response body kept in a status error
const MAX_ERROR_BODY: usize = 512;

/// Failure of a single HTTP attempt
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request scheduler closed")]
    SchedulerClosed,
}

impl RequestError {
    /// Returns true for failures worth another attempt
    ///
    /// | Condition | Transient |
    /// |-----------|-----------|
    /// | Network error / timeout | yes |
    /// | HTTP 5xx | yes |
    /// | HTTP 429 | yes |
    /// | Other HTTP status | no |
    /// | Undecodable body | no |
    /// | Scheduler closed | no |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            Self::Decode(_) | Self::SchedulerClosed => false,
        }
    }

    /// HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client keeps a cookie store, so the session cookies set by the landing
/// page and by sign-in ride along on every later request.
///
/// # Arguments
///
/// * `platform` - Platform configuration (user agent)
/// * `crawler` - Crawler configuration (timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    platform: &PlatformConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(platform.user_agent.as_str())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Scheduled, optionally retried access to the platform
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    scheduler: Arc<Scheduler>,
    retry: RetryPolicy,
    csrf_token: Option<String>,
}

impl Fetcher {
    pub fn new(client: Client, scheduler: Arc<Scheduler>, retry: RetryPolicy) -> Self {
        Self {
            client,
            scheduler,
            retry,
            csrf_token: None,
        }
    }

    /// Returns a fetcher that sends `token` as `X-CSRF-Token` on REST calls
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetches a page once, without REST headers
    pub async fn get_page(&self, url: &Url) -> Result<String, RequestError> {
        tracing::debug!("GET {}", url);
        self.execute(self.client.get(url.clone())).await
    }

    /// POSTs a JSON body once and returns the raw response text
    pub async fn post_json_once(&self, url: &Url, body: &Value) -> Result<String, RequestError> {
        tracing::debug!("POST {}", url);
        self.execute(self.api_request(Method::POST, url).json(body))
            .await
    }

    /// GETs a JSON document, retrying transient failures
    pub async fn get_json<T>(&self, label: &str, url: &Url) -> Result<T, RetryError<RequestError>>
    where
        T: DeserializeOwned,
    {
        let this = self;
        self.retry
            .run(label, RequestError::is_transient, move || async move {
                tracing::debug!("GET {}", url);
                let text = this.execute(this.api_request(Method::GET, url)).await?;
                Ok::<T, RequestError>(serde_json::from_str::<T>(&text)?)
            })
            .await
    }

    /// POSTs a JSON body and decodes the JSON answer, retrying transient failures
    pub async fn post_json<T>(
        &self,
        label: &str,
        url: &Url,
        body: &Value,
    ) -> Result<T, RetryError<RequestError>>
    where
        T: DeserializeOwned,
    {
        let this = self;
        self.retry
            .run(label, RequestError::is_transient, move || async move {
                tracing::debug!("POST {}", url);
                let text = this
                    .execute(this.api_request(Method::POST, url).json(body))
                    .await?;
                Ok::<T, RequestError>(serde_json::from_str::<T>(&text)?)
            })
            .await
    }

    /// A request carrying the headers the platform's REST API expects
    fn api_request(&self, method: Method, url: &Url) -> RequestBuilder {
        let request = self
            .client
            .request(method, url.clone())
            .header(ACCEPT, "application/json")
            .header("X-Requested-With", "XMLHttpRequest");

        match &self.csrf_token {
            Some(token) => request.header("X-CSRF-Token", token.as_str()),
            None => request,
        }
    }

    /// Sends one request inside a scheduler slot
    async fn execute(&self, request: RequestBuilder) -> Result<String, RequestError> {
        let _slot = self
            .scheduler
            .acquire()
            .await
            .ok_or(RequestError::SchedulerClosed)?;

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

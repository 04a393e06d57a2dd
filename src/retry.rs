//! Bounded retry policy
//!
//! One policy type serves both the upstream fetch layer (exponential backoff,
//! transient failures only) and the persistence layer (fixed delay, every
//! failure retried).

use crate::config::RetryConfig;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Upper bound on any single backoff delay
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Maximum attempts and the delay schedule between them
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
}

/// The last error of an operation that used up its attempts, or failed in a
/// way the caller chose not to retry
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.last, self.attempts)
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last)
    }
}

impl RetryPolicy {
    /// A policy with the same delay before every retry
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::exponential(max_attempts, delay, 1.0)
    }

    /// A policy whose delay grows by `backoff_multiplier` after each retry
    pub fn exponential(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_multiplier: backoff_multiplier.max(1.0),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis.min(MAX_DELAY.as_millis() as f64) as u64)
    }

    /// Runs `operation` until it succeeds, fails with an error `should_retry`
    /// rejects, or the attempt budget is spent
    pub async fn run<T, E, F, Fut, P>(
        &self,
        label: &str,
        should_retry: P,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt >= self.max_attempts || !should_retry(&error) {
                        return Err(RetryError {
                            attempts: attempt,
                            last: error,
                        });
                    }

                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label,
                        attempt,
                        self.max_attempts,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::exponential(
            config.max_attempts,
            Duration::from_millis(config.delay_ms),
            config.backoff_multiplier,
        )
    }
}

//! Fetch s retry pro jednotlivé cally mimo queue (on-demand stats, odds feed).
//!
//! Lineární backoff: po n-tém neúspěchu čekáme `backoff_base * n`.
//! `Unchanged` (304) je úspěch a retry se nezkouší.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, attempt_timeout_ms: u64, backoff_base_ms: u64) -> Self {
        Self {
            max_attempts,
            attempt_timeout: Duration::from_millis(attempt_timeout_ms),
            backoff_base: Duration::from_millis(backoff_base_ms),
        }
    }

    /// Live odds feed: krátké čekání, jinak zaostaneme za cyklem.
    pub fn critical() -> Self {
        Self::new(3, 3000, 200)
    }

    pub fn standard() -> Self {
        Self::new(3, 5000, 300)
    }

    /// On-demand stats z HTTP endpointu.
    pub fn stats() -> Self {
        Self::new(3, 4000, 500)
    }

    pub fn background() -> Self {
        Self::new(2, 8000, 1000)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Result of a conditional fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Fresh(T),
    Unchanged,
}

impl<T> FetchOutcome<T> {
    pub fn fresh(self) -> Option<T> {
        match self {
            FetchOutcome::Fresh(v) => Some(v),
            FetchOutcome::Unchanged => None,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, FetchOutcome::Unchanged)
    }
}

/// Run `op` until it succeeds or attempts run out. Each attempt is bounded
/// by `attempt_timeout`; the last error is returned on exhaustion.
pub async fn fetch_with_retry<T, F, Fut>(
    op_name: &str,
    config: &RetryConfig,
    mut op: F,
) -> Result<FetchOutcome<T>, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<FetchOutcome<T>, FetchError>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match timeout(config.attempt_timeout, op()).await {
            Ok(r) => r,
            Err(_) => Err(FetchError::Timeout(config.attempt_timeout)),
        };

        match result {
            Ok(outcome) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", op_name, attempt);
                }
                return Ok(outcome);
            }
            Err(e) if attempt >= attempts => {
                warn!("{} failed after {} attempts: {}", op_name, attempt, e);
                return Err(e);
            }
            Err(e) => {
                let delay = config.backoff(attempt);
                debug!(
                    "{} attempt {}/{} failed: {}, retry in {}ms",
                    op_name,
                    attempt,
                    attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

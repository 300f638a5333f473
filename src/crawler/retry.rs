//! Retry with exponential backoff for transport failures.

use crate::config::FetchConfig;
use crate::crawler::fetcher::{CatalogClient, RequestParams};
use crate::CrawlError;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exponential backoff between retry attempts.
///
/// The delay starts at `min` and doubles on every attempt, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    min: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_min_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.min.saturating_mul(factor).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(10))
    }
}

/// Issues `params` until a payload comes back.
///
/// Retryable transport failures are retried without an attempt limit;
/// non-retryable ones are returned immediately. Cancelling `cancel` abandons
/// both the in-flight request and any pending backoff sleep.
pub async fn get_with_retry<C: CatalogClient>(
    client: &C,
    params: &RequestParams,
    backoff: Backoff,
    cancel: &CancellationToken,
) -> Result<Value, CrawlError> {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CrawlError::Cancelled),
            result = client.get(params) => result,
        };

        let error = match result {
            Ok(payload) => return Ok(payload),
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e.into()),
        };

        let delay = backoff.delay(attempt);
        tracing::warn!(
            request = %params,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Transport failure, retrying: {}",
            error
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CrawlError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }
}

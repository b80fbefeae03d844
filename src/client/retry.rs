//! Retry configuration and delay calculation.
//!
//! [`RetryConfig`] controls how the storefront client retries transient
//! failures. All retrying goes through the shared [`with_retry()`] helper.
//! The [`ApiOptimizer`](crate::ApiOptimizer) itself never retries; a failed
//! fetch is reported to every joined caller and the next call starts fresh.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::telemetry;
use crate::{Result, SaddleryError};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff:
///
/// ```rust
/// # use saddlery::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    #[serde(rename = "initial_delay_ms", deserialize_with = "duration_millis")]
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    #[serde(rename = "max_delay_ms", deserialize_with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

fn duration_millis<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (0-indexed):
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// A server `retry_after` hint takes precedence over the computed backoff.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Execute an async operation with retry logic.
///
/// Retries on transient errors (as classified by
/// [`SaddleryError::is_transient()`]) up to `config.max_attempts`.
/// Permanent errors are returned immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt + 1 < attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
                        .increment(1);
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| SaddleryError::Http(format!("{operation}: no attempts made"))))
}

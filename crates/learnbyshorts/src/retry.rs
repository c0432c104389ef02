//! Retry with exponential backoff for store calls.
//!
//! Only errors for which [`RepositoryError::is_retryable`] holds are retried
//! (`StoreUnavailable`). Every attempt runs under its own timeout; an attempt
//! that times out counts as `StoreUnavailable`.
//!
//! # Example
//!
//! ```ignore
//! use learnbyshorts::retry::{with_retry, RetryConfig};
//!
//! let profile = with_retry(&RetryConfig::default(), || repo.get_profile("u1")).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use learnbyshorts_core::storage::{RepositoryError, Result};
use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries (excluding the initial attempt).
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Whether to add up to 25% random jitter to each delay.
    pub add_jitter: bool,
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            add_jitter: true,
            attempt_timeout: Duration::from_millis(5000),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, enable: bool) -> Self {
        self.add_jitter = enable;
        self
    }

    #[must_use]
    pub fn with_attempt_timeout(mut self, limit: Duration) -> Self {
        self.attempt_timeout = limit;
        self
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// `base_delay * 2^attempt`, capped at `max_delay`, plus jitter.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(multiplier);
        let delay = Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64));

        if !self.add_jitter {
            return delay;
        }

        let jitter_range = delay.as_millis() as u64 / 4;
        if jitter_range == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..jitter_range))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        let outcome = match timeout(config.attempt_timeout, operation()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RepositoryError::StoreUnavailable(format!(
                "store call timed out after {}ms",
                config.attempt_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt >= config.max_attempts {
                    return Err(err);
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient store error"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

//! Retry policy with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::SourceError;

/// Exponential backoff: `base * factor^(attempt - 2)` before attempt `attempt`.
///
/// There is no cap and no jitter. Delays too large to represent saturate at
/// [`Duration::MAX`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.0,
        }
    }
}

impl Backoff {
    /// Delay to wait before the 1-based `attempt`. The first attempt never waits.
    pub fn delay_before(self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let seconds = self.base.as_secs_f64() * self.factor.powi(exponent);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

/// Bounded retry policy: attempt budget, retryability classifier and backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether a failed `attempt` (1-based) should be followed by another.
    pub fn should_retry(&self, error: &SourceError, attempt: u32) -> bool {
        error.retryable() && attempt < self.max_attempts.max(1)
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff.delay_before(attempt)
    }

    /// Drives `operation` until it succeeds, fails terminally, or the attempt
    /// budget runs out. Backoff sleeps abort as soon as `cancel` fires.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, SourceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.should_retry(&error, attempt) {
                if error.retryable() {
                    warn!(attempt, error = %error, "retry budget exhausted");
                }
                return Err(error);
            }

            attempt += 1;
            let delay = self.delay_before(attempt);
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                retry_after_hint_ms = error.retry_after().map(|hint| hint.as_millis() as u64),
                error = %error,
                "retrying after backoff"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(SourceError::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

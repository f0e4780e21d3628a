//! Bounded retry with linear backoff for idempotent reads
//!
//! Only failures where no response arrived are retried. Writes use
//! `RetryPolicy::single_attempt()` so a request with side effects is never
//! sent twice.

use std::future::Future;
use std::time::Duration;

use super::error::ApiError;

/// How many times a read may be attempted and how long to wait between tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Attempt N waits `N * backoff_step` before the next one
    pub backoff_step: Duration,
    /// Added to the request deadline for every attempt after the first
    pub timeout_growth: Duration,
}

impl RetryPolicy {
    /// Exactly one attempt, no waiting
    pub const fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff_step: Duration::ZERO,
            timeout_growth: Duration::ZERO,
        }
    }

    /// `max_attempts` tries with linear backoff and a fixed deadline
    pub const fn linear(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
            timeout_growth: Duration::ZERO,
        }
    }

    /// Extends the deadline of each later attempt by `growth`
    pub fn with_timeout_growth(mut self, growth: Duration) -> Self {
        self.timeout_growth = growth;
        self
    }

    /// Wait before the attempt following `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    /// Deadline for `attempt` (1-based) given the base deadline
    pub fn timeout_for(&self, base: Duration, attempt: u32) -> Duration {
        base + self.timeout_growth * attempt.saturating_sub(1)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent
    ///
    /// The closure receives the 1-based attempt number. After the last
    /// attempt the final error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after transient failure"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

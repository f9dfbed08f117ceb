//! Timeouts and bounded exponential backoff for calls that cross a store or
//! service boundary.
//!
//! A timeout is a failure, never a success: it surfaces as
//! [`RideError::UpstreamUnavailable`] and is retried like any other
//! transient fault.

use crate::error::{Result, RideError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Retry policy for exponential backoff.
///
/// `max_retries` counts retries after the first attempt, so an operation is
/// tried at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never waits.
    pub const NONE: Self = Self {
        max_retries: 0,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    /// Delay before retry number `attempt + 1`: doubles each time, capped at
    /// `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Runs `call` with a deadline, mapping expiry to `UpstreamUnavailable`.
pub async fn with_timeout<T, Fut>(operation: &'static str, limit: Duration, call: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RideError::upstream(
            operation,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}

/// Retries `operation` on transient errors, each attempt under `limit`.
///
/// Non-transient errors are returned immediately. When retries run out the
/// last error is returned.
pub async fn retry_with_backoff<T, F, Fut>(
    name: &'static str,
    policy: RetryPolicy,
    limit: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match with_timeout(name, limit, operation()).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation = name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    operation = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(
                        operation = name,
                        attempt,
                        error = %err,
                        "Operation failed after max retries"
                    );
                }
                return Err(err);
            }
        }
    }
}

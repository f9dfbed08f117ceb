use crate::application::retry::RetryPolicy;
use std::time::Duration;

/// Tuning for every call the ledger makes across a store or service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Deadline for a single registry, store or payment call.
    pub call_timeout: Duration,
    /// Backoff applied to compensations and terminal side effects.
    pub retry: RetryPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn new(call_timeout_ms: u64, max_retries: u32, retry_delay_ms: u64) -> Self {
        let initial_delay = Duration::from_millis(retry_delay_ms);
        Self {
            call_timeout: Duration::from_millis(call_timeout_ms),
            retry: RetryPolicy {
                max_retries,
                initial_delay,
                max_delay: initial_delay.saturating_mul(32),
            },
        }
    }
}

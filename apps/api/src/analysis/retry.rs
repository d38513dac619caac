use std::time::Duration;

use crate::analysis::orchestrator::AnalysisError;

/// Attempt budget and backoff schedule for backend calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub retryable: fn(&AnalysisError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            retryable: retry_any,
        }
    }
}

/// Every failure is retryable. Fatal provider errors (bad credentials) are not
/// distinguished yet.
pub fn retry_any(_: &AnalysisError) -> bool {
    true
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): `min_delay * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.min_delay.as_millis() as u64;
        let cap = self.max_delay.as_millis() as u64;
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor).min(cap))
    }

    /// `Some(delay)` if another attempt should follow the `attempt`-th failure.
    pub fn should_retry(&self, attempt: u32, error: &AnalysisError) -> Option<Duration> {
        if attempt >= self.max_attempts || !(self.retryable)(error) {
            return None;
        }
        Some(self.backoff(attempt))
    }
}

//! Retry policy for ingestion and summarization activities.
//!
//! Mirrors the retry contract of durable-execution runtimes: an initial
//! interval grown by a backoff coefficient, capped at a maximum interval,
//! with a maximum attempt count and a list of error types that are never
//! retried. The runner that applies the policy lives in the application
//! crate (`civitas::activity`); this module only does the arithmetic.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry, in milliseconds.
    pub initial_interval_ms: u64,
    pub backoff_coefficient: f64,
    /// Upper bound on any single delay, in milliseconds.
    pub maximum_interval_ms: u64,
    /// Total attempts including the first. `1` disables retries.
    pub maximum_attempts: u32,
    /// Error type names that fail immediately.
    pub non_retryable: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            backoff_coefficient: 2.0,
            maximum_interval_ms: 60_000,
            maximum_attempts: 5,
            non_retryable: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1 = first retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = self
            .backoff_coefficient
            .powi(attempt.saturating_sub(1).min(63) as i32);
        let ms = (self.initial_interval_ms as f64 * exp).min(self.maximum_interval_ms as f64);
        Duration::from_millis(ms.max(0.0) as u64)
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based)
    /// that failed with `error_type`.
    pub fn should_retry(&self, attempt: u32, error_type: &str) -> bool {
        if attempt >= self.maximum_attempts {
            return false;
        }
        !self.non_retryable.iter().any(|t| t == error_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            initial_interval_ms: 100,
            backoff_coefficient: 2.0,
            maximum_interval_ms: 500,
            maximum_attempts: 10,
            non_retryable: vec![],
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(500));
    }

    #[test]
    fn test_should_retry_respects_attempts_and_types() {
        let policy = RetryPolicy {
            maximum_attempts: 3,
            non_retryable: vec!["bad_request".into()],
            ..RetryPolicy::default()
        };
        assert!(policy.should_retry(1, "unavailable"));
        assert!(policy.should_retry(2, "unavailable"));
        assert!(!policy.should_retry(3, "unavailable"));
        assert!(!policy.should_retry(1, "bad_request"));
        assert!(!RetryPolicy::no_retry().should_retry(1, "unavailable"));
    }
}

//! Retried activities.
//!
//! An activity is an async operation (fetch a page, scan a connector, call
//! the LLM) run under a [`RetryPolicy`]. Failures are classified through
//! [`ActivityError`]: `Retryable` errors are attempted again after the
//! policy's backoff delay, `NonRetryable` errors fail at once. Errors that
//! carry no classification are treated as retryable.

use std::future::Future;

use civitas_core::retry::RetryPolicy;
use thiserror::Error;

/// Classified activity failure.
#[derive(Error, Debug)]
pub enum ActivityError {
    /// Transient failure (HTTP 429/5xx, network, timeouts).
    #[error("{error_type}: {message}")]
    Retryable { error_type: String, message: String },

    /// Permanent failure (HTTP 4xx, malformed payloads, bad config).
    #[error("{error_type}: {message}")]
    NonRetryable { error_type: String, message: String },
}

impl ActivityError {
    pub fn retryable(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        ActivityError::Retryable {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    pub fn non_retryable(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        ActivityError::NonRetryable {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    pub fn error_type(&self) -> &str {
        match self {
            ActivityError::Retryable { error_type, .. }
            | ActivityError::NonRetryable { error_type, .. } => error_type,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivityError::Retryable { .. })
    }
}

/// Result of a successful activity.
#[derive(Debug)]
pub struct ActivityOutcome<T> {
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// Final failure of an activity after its last attempt.
#[derive(Error, Debug)]
#[error("activity '{activity}' failed after {attempts} attempt(s): {error:#}")]
pub struct ActivityFailure {
    pub activity: String,
    pub attempts: u32,
    pub error: anyhow::Error,
}

/// `(retryable, error_type)` for an error returned by an activity body.
///
/// A nested [`ActivityFailure`] has already exhausted its own retries, so
/// it is never retried again by an outer activity.
pub fn classify(err: &anyhow::Error) -> (bool, String) {
    if let Some(e) = err.downcast_ref::<ActivityError>() {
        return (e.is_retryable(), e.error_type().to_string());
    }
    if err.downcast_ref::<ActivityFailure>().is_some() {
        return (false, "retries_exhausted".to_string());
    }
    (true, "error".to_string())
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted. `op` receives the 1-based attempt number.
pub async fn run_activity<T, F, Fut>(
    name: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<ActivityOutcome<T>, ActivityFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                return Ok(ActivityOutcome {
                    value,
                    attempts: attempt,
                })
            }
            Err(error) => {
                let (retryable, error_type) = classify(&error);
                if !retryable || !policy.should_retry(attempt, &error_type) {
                    return Err(ActivityFailure {
                        activity: name.to_string(),
                        attempts: attempt,
                        error,
                    });
                }
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    activity = name,
                    attempt,
                    error_type = %error_type,
                    delay_ms = delay.as_millis() as u64,
                    "activity failed, retrying: {:#}",
                    error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(maximum_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_interval_ms: 1,
            backoff_coefficient: 1.0,
            maximum_interval_ms: 1,
            maximum_attempts,
            non_retryable: vec!["quota".to_string()],
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let outcome = run_activity("flaky", &fast_policy(5), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(ActivityError::retryable("http_503", "unavailable").into())
                } else {
                    Ok(attempt * 10)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, 30);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let failure = run_activity("bad", &fast_policy(5), |_| async {
            Err::<(), _>(ActivityError::non_retryable("http_404", "missing").into())
        })
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert!(failure.to_string().contains("http_404"));
    }

    #[tokio::test]
    async fn test_policy_non_retryable_types() {
        let failure = run_activity("quota", &fast_policy(5), |_| async {
            Err::<(), _>(ActivityError::retryable("quota", "exceeded").into())
        })
        .await
        .unwrap_err();
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_attempts_exhausted() {
        let failure = run_activity("down", &fast_policy(3), |_| async {
            Err::<(), _>(anyhow::anyhow!("connection reset"))
        })
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.activity, "down");
        assert!(failure.to_string().contains("connection reset"));
    }

    #[test]
    fn test_nested_failure_is_not_retried() {
        let inner = ActivityFailure {
            activity: "page".into(),
            attempts: 5,
            error: anyhow::anyhow!("boom"),
        };
        let (retryable, error_type) = classify(&anyhow::Error::new(inner));
        assert!(!retryable);
        assert_eq!(error_type, "retries_exhausted");
    }
}

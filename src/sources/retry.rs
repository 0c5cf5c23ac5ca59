//! Bounded retry with backoff for transient collaborator failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::AnalysisContext;
use crate::error::{AnalysisError, DriftwatchError, Result};

/// Retry budget for one collaborator call site.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay before the given retry (1-based attempt index).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(2_u32.saturating_pow(exp));
        delay.min(self.max_delay)
    }
}

/// Runs an async operation with bounded retries on transient errors.
///
/// Non-transient errors return immediately. When the budget is exhausted
/// the last transient error is wrapped in `RetriesExhausted`. Cancellation
/// is honoured between attempts and during backoff sleeps.
///
/// # Errors
///
/// Returns the operation's terminal error, `RetriesExhausted`, or
/// `Cancelled`.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    ctx: &AnalysisContext,
    stage: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<DriftwatchError> = None;

    for attempt in 1..=policy.max_attempts {
        ctx.ensure_active()?;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                warn!(
                    stage,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "transient failure"
                );

                if attempt < policy.max_attempts {
                    let delay = err
                        .retry_delay_secs()
                        .map_or_else(|| policy.delay_for(attempt), Duration::from_secs)
                        .min(policy.max_delay);
                    debug!(stage, delay_ms = delay.as_millis() as u64, "backing off");

                    let mut cancel = ctx.cancel.clone();
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {}
                    }
                }
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    let message = last_error.map_or_else(String::new, |e| e.to_string());
    Err(DriftwatchError::Analysis(AnalysisError::RetriesExhausted {
        stage: stage.to_string(),
        attempts: policy.max_attempts,
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{cancel_pair, AnalysisContext, CancelSignal};
    use crate::error::AzureError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ctx() -> AnalysisContext {
        AnalysisContext::new("tenant-a", "corr-1", CancelSignal::never())
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retries(fast_policy(), &ctx(), "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retries(fast_policy(), &ctx(), "fetch", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(AzureError::network("flaky").into())
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_wraps_last_error() {
        let err = with_retries(fast_policy(), &ctx(), "fetch-observed", || async {
            Err::<(), _>(AzureError::network("still down").into())
        })
        .await
        .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("fetch-observed"), "got: {text}");
        assert!(text.contains("3 attempts"), "got: {text}");
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retries(fast_policy(), &ctx(), "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AzureError::auth("denied").into()) }
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("authentication failed"), "got: {err}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_retries() {
        let (handle, signal) = cancel_pair();
        let cancelled_ctx = AnalysisContext::new("tenant-a", "corr-1", signal);
        handle.cancel();

        let err = with_retries(fast_policy(), &cancelled_ctx, "fetch", || async {
            Ok::<_, DriftwatchError>(1)
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("cancelled"), "got: {err}");
    }
}

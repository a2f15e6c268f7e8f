// Retry logic for external capability calls
use crate::application::worker::constants::{
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
};
use crate::port::CapabilityError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay
    Retry(Duration),
    /// Give up, the last error is final
    Failed,
}

/// Value produced by a retried call and the attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Every attempt failed (or the error was not retryable)
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{operation} failed after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted {
    pub operation: String,
    pub attempts: u32,
    pub failures: Vec<String>,
    pub last_error: CapabilityError,
}

impl RetryExhausted {
    /// Final error followed by the failures that preceded it
    pub fn summary(&self) -> String {
        let earlier = &self.failures[..self.failures.len().saturating_sub(1)];
        if earlier.is_empty() {
            self.to_string()
        } else {
            format!("{} (earlier: {})", self, earlier.join("; "))
        }
    }
}

/// Retry policy
///
/// Up to `max_attempts` calls; after failed attempt `n` the policy sleeps
/// `base_delay * n` before the next one. Rejected (non-retryable) errors stop
/// immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        )
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_attempts` - Total calls allowed, clamped to at least 1
    /// * `base_delay` - Backoff unit
    ///
    /// # Example
    /// ```text
    /// let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    /// // waits 1s after the first failure, 2s after the second
    /// ```
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Decide what happens after failed attempt number `attempt`
    pub fn decide(&self, attempt: u32, error: &CapabilityError) -> RetryDecision {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::Failed;
        }
        RetryDecision::Retry(self.delay_for(attempt))
    }

    /// Run `call` until it succeeds or the budget is spent
    ///
    /// `call` receives the 1-based attempt number. Intermediate failures are
    /// logged, and only surface as the history of a `RetryExhausted`.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
    ) -> Result<Attempted<T>, RetryExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        let mut failures = Vec::new();
        let mut attempt = 1;

        loop {
            match call(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            operation = %operation,
                            attempt = attempt,
                            "Call succeeded after retry"
                        );
                    }
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    failures.push(err.to_string());

                    match self.decide(attempt, &err) {
                        RetryDecision::Retry(delay) => {
                            warn!(
                                operation = %operation,
                                attempt = attempt,
                                max_attempts = self.max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "Attempt failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        RetryDecision::Failed => {
                            warn!(
                                operation = %operation,
                                attempts = attempt,
                                error = %err,
                                "Giving up"
                            );
                            return Err(RetryExhausted {
                                operation: operation.to_string(),
                                attempts: attempt,
                                failures,
                                last_error: err,
                            });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_grows_with_attempt_number() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(3000));
    }

    #[test]
    fn test_decide_stops_at_budget_and_on_rejection() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let transient = CapabilityError::Transient("503".into());
        let rejected = CapabilityError::Rejected("nsfw".into());

        assert_eq!(
            policy.decide(1, &transient),
            RetryDecision::Retry(Duration::from_millis(10))
        );
        assert_eq!(
            policy.decide(2, &transient),
            RetryDecision::Retry(Duration::from_millis(20))
        );
        assert_eq!(policy.decide(3, &transient), RetryDecision::Failed);
        assert_eq!(policy.decide(1, &rejected), RetryDecision::Failed);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_fail_twice_then_succeed() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .execute("generate", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(CapabilityError::Transient(format!("timeout #{}", attempt)))
                    } else {
                        Ok("bytes")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.value, "bytes");
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let err = fast_policy(3)
            .execute("upload", |attempt| async move {
                Err::<(), _>(CapabilityError::Transient(format!("503 #{}", attempt)))
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(err.failures.len(), 3);
        assert_eq!(err.last_error, CapabilityError::Transient("503 #3".into()));
        assert!(err.to_string().contains("upload failed after 3 attempt(s)"));
        assert_eq!(
            err.summary(),
            "upload failed after 3 attempt(s): transient failure: 503 #3 \
             (earlier: transient failure: 503 #1; transient failure: 503 #2)"
        );
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = fast_policy(5)
            .execute("generate", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(CapabilityError::Rejected("bad prompt".into())) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
        assert_eq!(err.summary(), err.to_string());
    }
}

//! Per-configuration retry with exponential backoff
//!
//! A single configuration gets up to `max_retries + 1` tries. Permanent client
//! errors and errors that end the configuration (see
//! [`ends_configuration_attempt`]) stop the loop immediately; anything else
//! waits `base_delay * 2^attempt` and tries again. There is no jitter.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::RelayError;

/// HTTP statuses that never succeed on a second try.
pub const NON_RETRYABLE_STATUS: [u16; 5] = [400, 401, 403, 404, 422];

/// Whether the backoff loop should try again after `error`.
///
/// Only the HTTP status is consulted: errors without a status are retryable.
pub fn should_retry(error: &RelayError) -> bool {
    match error.status_code() {
        Some(status) => !NON_RETRYABLE_STATUS.contains(&status),
        None => true,
    }
}

/// Errors that are final for the configuration that produced them: a terminal
/// task status, the poll ceiling, or an operation the configuration does not
/// offer. No task is ever submitted twice within one configuration.
pub fn ends_configuration_attempt(error: &RelayError) -> bool {
    matches!(
        error,
        RelayError::TaskFailed { .. }
            | RelayError::TimeoutError(_)
            | RelayError::UnsupportedOperation(_)
    )
}

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::defaults::retry::RETRY_COUNT,
            base_delay: crate::defaults::retry::BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Delay before retry number `attempt + 1` (attempt is 0-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Retry executor that handles the actual retry logic
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, hits a permanent error, or the
    /// retries are used up. The last error is returned on failure.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, RelayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !should_retry(&error) {
                        tracing::debug!(error = %error, "permanent error, not retrying");
                        return Err(error);
                    }
                    if ends_configuration_attempt(&error) {
                        tracing::debug!(error = %error, "configuration cannot serve this request, not retrying");
                        return Err(error);
                    }
                    if attempt >= self.policy.max_retries {
                        return Err(error);
                    }

                    let delay = self.policy.calculate_delay(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after backoff"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Convenience wrapper: `operation` gets up to `max_retries + 1` tries with
/// `base_delay * 2^attempt` between them.
pub async fn with_retry_delay<F, Fut, T>(
    operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, RelayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    RetryExecutor::new(RetryPolicy::new(max_retries, base_delay))
        .execute(operation)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[test]
    fn permanent_statuses_are_not_retried() {
        for status in [400, 401, 403, 404, 422] {
            assert!(!should_retry(&RelayError::api_error(status, "x")), "{status}");
        }
        for status in [408, 409, 429, 500, 502, 503] {
            assert!(should_retry(&RelayError::api_error(status, "x")), "{status}");
        }
        assert!(should_retry(&RelayError::HttpError("connection reset".into())));
        assert!(should_retry(&RelayError::TimeoutError("poll".into())));
        assert!(should_retry(&RelayError::ProviderError {
            provider: "doubao".into(),
            code: 50411,
            message: "moderation".into(),
            retryable: false,
        }));
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(400));
        // Large attempt numbers saturate instead of panicking.
        let huge = RetryPolicy::new(1, Duration::from_secs(1)).calculate_delay(40);
        assert!(huge >= Duration::from_secs(u32::MAX as u64));
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_is_tried_max_retries_plus_one_times() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_for_op = calls.clone();
        let start = Instant::now();

        let result: Result<(), RelayError> = with_retry_delay(
            || {
                let calls = calls_for_op.clone();
                async move {
                    calls.lock().unwrap().push(Instant::now());
                    Err(RelayError::api_error(503, "unavailable"))
                }
            },
            3,
            Duration::from_millis(1000),
        )
        .await;

        assert!(matches!(result, Err(RelayError::ApiError { code: 503, .. })));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        let offsets: Vec<u128> = calls
            .iter()
            .map(|t| t.duration_since(start).as_millis())
            .collect();
        assert_eq!(offsets, vec![0, 1000, 3000, 7000]);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_stops_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<(), RelayError> = with_retry_delay(
            || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RelayError::api_error(401, "bad key"))
                }
            },
            5,
            Duration::from_millis(10),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_configuration_errors_stop_immediately() {
        let outcomes = [
            RelayError::TaskFailed {
                task_id: "t".into(),
                status: "expired".into(),
            },
            RelayError::TimeoutError("processing timeout".into()),
            RelayError::unsupported("no variations"),
        ];
        for outcome in outcomes {
            assert!(should_retry(&outcome));
            let counter = Arc::new(AtomicU32::new(0));
            let counter_clone = counter.clone();
            let result: Result<(), RelayError> = with_retry_delay(
                || {
                    let counter = counter_clone.clone();
                    let outcome = outcome.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(outcome)
                    }
                },
                3,
                Duration::from_millis(10),
            )
            .await;
            assert!(result.is_err());
            assert_eq!(counter.load(Ordering::SeqCst), 1, "{outcome}");
        }
        assert!(!ends_configuration_attempt(&RelayError::HttpError("request timed out".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_on_second_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry_delay(
            || {
                let counter = counter_clone.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(RelayError::HttpError("connection reset".into()))
                    } else {
                        Ok("success")
                    }
                }
            },
            2,
            Duration::from_millis(10),
        )
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let result: Result<(), RelayError> = with_retry_delay(
            || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RelayError::api_error(500, "boom"))
                }
            },
            0,
            Duration::from_millis(1),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

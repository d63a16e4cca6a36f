//! Retry/backoff executor shared by search and chat calls.
//!
//! A failed attempt is classified once. Terminal errors and the last
//! attempt's error are returned unchanged; transient errors sleep and retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{BrokerError, BrokerResult, ErrorClass};

/// Decides whether an error is worth retrying.
pub type Classifier = Arc<dyn Fn(&BrokerError) -> ErrorClass + Send + Sync>;

/// Delay before the retry following failed attempt `n` (1-based).
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Bounded retry policy.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    classify: Classifier,
    delay: DelayFn,
}

impl RetryPolicy {
    /// Default classification, linear backoff `base_delay * attempt` capped
    /// at `max_delay`.
    pub fn linear(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            classify: Arc::new(BrokerError::class),
            delay: Arc::new(move |attempt| base_delay.saturating_mul(attempt).min(max_delay)),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::linear(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// A single attempt, never retried.
    pub fn none() -> Self {
        Self::linear(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_classifier(
        mut self,
        classify: impl Fn(&BrokerError) -> ErrorClass + Send + Sync + 'static,
    ) -> Self {
        self.classify = Arc::new(classify);
        self
    }

    pub fn with_delay(mut self, delay: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Arc::new(delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt `attempt`. A rate-limit hint wins when it
    /// is longer than the computed delay.
    pub fn delay_for(&self, attempt: u32, error: &BrokerError) -> Duration {
        let computed = (self.delay)(attempt);
        match error.retry_after() {
            Some(hint) if hint > computed => hint,
            _ => computed,
        }
    }

    /// Run `thunk` until it succeeds, fails terminally, or attempts run out.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut thunk: F) -> BrokerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BrokerResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match thunk().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if (self.classify)(&error) == ErrorClass::Terminal
                        || attempt >= self.max_attempts
                    {
                        return Err(error);
                    }
                    let delay = self.delay_for(attempt, &error);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        kind = error.kind(),
                        error = %error,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::linear(3, Duration::from_millis(100), Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_transient_runs_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = policy()
            .execute("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(BrokerError::network("connection reset"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err, BrokerError::network("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = policy()
            .execute("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(BrokerError::validation("bad"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, BrokerError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient() {
        let calls = AtomicU32::new(0);
        let value = policy()
            .execute("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 {
                    Err(BrokerError::upstream(Some(503), "unavailable"))
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff() {
        let start = Instant::now();
        let _ = policy()
            .execute("test", || async { Err::<(), _>(BrokerError::timeout("slow")) })
            .await;
        // 100ms after attempt 1, 200ms after attempt 2.
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_honored_when_larger() {
        let start = Instant::now();
        let calls = AtomicU32::new(0);
        let _ = policy()
            .with_max_attempts(2)
            .execute("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(BrokerError::rate_limited(
                    "slow down",
                    Some(Duration::from_secs(2)),
                ))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn test_small_retry_after_ignored() {
        let err = BrokerError::rate_limited("x", Some(Duration::from_millis(1)));
        assert_eq!(policy().delay_for(2, &err), Duration::from_millis(200));
    }

    #[test]
    fn test_delay_capped() {
        let p = RetryPolicy::linear(10, Duration::from_secs(1), Duration::from_secs(3));
        assert_eq!(p.delay_for(9, &BrokerError::network("x")), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier() {
        let calls = AtomicU32::new(0);
        let _ = policy()
            .with_classifier(|_| ErrorClass::Transient)
            .with_delay(|_| Duration::ZERO)
            .execute("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(BrokerError::validation("normally terminal"))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::none().with_max_attempts(0).max_attempts(), 1);
    }
}

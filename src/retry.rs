use crate::metrics::ServerMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Attempt budget for a retried operation: a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(5, Duration::from_millis(50))
    }
}

impl RetryConfig {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Retry executor with a bounded attempt count
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: Option<Arc<ServerMetrics>>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(config: RetryConfig, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            config,
            metrics: Some(metrics),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` until it succeeds, `retry_condition` rejects the
    /// error, or the attempt budget is spent. The last error is returned.
    pub async fn execute_with_condition<T, F, Fut, E, R>(
        &self,
        operation_name: &str,
        operation: F,
        retry_condition: R,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Debug,
    {
        let mut attempt = 1;

        loop {
            if let Some(metrics) = &self.metrics {
                metrics.increment_retry_attempts();
            }

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt,
                            "Operation succeeded after retry"
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.increment_retry_successes();
                        }
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !retry_condition(&error) {
                        debug!(
                            operation = operation_name,
                            error = ?error,
                            "Retry condition failed, not retrying"
                        );
                        return Err(error);
                    }

                    if attempt >= self.config.max_attempts {
                        warn!(
                            operation = operation_name,
                            attempt = attempt,
                            error = ?error,
                            "Operation failed after all retry attempts"
                        );
                        return Err(error);
                    }

                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = self.config.delay.as_millis(),
                        "Operation failed, retrying after delay"
                    );

                    sleep(self.config.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_successful_operation() {
        let executor = RetryExecutor::new(RetryConfig::default());

        let result = executor
            .execute_with_condition(
                "test",
                || async { Ok::<i32, anyhow::Error>(42) },
                |_| true,
            )
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let counter = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(RetryConfig::fixed(5, Duration::from_millis(10)));

        let counter_clone = counter.clone();
        let result = executor
            .execute_with_condition(
                "test_retry",
                move || {
                    let counter = counter_clone.clone();
                    async move {
                        let attempt = counter.fetch_add(1, Ordering::Relaxed) + 1;
                        if attempt < 3 {
                            Err(anyhow::anyhow!("busy"))
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |error| error.to_string().contains("busy"),
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_exceeded() {
        let counter = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(RetryConfig::fixed(4, Duration::from_millis(10)));

        let counter_clone = counter.clone();
        let result = executor
            .execute_with_condition(
                "test_fail",
                move || {
                    counter_clone.fetch_add(1, Ordering::Relaxed);
                    async { Err::<i32, anyhow::Error>(anyhow::anyhow!("busy")) }
                },
                |_| true,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(RetryConfig::fixed(5, Duration::from_millis(10)));

        let counter_clone = counter.clone();
        let result = executor
            .execute_with_condition(
                "test_non_retryable",
                move || {
                    counter_clone.fetch_add(1, Ordering::Relaxed);
                    async { Err::<i32, anyhow::Error>(anyhow::anyhow!("validation error")) }
                },
                |error| error.to_string().contains("busy"),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_spaced_by_fixed_delay() {
        let executor = RetryExecutor::new(RetryConfig::fixed(4, Duration::from_millis(100)));
        let started = tokio::time::Instant::now();

        let result = executor
            .execute_with_condition(
                "test_spacing",
                || async { Err::<(), anyhow::Error>(anyhow::anyhow!("busy")) },
                |_| true,
            )
            .await;

        assert!(result.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    }

    #[test]
    fn test_fixed_policy_requires_one_attempt() {
        assert_eq!(RetryConfig::fixed(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let metrics = Arc::new(ServerMetrics::new());
        let executor = RetryExecutor::with_metrics(
            RetryConfig::fixed(3, Duration::from_millis(1)),
            metrics.clone(),
        );
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let _ = executor
            .execute_with_condition(
                "test_metrics",
                move || {
                    let counter = counter_clone.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::Relaxed) == 0 {
                            Err(anyhow::anyhow!("busy"))
                        } else {
                            Ok(())
                        }
                    }
                },
                |_| true,
            )
            .await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.retry_attempts, 2);
        assert_eq!(snapshot.retry_successes, 1);
    }
}

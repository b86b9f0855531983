/// Resilience Module
///
/// Retry primitives shared by contract acquisition (§4.6, budget 24, no backoff) and shard
/// transfer (§4.7, budget 3, exponential backoff). Both are instances of the same
/// `retry_async` driven by a `RetryConfig`; the policy, not the mechanism, differs.
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{DfsError, DfsResult};

/// Retry configuration for resilient operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Contract-acquisition policy: up to `attempts` tries, no backoff between them.
    pub fn no_backoff(attempts: usize) -> Self {
        Self {
            max_attempts: attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Shard-transfer policy: up to `attempts` tries with exponential backoff.
    pub fn exponential_backoff(attempts: usize) -> Self {
        Self {
            max_attempts: attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential_backoff(3)
    }
}

/// Retry a future-producing operation according to `config`. Returns the last error once
/// the attempt budget is exhausted. A `DfsError::Cancelled` is never retried — it propagates
/// immediately so an external kill aborts the loop without waiting out the remaining backoff.
pub async fn retry_async<F, Fut, T>(
    operation: F,
    config: RetryConfig,
    operation_name: &str,
) -> DfsResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = DfsResult<T>>,
{
    let mut delay = config.initial_delay;
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        debug!(
            "attempting {} (attempt {}/{})",
            operation_name, attempt, config.max_attempts
        );

        let start = Instant::now();
        match operation().await {
            Ok(result) => {
                debug!(
                    "{} succeeded on attempt {} after {:?}",
                    operation_name,
                    attempt,
                    start.elapsed()
                );
                return Ok(result);
            }
            Err(DfsError::Cancelled) => {
                debug!("{} cancelled on attempt {}", operation_name, attempt);
                return Err(DfsError::Cancelled);
            }
            Err(e) => {
                if attempt < config.max_attempts {
                    if !delay.is_zero() {
                        warn!(
                            "{} failed on attempt {}, retrying in {:?}: {}",
                            operation_name, attempt, delay, e
                        );
                        sleep(delay).await;
                        delay = std::cmp::min(
                            Duration::from_millis(
                                (delay.as_millis() as f64 * config.backoff_multiplier) as u64,
                            ),
                            config.max_delay,
                        );
                    } else {
                        warn!(
                            "{} failed on attempt {}, retrying immediately: {}",
                            operation_name, attempt, e
                        );
                    }
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        DfsError::Transport(format!("{} failed with no error", operation_name))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = AtomicUsize::new(0);
        let result = retry_async(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, DfsError>(42)
            },
            RetryConfig::no_backoff(24),
            "test",
        )
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let result = retry_async(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(DfsError::Transport("boom".into()))
            },
            RetryConfig::no_backoff(3),
            "test",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_short_circuits_without_retrying() {
        let calls = AtomicUsize::new(0);
        let result = retry_async(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(DfsError::Cancelled)
            },
            RetryConfig::exponential_backoff(5),
            "test",
        )
        .await;
        assert!(matches!(result, Err(DfsError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_on_final_attempt() {
        let calls = AtomicUsize::new(0);
        let result = retry_async(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(DfsError::Transport("boom".into()))
                } else {
                    Ok(())
                }
            },
            RetryConfig::no_backoff(3),
            "test",
        )
        .await;
        assert!(result.is_ok());
    }
}

//! Bounded retry with exponential backoff for provider calls.
//!
//! Embedding and chat completions go through [`with_backoff`] so that
//! transient timeouts and rate limits are absorbed, while persistent
//! failures surface the last error instead of hanging.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry policy for external provider calls.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub initial_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }
}

/// Run an async operation, retrying with exponential backoff.
///
/// The operation is attempted `1 + max_retries` times; the final error is
/// returned unchanged once retries are exhausted.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    op_name: &str,
    mut op: F,
) -> std::result::Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    op_name,
                    attempt,
                    policy.max_retries,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let policy = BackoffPolicy::default();
        let result: Result<i32, String> =
            with_backoff(&policy, "op", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let policy = BackoffPolicy::new(3, 1, 10);
        let attempts = AtomicU32::new(0);

        let result: Result<i32, String> = with_backoff(&policy, "op", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retries() {
        let policy = BackoffPolicy::new(2, 1, 10);
        let attempts = AtomicU32::new(0);

        let result: Result<i32, String> = with_backoff(&policy, "op", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "down");
        // First attempt plus two retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}

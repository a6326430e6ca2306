//! Bounded retry with exponential backoff.
//!
//! Used where one transient failure should not be fatal: device
//! command timeouts, lost slot claims.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Retry policy. Attempts include the first call; the delay before
/// attempt N is `initial_delay * backoff_multiplier^(N-2)`, capped.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Policy for physical device commands: bounded attempts with a
    /// short first backoff, capped at two seconds.
    pub fn for_gateway(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(2),
        }
    }

    /// Backoff to sleep after the given (1-based) failed attempt.
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, the error is classified
/// permanent by `should_retry`, or the attempt budget is spent.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if attempt >= config.max_attempts || !should_retry(&err) {
            warn!(
                operation = operation_name,
                attempt,
                max_attempts = config.max_attempts,
                error = %err,
                "Giving up"
            );
            return Err(err);
        }

        let backoff = config.delay_after(attempt);
        warn!(
            operation = operation_name,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Transient failure, backing off"
        );
        tokio::time::sleep(backoff).await;
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_doubles_then_hits_the_cap() {
        let config = fast_config(5);
        assert_eq!(config.delay_after(1), Duration::from_millis(1));
        assert_eq!(config.delay_after(2), Duration::from_millis(2));
        assert_eq!(config.delay_after(3), Duration::from_millis(4));
        assert_eq!(config.delay_after(4), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            fast_config(3),
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("flaky")
                } else {
                    Ok(7)
                }
            },
            |_| true,
            "test_op",
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_does_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(
            fast_config(3),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal")
            },
            |_| false,
            "test_op",
        )
        .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(
            fast_config(2),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("flaky")
            },
            |_| true,
            "test_op",
        )
        .await;
        assert_eq!(result, Err("flaky"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

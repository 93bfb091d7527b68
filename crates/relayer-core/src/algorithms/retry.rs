//! Bounded exponential-backoff retry.

use crate::domain::BackoffPolicy;
use std::future::Future;
use tracing::warn;

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// Every attempt failed with a retryable error.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last_error: E,
    },
    /// An attempt failed with an error the classifier refused to retry.
    Aborted {
        /// Attempt that failed.
        attempt: u32,
        /// The error.
        error: E,
    },
}

impl<E> RetryFailure<E> {
    /// Attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }

    /// The final error.
    pub fn into_error(self) -> E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Aborted { error, .. } => error,
        }
    }
}

/// Run `operation` until it succeeds, the classifier rejects an error, or
/// `policy.max_attempts` attempts have failed. Sleeps `delay_for_attempt(n)`
/// between attempts; no sleep follows the last one.
///
/// On success returns the value together with the number of attempts used.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    policy: &BackoffPolicy,
    label: &str,
    mut operation: F,
    is_retryable: C,
) -> Result<(T, u32), RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok((value, attempt)),
            Err(error) if !is_retryable(&error) => {
                return Err(RetryFailure::Aborted { attempt, error });
            }
            Err(error) if attempt >= max_attempts => {
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(error) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "{} attempt {}/{} failed: {}; retrying in {:?}",
                    label, attempt, max_attempts, error, delay
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
    use std::time::Duration;

    fn policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy::new(max_attempts, Duration::from_secs(1), Duration::from_secs(4))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            &policy(5),
            "op",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("flaky".to_string())
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await
        .unwrap();

        assert_eq!(result, (3, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32), _> = retry_with_backoff(
            &policy(4),
            "op",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            |_| true,
        )
        .await;

        match result {
            Err(RetryFailure::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error, "down");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborts_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32), _> = retry_with_backoff(
            &policy(5),
            "op",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("rejected".to_string())
            },
            |e| e != "rejected",
        )
        .await;

        assert!(matches!(result, Err(RetryFailure::Aborted { attempt: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_backoff_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<((), u32), _> = retry_with_backoff(
            &policy(4),
            "op",
            || async { Err("down".to_string()) },
            |_| true,
        )
        .await;

        // 1s + 2s + 4s, nothing after the final attempt
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }
}

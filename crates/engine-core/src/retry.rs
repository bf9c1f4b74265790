use std::{fmt::Display, future::Future, time::Duration};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Retry after backing off. A server-provided wait replaces the
    /// exponential delay.
    Retry { hint: Option<Duration> },
    Stop,
}

impl RetryDisposition {
    pub fn retry() -> Self {
        RetryDisposition::Retry { hint: None }
    }
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded(E),
    /// Cancellation fired while backing off.
    Cancelled(E),
}

/// Exponential backoff with a ceiling and a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Wait before the next attempt.
    ///
    /// A server hint is returned unchanged. Otherwise the delay is
    /// `base_delay * 2^(attempt - 1)` capped at `max_delay`; `attempt` counts
    /// from 1.
    pub fn compute_delay(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        if let Some(hint) = server_hint {
            return hint;
        }

        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempt.max(1) - 1;
        let factor = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
        let delay_ns = self.base_delay.as_nanos().saturating_mul(factor);
        let capped = delay_ns.min(self.max_delay.as_nanos());
        Duration::from_nanos(u64::try_from(capped).unwrap_or(u64::MAX))
    }

    /// Executes the operation, retrying recoverable failures.
    ///
    /// `op` is invoked afresh on every attempt. At most `max_retries`
    /// attempts are made; the backoff sleep is abandoned if `cancel` fires.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        mut op: F,
        classify: Classifier,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        E: Display,
    {
        let mut attempt: u32 = 1;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry { hint } => {
                        if attempt >= self.max_retries {
                            return Err(RetryError::AttemptsExceeded(err));
                        }

                        let delay = self.compute_delay(attempt, hint);
                        warn!(
                            attempt,
                            max_retries = self.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Recoverable failure, backing off"
                        );

                        tokio::select! {
                            _ = cancel.cancelled() => return Err(RetryError::Cancelled(err)),
                            _ = sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(base_ms: u64, max_ms: u64, retries: u32) -> BackoffPolicy {
        BackoffPolicy::new(
            retries,
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
        )
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let p = policy(100, 60_000, 5);
        let delays: Vec<u128> = (1..=5)
            .map(|a| p.compute_delay(a, None).as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn delay_is_capped() {
        let p = policy(100, 500, 10);
        assert_eq!(p.compute_delay(4, None), Duration::from_millis(500));
        assert_eq!(p.compute_delay(200, None), Duration::from_millis(500));
    }

    #[test]
    fn server_hint_wins() {
        let p = policy(100, 500, 10);
        assert_eq!(
            p.compute_delay(3, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn attempt_zero_behaves_like_first() {
        let p = policy(100, 500, 3);
        assert_eq!(p.compute_delay(0, None), Duration::from_millis(100));
    }

    #[test]
    fn zero_retries_is_clamped() {
        assert_eq!(policy(1, 1, 0).max_retries, 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let res: Result<u32, RetryError<String>> = policy(1, 2, 5)
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { if n < 3 { Err(format!("busy {n}")) } else { Ok(n) } }
                },
                |_| RetryDisposition::retry(),
                &cancel,
            )
            .await;

        assert_eq!(res.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let res: Result<(), RetryError<String>> = policy(1, 2, 4)
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("throttled".to_string()) }
                },
                |_| RetryDisposition::retry(),
                &cancel,
            )
            .await;

        assert!(matches!(res, Err(RetryError::AttemptsExceeded(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn stop_is_not_retried() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let res: Result<(), RetryError<String>> = policy(1, 2, 4)
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("bad request".to_string()) }
                },
                |_| RetryDisposition::Stop,
                &cancel,
            )
            .await;

        assert!(matches!(res, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let res: Result<(), RetryError<String>> = policy(60_000, 60_000, 4)
            .run(
                || async { Err("throttled".to_string()) },
                |_| RetryDisposition::retry(),
                &cancel,
            )
            .await;

        assert!(matches!(res, Err(RetryError::Cancelled(_))));
    }
}

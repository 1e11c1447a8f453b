use crate::cancel::CancelFlag;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt limit and exponential backoff between attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay
    pub max_backoff_ms: u64,

    /// Factor applied to the delay after every failed retry
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No delay between attempts; handy for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            multiplier: 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "retry.multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err("retry.max_backoff_ms must not be below retry.initial_backoff_ms".into());
        }
        Ok(())
    }

    /// Delay after the `failed_attempt`-th failure (1-based)
    pub fn backoff_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// How a retried operation ended
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    /// Every allowed attempt failed with a retryable error
    Exhausted { error: E, attempts: u32 },
    /// The operation failed with an error the predicate rejected
    NotRetryable { error: E, attempts: u32 },
    /// Cancellation was observed before the next attempt
    Cancelled { attempts: u32, last_error: Option<E> },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::NotRetryable { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, runs
/// out of attempts, or `cancel` is set.
///
/// Cancellation is checked before every attempt and interrupts backoff
/// sleeps; an attempt already in flight is never interrupted.
pub async fn retry_with_backoff<T, E, Op, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancelFlag,
    is_retryable: P,
    mut operation: Op,
) -> RetryOutcome<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;
    let mut attempts = 0;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled {
                attempts,
                last_error,
            };
        }

        attempts += 1;
        let error = match operation(attempts).await {
            Ok(value) => return RetryOutcome::Succeeded { value, attempts },
            Err(error) => error,
        };

        if !is_retryable(&error) {
            return RetryOutcome::NotRetryable { error, attempts };
        }
        if attempts >= max_attempts {
            return RetryOutcome::Exhausted { error, attempts };
        }

        let delay = policy.backoff_after(attempts);
        log::warn!(
            "Attempt {attempts}/{max_attempts} failed: {error}; retrying in {}ms",
            delay.as_millis()
        );
        last_error = Some(error);

        if !delay.is_zero() && !cancel.sleep(delay).await {
            return RetryOutcome::Cancelled {
                attempts,
                last_error,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn transient(err: &TestError) -> bool {
        *err == TestError::Transient
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(350));
    }

    #[test]
    fn validation() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::immediate(0).validate().is_err());
        let policy = RetryPolicy {
            multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let outcome = retry_with_backoff(
            &RetryPolicy::immediate(3),
            &CancelFlag::new(),
            transient,
            |_| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok("done")
                }
            },
        )
        .await;

        assert!(matches!(
            outcome,
            RetryOutcome::Succeeded {
                value: "done",
                attempts: 3
            }
        ));
    }

    #[tokio::test]
    async fn exhausts_attempts() {
        let outcome: RetryOutcome<(), _> = retry_with_backoff(
            &RetryPolicy::immediate(3),
            &CancelFlag::new(),
            transient,
            |_| async { Err(TestError::Transient) },
        )
        .await;
        assert!(matches!(
            outcome,
            RetryOutcome::Exhausted {
                error: TestError::Transient,
                attempts: 3
            }
        ));
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let outcome: RetryOutcome<(), _> = retry_with_backoff(
            &RetryPolicy::immediate(3),
            &CancelFlag::new(),
            transient,
            |_| async { Err(TestError::Fatal) },
        )
        .await;
        assert!(matches!(
            outcome,
            RetryOutcome::NotRetryable { attempts: 1, .. }
        ));
    }

    #[tokio::test]
    async fn cancelled_flag_prevents_first_attempt() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<(), _> =
            retry_with_backoff(&RetryPolicy::immediate(3), &cancel, transient, |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Transient)
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            outcome,
            RetryOutcome::Cancelled {
                attempts: 0,
                last_error: None
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_retrying() {
        let cancel = CancelFlag::new();
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
            multiplier: 1.0,
        };
        let trigger = cancel.clone();
        let outcome: RetryOutcome<(), _> = retry_with_backoff(&policy, &cancel, transient, |_| {
            trigger.cancel();
            async { Err(TestError::Transient) }
        })
        .await;
        assert!(matches!(
            outcome,
            RetryOutcome::Cancelled {
                attempts: 1,
                last_error: Some(TestError::Transient)
            }
        ));
    }
}

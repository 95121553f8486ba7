use std::future::Future;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffSchedule {
    /// `delay × attempt`.
    Linear { delay: Duration },
    /// `initial × 2^(attempt - 1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl BackoffSchedule {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            BackoffSchedule::Linear { delay } => {
                delay.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
            }
            BackoffSchedule::Exponential { initial, max } => {
                let exponent = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
                let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
                initial.saturating_mul(multiplier).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryBackoff {
    pub schedule: BackoffSchedule,
    pub max_attempts: usize,
}

impl RetryBackoff {
    pub(crate) fn new(schedule: BackoffSchedule, max_attempts: usize) -> Self {
        Self {
            schedule,
            max_attempts: max_attempts.max(1),
        }
    }
}

pub(crate) enum RetryDisposition {
    Retry,
    Abort,
}

/// Final error of a retried operation along with how many attempts ran.
#[derive(Debug)]
pub(crate) struct RetryFailure<E> {
    pub error: E,
    pub attempts: usize,
}

pub(crate) async fn retry_with_backoff<T, E, F, Fut, L, C>(
    config: RetryBackoff,
    mut operation: F,
    mut on_retry: L,
    mut classify_error: C,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    L: FnMut(usize, Duration, &E, bool),
    C: FnMut(usize, &E) -> RetryDisposition,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => match classify_error(attempt, &err) {
                RetryDisposition::Abort => {
                    return Err(RetryFailure {
                        error: err,
                        attempts: attempt,
                    })
                }
                RetryDisposition::Retry => {
                    let exhausted = attempt >= config.max_attempts;
                    let backoff = config.schedule.delay_for(attempt);

                    on_retry(attempt, backoff, &err, !exhausted);

                    if exhausted {
                        return Err(RetryFailure {
                            error: err,
                            attempts: attempt,
                        });
                    }

                    pause(backoff).await;
                }
            },
        }
    }
}

async fn pause(delay: Duration) {
    if delay.is_zero() {
        yield_now().await;
    } else {
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn linear_schedule_grows_with_attempt_number() {
        let schedule = BackoffSchedule::Linear {
            delay: Duration::from_millis(100),
        };
        assert_eq!(schedule.delay_for(1), Duration::from_millis(100));
        assert_eq!(schedule.delay_for(2), Duration::from_millis(200));
        assert_eq!(schedule.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn exponential_schedule_doubles_and_caps() {
        let schedule = BackoffSchedule::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        assert_eq!(schedule.delay_for(1), Duration::from_millis(100));
        assert_eq!(schedule.delay_for(2), Duration::from_millis(200));
        assert_eq!(schedule.delay_for(3), Duration::from_millis(400));
        assert_eq!(schedule.delay_for(4), Duration::from_millis(500));
        assert_eq!(schedule.delay_for(64), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retries = Arc::new(AtomicUsize::new(0));
        let config = RetryBackoff::new(
            BackoffSchedule::Linear {
                delay: Duration::from_millis(10),
            },
            3,
        );

        let calls_for_op = calls.clone();
        let retries_for_log = retries.clone();
        let failure = retry_with_backoff(
            config,
            move |_| {
                let calls = calls_for_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("down")
                }
            },
            move |_, _, _, will_retry| {
                if will_retry {
                    retries_for_log.fetch_add(1, Ordering::SeqCst);
                }
            },
            |_, _| RetryDisposition::Retry,
        )
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.error, "down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_stops_immediately() {
        let failure = retry_with_backoff(
            RetryBackoff::new(
                BackoffSchedule::Linear {
                    delay: Duration::from_secs(1),
                },
                5,
            ),
            |_| async { Err::<(), _>("fatal") },
            |_, _, _, _| {},
            |_, _| RetryDisposition::Abort,
        )
        .await
        .unwrap_err();
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let value = retry_with_backoff(
            RetryBackoff::new(
                BackoffSchedule::Exponential {
                    initial: Duration::from_millis(5),
                    max: Duration::from_millis(20),
                },
                4,
            ),
            |attempt| async move {
                if attempt < 3 {
                    Err("not yet")
                } else {
                    Ok(attempt)
                }
            },
            |_, _, _, _| {},
            |_, _| RetryDisposition::Retry,
        )
        .await
        .expect("third attempt succeeds");
        assert_eq!(value, 3);
    }
}

//! Bounded retry with a fixed delay between attempts.
//!
//! Used both for resubmitting cluster creation and for the readiness poll.
//! Each attempt receives the state produced by the previous one, so values
//! that must be threaded linearly (such as a renewed access token) travel
//! through the loop instead of living in a shared mutable field.
//!
//! Every attempt and every delay races against a [`CancellationToken`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Maximum attempts plus a constant delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    /// Attempts before giving up (values below 1 behave like 1)
    pub max_attempts: u32,
    /// Delay between consecutive attempts
    pub interval: Duration,
}

impl FixedBackoff {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Total time spent sleeping if every attempt is used.
    /// There is no delay after the final attempt.
    pub fn total_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// What an attempt decided.
#[derive(Debug)]
pub enum Step<T, S> {
    /// Finished; stop retrying with this value
    Done(T),
    /// Not finished; try again with this state
    Retry(S),
}

#[derive(Debug)]
pub enum RetryError<S, E> {
    /// Every attempt asked for a retry. Carries the last state produced.
    Exhausted { attempts: u32, last: S },
    /// An attempt failed terminally
    Aborted(E),
    Cancelled,
}

/// Run `operation` until it returns [`Step::Done`], fails, the attempt
/// budget runs out, or `cancel` fires.
///
/// `operation` receives the current state and the 1-based attempt number.
pub async fn retry_fixed<S, T, E, F, Fut>(
    policy: &FixedBackoff,
    operation_name: &str,
    cancel: &CancellationToken,
    initial: S,
    mut operation: F,
) -> Result<T, RetryError<S, E>>
where
    F: FnMut(S, u32) -> Fut,
    Fut: Future<Output = Result<Step<T, S>, E>>,
    E: fmt::Display,
{
    let mut state = initial;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let outcome = match cancellable(cancel, operation(state, attempt)).await {
            Some(outcome) => outcome,
            None => return Err(RetryError::Cancelled),
        };

        match outcome {
            Ok(Step::Done(value)) => return Ok(value),
            Ok(Step::Retry(next)) => {
                if attempt >= policy.max_attempts {
                    warn!(
                        operation = %operation_name,
                        attempts = attempt,
                        "Retry budget exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: next,
                    });
                }

                debug!(
                    operation = %operation_name,
                    attempt = attempt,
                    remaining = policy.max_attempts - attempt,
                    delay_secs = policy.interval.as_secs_f64(),
                    "Not done yet, retrying"
                );

                state = next;
                if !sleep_or_cancel(cancel, policy.interval).await {
                    return Err(RetryError::Cancelled);
                }
            }
            Err(e) => {
                error!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    "Operation failed"
                );
                return Err(RetryError::Aborted(e));
            }
        }
    }
}

/// Await `future` unless `cancel` fires first.
pub async fn cancellable<F: Future>(cancel: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}

/// Sleep for `duration`. Returns false if cancelled before it elapsed.
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    cancellable(cancel, tokio::time::sleep(duration))
        .await
        .is_some()
}

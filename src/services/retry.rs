//! Bounded retry with backoff for store operations
//!
//! `RetryPolicy` bundles the attempt bound, the backoff shape and the
//! predicate deciding which errors are worth another attempt. It never
//! retries indefinitely.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::error::{StoreError, StoreResult};

/// Delay before the next attempt, given how many attempts have failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * failed_attempts`
    Linear(Duration),
    /// `base * 2^(failed_attempts - 1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Parse a configured backoff name (`fixed`, `linear`, `exponential`)
    pub fn from_name(name: &str, base: Duration) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fixed" => Some(Backoff::Fixed(base)),
            "linear" => Some(Backoff::Linear(base)),
            "exponential" => Some(Backoff::Exponential {
                base,
                max: base.saturating_mul(8),
            }),
            _ => None,
        }
    }

    pub fn delay(&self, failed_attempts: u32) -> Duration {
        let n = failed_attempts.max(1);
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Linear(base) => base.saturating_mul(n),
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(n - 1);
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Outcome of a retried operation together with the attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: StoreResult<T>,
    pub attempts: u32,
}

/// Details handed to the retry observer before each sleep
#[derive(Debug, Clone, PartialEq)]
pub struct RetryNotice {
    /// The attempt that just failed (1-based)
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub cause: String,
}

#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retryable: fn(&StoreError) -> bool,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Retries transient store errors only
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            retryable: StoreError::is_transient,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    pub fn should_retry(&self, err: &StoreError, attempt: u32) -> bool {
        attempt < self.max_attempts && (self.retryable)(err)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt bound is reached. The operation receives the 1-based
    /// attempt number; `on_retry` is called before each backoff sleep.
    pub async fn run<T, F, Fut, R>(&self, operation_name: &str, mut operation: F, mut on_retry: R) -> Attempted<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
        R: FnMut(&RetryNotice),
    {
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            "Operation succeeded after retry"
                        );
                    }
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient store failure, will retry after backoff"
                    );
                    on_retry(&RetryNotice {
                        attempt,
                        max_attempts: self.max_attempts,
                        delay,
                        cause: err.message().to_string(),
                    });
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if (self.retryable)(&err) {
                        error!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            error = %err,
                            "Operation failed: retries exhausted"
                        );
                    }
                    return Attempted {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

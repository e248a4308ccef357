//! Exponential backoff retry, adapted from `langgraph-core::retry::RetryPolicy`
//! to drive an actual async operation rather than just hand back delays, and
//! to honor a [`CancellationToken`] between attempts (§4.C4, §5).

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::error::{ResilienceError, Result};

/// Configuration for retrying a failed operation with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first (not a retry count).
    pub max_attempts: usize,
    pub initial_interval: Duration,
    pub backoff_factor: f64,
    pub max_interval: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(128),
            jitter: true,
        }
    }

    pub fn with_initial_interval(mut self, d: Duration) -> Self {
        self.initial_interval = d;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, d: Duration) -> Self {
        self.max_interval = d;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the attempt numbered `attempt` (0-indexed, 0 = first
    /// retry after the initial attempt failed).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.initial_interval.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval.as_secs_f64());
        let final_secs = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped * factor
        } else {
            capped
        };
        Duration::from_secs_f64(final_secs.max(0.0))
    }

    fn should_retry(&self, attempts_made: usize) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Runs `op` under this policy, sleeping between attempts and checking
/// `cancel` both before each attempt and during the backoff sleep. Returns
/// `ResilienceError::Cancelled` if cancellation wins a race with a retry
/// sleep, and `ResilienceError::RetryExhausted` once `max_attempts` attempts
/// have all failed.
///
/// `is_retryable` classifies each failure (§4.C4 "retryable error kinds"): a
/// non-retryable error stops the loop immediately and is returned as
/// `ResilienceError::Inner(err)`, exactly as if retry had not wrapped the
/// call at all — it never counts against `max_attempts` or gets folded into
/// a `RetryExhausted`.
pub async fn retry<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempts = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(ResilienceError::Cancelled);
        }

        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(ResilienceError::Inner(err));
                }
                if !policy.should_retry(attempts) {
                    return Err(ResilienceError::RetryExhausted {
                        attempts,
                        last: err,
                    });
                }
                let delay = policy.delay_for(attempts - 1);
                tracing::warn!(attempt = attempts, delay_ms = delay.as_millis() as u64, "retrying after failure");

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return Err(ResilienceError::Cancelled);
                    }
                }
            }
        }
    }
}

/// Predicate that treats every failure as retryable; the default for call
/// sites with no sub-classification of their own (e.g. a plain node error
/// with no "this was never attempted" cases to distinguish).
pub fn always_retryable<E>(_err: &E) -> bool {
    true
}

//! The two resilience stacks §4.C4/§4.C8 require the executor to assemble:
//!
//! - `timeout ∘ retry ∘ circuit_breaker` for SOURCE/EXECUTOR "provider" nodes
//!   (anything that calls out to an external system: exchange, broker, data
//!   feed) — the circuit breaker protects the provider from a retry storm,
//!   retry absorbs transient failures, and the outer timeout bounds the
//!   whole attempt sequence so one stuck node can't stall the run.
//! - `timeout` alone for every other node category, since there is no
//!   external dependency worth a breaker or blind retries around.
//!
//! Both are expressed here as plain async functions rather than a trait
//! object, since the node closure's concrete type differs per call site and
//! boxing it would cost an allocation the executor runs once per node.

use std::future::Future;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::circuit_breaker::CircuitBreaker;
use crate::error::{ResilienceError, Result};
use crate::retry::{self, RetryPolicy};

/// Full stack for provider nodes: circuit breaker gates the call, retry
/// re-attempts transient failures while the breaker stays closed, and an
/// outer deadline bounds the entire sequence of attempts.
///
/// This races the retry loop directly against the deadline rather than
/// routing through [`crate::timeout::with_timeout`] — that helper's
/// `map_err(ResilienceError::Inner)` is meant for a bare, unwrapped node
/// call (see [`execute_with_timeout`]) and would bury `retry`'s own
/// already-`ResilienceError`-typed outcome (a tripped breaker's
/// `CircuitOpen`, a `RetryExhausted`) behind an extra, spurious `Inner`
/// layer instead of surfacing it at its proper place alongside `Timeout`
/// and `Cancelled`.
pub async fn execute_with_full_resilience<F, Fut, T, E>(
    timeout: Duration,
    retry_policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let attempt = || breaker.call(&mut op);
    let is_retryable = |err: &ResilienceError<E>| !matches!(err, ResilienceError::CircuitOpen { .. });

    tokio::select! {
        result = retry::retry(retry_policy, cancel, attempt, is_retryable) => result,
        _ = tokio::time::sleep(timeout) => Err(ResilienceError::Timeout),
        _ = cancel.cancelled() => Err(ResilienceError::Cancelled),
    }
}

/// Timeout-only stack for nodes with no external dependency to protect.
pub async fn execute_with_timeout<Fut, T, E>(
    timeout: Duration,
    cancel: &CancellationToken,
    fut: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = std::result::Result<T, E>>,
{
    crate::timeout::with_timeout(timeout, cancel, fut).await
}

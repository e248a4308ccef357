//! Error type produced by the resilience wrappers (§4.C4, §6 error kinds).

use std::fmt;

/// Wraps an inner node error `E` with the outcome of the resilience layer
/// that surrounds it. The executor maps these onto the stable error-kind
/// tags in §6 (`NodeTimeout`, `CircuitOpen`, `RetryExhausted`, `Cancelled`)
/// without needing to know anything about retry counts or breaker names.
#[derive(Debug, thiserror::Error)]
pub enum ResilienceError<E> {
    #[error("operation timed out")]
    Timeout,

    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    #[error("retry exhausted after {attempts} attempt(s): {last}")]
    RetryExhausted { attempts: usize, last: E },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Inner(E),
}

impl<E> ResilienceError<E> {
    /// Maps the inner error type, leaving the resilience-layer variants
    /// untouched except for the ones that carry one.
    pub fn map_inner<F, E2>(self, f: F) -> ResilienceError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            ResilienceError::Timeout => ResilienceError::Timeout,
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::RetryExhausted { attempts, last } => ResilienceError::RetryExhausted {
                attempts,
                last: f(last),
            },
            ResilienceError::Cancelled => ResilienceError::Cancelled,
            ResilienceError::Inner(e) => ResilienceError::Inner(f(e)),
        }
    }

    /// True for failures that never reached the wrapped operation at all
    /// (circuit open, cancelled before the first attempt) — useful for
    /// deciding whether a retry budget was even consumed.
    pub fn is_preempted(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. } | ResilienceError::Cancelled)
    }
}

impl<E: fmt::Debug> ResilienceError<E> {
    pub fn last_error(&self) -> Option<&E> {
        match self {
            ResilienceError::RetryExhausted { last, .. } => Some(last),
            ResilienceError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T, E> = std::result::Result<T, ResilienceError<E>>;

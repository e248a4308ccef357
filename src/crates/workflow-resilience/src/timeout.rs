//! Per-call timeout, the outermost layer of the composed stack (§4.C4).

use std::future::Future;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::error::{ResilienceError, Result};

/// Runs `fut` to completion, failing with `ResilienceError::Timeout` if it
/// takes longer than `duration`, or `ResilienceError::Cancelled` if `cancel`
/// fires first.
pub async fn with_timeout<Fut, T, E>(
    duration: Duration,
    cancel: &CancellationToken,
    fut: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = std::result::Result<T, E>>,
{
    tokio::select! {
        result = fut => result.map_err(ResilienceError::Inner),
        _ = tokio::time::sleep(duration) => Err(ResilienceError::Timeout),
        _ = cancel.cancelled() => Err(ResilienceError::Cancelled),
    }
}

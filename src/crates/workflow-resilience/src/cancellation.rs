//! The cooperative cancellation token threaded through a run (§3, §5).
//!
//! A thin wrapper over `tokio_util`-style cancellation built on
//! `tokio::sync::watch`, so it is cloneable, observable (`is_cancelled`),
//! and awaitable (`cancelled()`) without pulling in an extra crate the rest
//! of the workspace does not otherwise need.

use tokio::sync::watch;

/// Signals cooperative cancellation of an entire run. Cloning shares the
/// same underlying signal; any clone can observe a cancellation triggered
/// through any other clone or the originating [`CancellationSource`].
#[derive(Clone, Debug)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token has been cancelled. A future `select!`ed
    /// against this is how node implementations are expected to observe
    /// cancellation mid-work (§4.C4 Timeout, §5 Suspension points).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

/// Owns the write side of a [`CancellationToken`]; dropped by the executor
/// once a run finishes.
#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

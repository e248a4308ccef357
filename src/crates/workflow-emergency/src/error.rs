//! Errors raised by the emergency controller (§4.C5, §6 `EmergencyHalted`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmergencyError {
    /// Raised by `AssertCanOperate`/`AssertCanTrade` when the current state
    /// forbids the operation. Carries the state that blocked it and the
    /// reason it was set, so the executor can surface both in the node's
    /// `node_failed` event.
    #[error("operation blocked by emergency state {state:?}: {reason}")]
    Halted { state: crate::state::EmergencyLevel, reason: String },

    #[error("emergency state persistence failed: {0}")]
    Persistence(#[from] workflow_state::StateError),

    #[error("failed to publish emergency event: {0}")]
    EventBus(#[from] workflow_events::EventBusError),

    #[error("stored emergency state failed to decode: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EmergencyError>;

//! Errors returned directly by [`crate::executor::Executor`] methods, plus
//! the stable per-node `error_kind` tags from §7.
//!
//! The tags are plain string constants rather than an enum: they travel in
//! [`crate::node::NodeExecutionResult::error_kind`], cross a JSON boundary in
//! events and checkpoints, and §7 specifies them as "stable string tags" —
//! callers match on the string, not on a Rust type.

/// A node's scheduling would have required breaking a cycle; only reachable
/// if a [`workflow_graph::ValidatedGraph`] was somehow constructed outside
/// `Graph::validate` (it is not possible through the public API, but
/// scheduling still checks rather than trusting the invariant blindly).
pub const ERR_GRAPH_INVALID: &str = "GraphInvalid";
pub const ERR_NODE_TIMEOUT: &str = "NodeTimeout";
pub const ERR_NODE_CONTRACT_VIOLATION: &str = "NodeContractViolation";
pub const ERR_CIRCUIT_OPEN: &str = "CircuitOpen";
pub const ERR_RETRY_EXHAUSTED: &str = "RetryExhausted";
pub const ERR_UPSTREAM_FAILED: &str = "UpstreamFailed";
pub const ERR_EMERGENCY_HALTED: &str = "EmergencyHalted";
pub const ERR_CANCELLED: &str = "Cancelled";
pub const ERR_STATE_BACKEND: &str = "StateBackendError";
pub const ERR_EVENT_BACKEND: &str = "EventBackendError";

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("graph is invalid: {0}")]
    GraphInvalid(#[from] workflow_graph::GraphError),

    #[error("node '{0}' has no registered implementation")]
    MissingImplementation(String),

    #[error("node '{node}' has kind '{kind}', which no factory in the kind registry produces")]
    UnknownKind { node: String, kind: String },

    #[error("state store error: {0}")]
    StateBackend(#[from] workflow_state::StateError),

    #[error("event bus error: {0}")]
    EventBackend(#[from] workflow_events::EventBusError),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

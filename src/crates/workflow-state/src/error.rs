//! Error types for the state store
//!
//! Mirrors `langgraph_checkpoint::error`'s shape: one `thiserror` enum, a
//! crate-local `Result` alias, and a variant per distinct failure mode the
//! backends can surface.

use thiserror::Error;

/// Errors returned by a [`crate::StateStore`] implementation.
///
/// Network errors from the remote backend are wrapped as
/// [`StateError::Backend`] — this is the `StateBackendError` tag from §7:
/// infrastructure outages bubble up distinctly from "key not found", which
/// is never an error (see [`crate::StateStore::get`]).
#[derive(Debug, Error)]
pub enum StateError {
    /// The network-attached backend returned an error (connection refused,
    /// timeout, protocol error, ...).
    #[error("state backend error: {0}")]
    Backend(String),

    /// A stored value could not be decoded back into the requested shape.
    #[error("state value for key '{key}' failed to deserialize: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// `Increment` was called on a key holding a value that is not an
    /// integer.
    #[error("key '{0}' does not hold an integer value")]
    NotAnInteger(String),
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

impl From<redis::RedisError> for StateError {
    fn from(err: redis::RedisError) -> Self {
        StateError::Backend(err.to_string())
    }
}

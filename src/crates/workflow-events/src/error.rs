use thiserror::Error;

/// Errors surfaced by an [`crate::EventBus`] implementation. Corresponds to
/// the `EventBackendError` tag in §7.
#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("event backend error: {0}")]
    Backend(String),

    #[error("pattern subscriptions are not supported by this backend")]
    PatternSubscribeUnsupported,

    #[error("invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, String),

    #[error("unknown subscription")]
    UnknownSubscription,
}

pub type Result<T> = std::result::Result<T, EventBusError>;

impl From<redis::RedisError> for EventBusError {
    fn from(err: redis::RedisError) -> Self {
        EventBusError::Backend(err.to_string())
    }
}

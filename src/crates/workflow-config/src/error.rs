//! Configuration and factory errors (§4.C6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML configuration {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to deserialize configuration: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("invalid $include directive: {0}")]
    Include(String),

    #[error("unsupported state store backend: {0}")]
    UnknownStateBackend(String),

    #[error("unsupported event bus backend: {0}")]
    UnknownEventBackend(String),

    #[error("failed to connect to network backend: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<workflow_state::StateError> for ConfigError {
    fn from(err: workflow_state::StateError) -> Self {
        ConfigError::Backend(err.to_string())
    }
}

impl From<workflow_events::EventBusError> for ConfigError {
    fn from(err: workflow_events::EventBusError) -> Self {
        ConfigError::Backend(err.to_string())
    }
}

impl From<workflow_emergency::EmergencyError> for ConfigError {
    fn from(err: workflow_emergency::EmergencyError) -> Self {
        ConfigError::Backend(err.to_string())
    }
}

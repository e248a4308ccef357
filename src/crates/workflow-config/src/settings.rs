//! The typed `Settings` object and its three environment presets (§4.C6).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use workflow_telemetry::{LogFormat, LogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StateStoreConfig {
    InProcess,
    Redis { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum EventBusConfig {
    InProcess,
    Redis { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDefaults {
    pub max_attempts: usize,
    pub initial_interval_ms: u64,
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
    pub jitter: bool,
}

impl RetryDefaults {
    pub fn to_policy(&self) -> workflow_resilience::RetryPolicy {
        workflow_resilience::RetryPolicy::new(self.max_attempts)
            .with_initial_interval(Duration::from_millis(self.initial_interval_ms))
            .with_backoff_factor(self.backoff_factor)
            .with_max_interval(Duration::from_millis(self.max_interval_ms))
            .with_jitter(self.jitter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerDefaults {
    pub failure_threshold: usize,
    pub timeout_duration_ms: u64,
    pub success_threshold: usize,
    pub failure_window_ms: u64,
}

impl CircuitBreakerDefaults {
    pub fn to_config(&self) -> workflow_resilience::CircuitBreakerConfig {
        workflow_resilience::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            timeout_duration: Duration::from_millis(self.timeout_duration_ms),
            success_threshold: self.success_threshold,
            failure_window: Duration::from_millis(self.failure_window_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceDefaults {
    pub default_node_timeout_ms: u64,
    pub retry: RetryDefaults,
    pub circuit_breaker: CircuitBreakerDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmergencyThresholds {
    /// Named risk limits checked by callers via
    /// `EmergencyController::check_risk_limit`; this map only carries the
    /// configured magnitudes, not the running values.
    pub risk_limits: HashMap<String, f64>,
    pub auto_halt_on_breach: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    pub state_store: StateStoreConfig,
    pub event_bus: EventBusConfig,
    pub logging: LoggingConfig,
    pub resilience: ResilienceDefaults,
    pub emergency: EmergencyThresholds,
}

impl Settings {
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            state_store: StateStoreConfig::InProcess,
            event_bus: EventBusConfig::InProcess,
            logging: LoggingConfig {
                format: LogFormat::Console,
                level: LogLevel::Debug,
            },
            resilience: ResilienceDefaults {
                default_node_timeout_ms: 30_000,
                retry: RetryDefaults {
                    max_attempts: 3,
                    initial_interval_ms: 500,
                    backoff_factor: 2.0,
                    max_interval_ms: 128_000,
                    jitter: true,
                },
                circuit_breaker: CircuitBreakerDefaults {
                    failure_threshold: 5,
                    timeout_duration_ms: 60_000,
                    success_threshold: 3,
                    failure_window_ms: 60_000,
                },
            },
            emergency: EmergencyThresholds::default(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            state_store: StateStoreConfig::Redis {
                url: "redis://localhost:6379".to_string(),
            },
            event_bus: EventBusConfig::Redis {
                url: "redis://localhost:6379".to_string(),
            },
            logging: LoggingConfig {
                format: LogFormat::Json,
                level: LogLevel::Info,
            },
            ..Self::development()
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            state_store: StateStoreConfig::Redis {
                url: "redis://localhost:6379".to_string(),
            },
            event_bus: EventBusConfig::Redis {
                url: "redis://localhost:6379".to_string(),
            },
            logging: LoggingConfig {
                format: LogFormat::Json,
                level: LogLevel::Warning,
            },
            emergency: EmergencyThresholds {
                auto_halt_on_breach: true,
                ..EmergencyThresholds::default()
            },
            ..Self::development()
        }
    }

    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self::development(),
            Environment::Staging => Self::staging(),
            Environment::Production => Self::production(),
        }
    }

    /// Applies the `SECTION_KEY`-style environment-variable overrides named
    /// in §4.C6: `STATE_STORE_BACKEND`/`STATE_STORE_URL`,
    /// `EVENT_BUS_BACKEND`/`EVENT_BUS_URL`, `LOGGING_FORMAT`, `LOGGING_LEVEL`.
    /// Unset variables leave the preset's value untouched.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(backend) = std::env::var("STATE_STORE_BACKEND") {
            let url = std::env::var("STATE_STORE_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
            self.state_store = match backend.as_str() {
                "redis" => StateStoreConfig::Redis { url },
                _ => StateStoreConfig::InProcess,
            };
        }
        if let Ok(backend) = std::env::var("EVENT_BUS_BACKEND") {
            let url = std::env::var("EVENT_BUS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
            self.event_bus = match backend.as_str() {
                "redis" => EventBusConfig::Redis { url },
                _ => EventBusConfig::InProcess,
            };
        }
        if let Ok(format) = std::env::var("LOGGING_FORMAT") {
            self.logging.format = match format.as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Console,
            };
        }
        if let Ok(level) = std::env::var("LOGGING_LEVEL") {
            self.logging.level = match level.to_lowercase().as_str() {
                "debug" => LogLevel::Debug,
                "warning" | "warn" => LogLevel::Warning,
                "error" => LogLevel::Error,
                _ => LogLevel::Info,
            };
        }
        self
    }
}

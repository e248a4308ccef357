//! Process-wide `tracing` subscriber setup
//!
//! Two output modes per §4.C3 / §6: `console` (human-readable, colored —
//! development/staging) and `json` (single-line JSON — production).

use tracing_subscriber::EnvFilter;

/// Output format for the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Console,
    Json,
}

/// Minimum level recorded, mirroring the `DEBUG | INFO | WARNING | ERROR`
/// options in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_tracing(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install the global `tracing` subscriber. Call once at process startup
/// (the CLI binary and the factory's test harness both do this).
///
/// Idempotent against repeated calls within the same test binary: a second
/// call is a no-op rather than a panic, since `tracing`'s global dispatcher
/// can only be set once per process.
pub fn init_tracing(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_tracing()));

    let result = match format {
        LogFormat::Console => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(true)
            .with_target(false)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .try_init(),
    };

    if let Err(err) = result {
        tracing::debug!("tracing subscriber already initialized: {err}");
    }
}

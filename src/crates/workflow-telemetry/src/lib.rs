//! Structured logging and correlation-id propagation for the workflow engine
//! (`C3` in the design: §4.C3).
//!
//! See [`correlation`] for task-local correlation id propagation and
//! [`logger::Logger`] for the key/value record API.

pub mod correlation;
pub mod init;
pub mod logger;

pub use correlation::{current_correlation_id, new_run_id, with_correlation_id};
pub use init::{init_tracing, LogFormat, LogLevel};
pub use logger::Logger;

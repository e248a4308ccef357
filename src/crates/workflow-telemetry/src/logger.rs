//! Structured, composable logger
//!
//! A [`Logger`] is a thin handle around a `tracing::Span` carrying a set of
//! key/value fields (`bot_id`, `strategy_id`, ...). [`Logger::with`] derives
//! a child logger that prepends additional fields to every record emitted
//! through it, matching the `logger.With(bot_id=…, strategy_id=…)` contract
//! in §4.C3. The ambient correlation id from [`crate::correlation`] is
//! attached automatically by the `tracing` subscriber, not by `Logger`
//! itself, so records never need to carry it explicitly.

use serde_json::Value;
use std::collections::BTreeMap;

/// A structured logger scoped to zero or more ambient fields.
///
/// Cloning a `Logger` is cheap; the fields are stored once and re-emitted on
/// every call to [`Logger::event`].
#[derive(Debug, Clone, Default)]
pub struct Logger {
    fields: BTreeMap<String, Value>,
}

impl Logger {
    /// A logger with no ambient fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a child logger that also carries `fields`.
    ///
    /// Later calls win on key collision, matching the "prepend" semantics of
    /// repeated `.with(...)` calls closest to the emit site taking
    /// precedence in the rendered record.
    pub fn with(&self, fields: impl IntoIterator<Item = (&'static str, Value)>) -> Logger {
        let mut merged = self.fields.clone();
        for (k, v) in fields {
            merged.insert(k.to_string(), v);
        }
        Logger { fields: merged }
    }

    /// Emit a structured record.
    ///
    /// `event` is a stable, machine-readable identifier (e.g.
    /// `"node_started"`), never a prose sentence — §4.C3 requires this so
    /// downstream consumers can match on it.
    pub fn event(&self, level: tracing::Level, event: &str, extra: &[(&str, Value)]) {
        let mut fields: BTreeMap<&str, &Value> = BTreeMap::new();
        for (k, v) in &self.fields {
            fields.insert(k.as_str(), v);
        }
        for (k, v) in extra {
            fields.insert(k, v);
        }
        let payload = serde_json::to_string(&fields).unwrap_or_default();
        match level {
            tracing::Level::ERROR => tracing::error!(event, fields = %payload),
            tracing::Level::WARN => tracing::warn!(event, fields = %payload),
            tracing::Level::DEBUG => tracing::debug!(event, fields = %payload),
            tracing::Level::TRACE => tracing::trace!(event, fields = %payload),
            tracing::Level::INFO => tracing::info!(event, fields = %payload),
        }
    }

    pub fn info(&self, event: &str, extra: &[(&str, Value)]) {
        self.event(tracing::Level::INFO, event, extra)
    }

    pub fn warn(&self, event: &str, extra: &[(&str, Value)]) {
        self.event(tracing::Level::WARN, event, extra)
    }

    pub fn error(&self, event: &str, extra: &[(&str, Value)]) {
        self.event(tracing::Level::ERROR, event, extra)
    }

    pub fn debug(&self, event: &str, extra: &[(&str, Value)]) {
        self.event(tracing::Level::DEBUG, event, extra)
    }
}

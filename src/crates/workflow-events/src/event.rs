//! The [`Event`] envelope published on the bus (§3, §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message published on a channel.
///
/// `payload` is expected to be a JSON object carrying at least
/// `correlation_id`, per §3 ("Every event payload contains the
/// correlation_id."); the bus itself does not enforce this — producers
/// (the executor, the emergency controller) are responsible for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub channel: String,
    pub payload: Value,
}

impl Event {
    pub fn new(channel: impl Into<String>, payload: Value) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    /// The `correlation_id` field of the payload, if present and a string.
    pub fn correlation_id(&self) -> Option<&str> {
        self.payload.get("correlation_id").and_then(Value::as_str)
    }
}

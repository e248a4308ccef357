//! Per-client event filters (§4.C9: "optionally filtered by per-client
//! subscriptions (by workflow_id, bot_id, strategy_id)"), grounded on
//! `orchestrator::api::ws::filters::EventFilter`/`FilterManager` but
//! matching against the `workflow_events` payload fields from §6 rather
//! than that crate's own `RealtimeEvent` enum.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A client's subscription criteria. Every populated field narrows the
/// match; an empty filter (the default) matches every event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub workflow_id: Option<String>,
    pub bot_id: Option<String>,
    pub strategy_id: Option<String>,
}

impl EventFilter {
    pub fn is_empty(&self) -> bool {
        self.workflow_id.is_none() && self.bot_id.is_none() && self.strategy_id.is_none()
    }

    /// Whether `payload` (an event envelope per §6) satisfies this filter.
    /// A field absent from the filter is not checked; a field present in
    /// the filter but absent (or mismatched) from the payload fails the
    /// match.
    pub fn matches(&self, payload: &Value) -> bool {
        field_matches(&self.workflow_id, payload, "workflow_id")
            && field_matches(&self.bot_id, payload, "bot_id")
            && field_matches(&self.strategy_id, payload, "strategy_id")
    }
}

fn field_matches(want: &Option<String>, payload: &Value, key: &str) -> bool {
    match want {
        None => true,
        Some(expected) => payload.get(key).and_then(Value::as_str) == Some(expected.as_str()),
    }
}

/// Registry of live per-client filters, keyed by client id. Shared (`Arc`)
/// between the WebSocket accept loop and whatever sets a filter from an
/// inbound client message.
#[derive(Clone, Default)]
pub struct FilterManager {
    filters: Arc<DashMap<String, EventFilter>>,
}

impl FilterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, client_id: &str, filter: EventFilter) {
        self.filters.insert(client_id.to_string(), filter);
    }

    pub fn clear(&self, client_id: &str) {
        self.filters.remove(client_id);
    }

    /// Whether `payload` should be delivered to `client_id`. A client with
    /// no registered filter receives everything.
    pub fn should_send(&self, client_id: &str, payload: &Value) -> bool {
        match self.filters.get(client_id) {
            Some(filter) => filter.matches(payload),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_matches_everything() {
        let filter = EventFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&json!({"workflow_id": "g1"})));
    }

    #[test]
    fn workflow_id_filter_excludes_other_graphs() {
        let filter = EventFilter { workflow_id: Some("g1".to_string()), ..Default::default() };
        assert!(filter.matches(&json!({"workflow_id": "g1"})));
        assert!(!filter.matches(&json!({"workflow_id": "g2"})));
        assert!(!filter.matches(&json!({})));
    }

    #[test]
    fn combined_fields_are_conjunctive() {
        let filter = EventFilter {
            workflow_id: Some("g1".to_string()),
            bot_id: Some("bot-7".to_string()),
            strategy_id: None,
        };
        assert!(filter.matches(&json!({"workflow_id": "g1", "bot_id": "bot-7", "strategy_id": "s1"})));
        assert!(!filter.matches(&json!({"workflow_id": "g1", "bot_id": "bot-8"})));
    }

    #[test]
    fn manager_defaults_to_sending_when_unfiltered() {
        let manager = FilterManager::new();
        assert!(manager.should_send("c1", &json!({"workflow_id": "g1"})));

        manager.set("c1", EventFilter { workflow_id: Some("g2".to_string()), ..Default::default() });
        assert!(!manager.should_send("c1", &json!({"workflow_id": "g1"})));

        manager.clear("c1");
        assert!(manager.should_send("c1", &json!({"workflow_id": "g1"})));
    }
}

//! The infrastructure factory (§4.C6): one call wires C1-C5 together from a
//! [`Settings`] object; `close()` reverses it in LIFO order.

use std::sync::Arc;

use workflow_emergency::EmergencyController;
use workflow_events::EventBus;
use workflow_resilience::{CircuitBreaker, CircuitBreakerConfig};
use workflow_state::StateStore;

use crate::error::Result;
use crate::settings::{EventBusConfig, Settings, StateStoreConfig};

/// The wired-up process-wide infrastructure. Owned by whoever called
/// [`build`]; everything else in the process borrows it (§3 Ownership &
/// lifecycle).
pub struct Infrastructure {
    pub state: Arc<dyn StateStore>,
    pub events: Arc<dyn EventBus>,
    pub emergency: Arc<EmergencyController>,
    pub settings: Settings,
}

impl Infrastructure {
    /// Builds a [`CircuitBreaker`] named `name`, wired to this
    /// infrastructure's event bus and seeded with the configured circuit
    /// breaker defaults (§4.C6 `Factory.newCircuitBreaker`).
    pub fn new_circuit_breaker(&self, name: impl Into<Arc<str>>) -> CircuitBreaker {
        let config: CircuitBreakerConfig = self.settings.resilience.circuit_breaker.to_config();
        CircuitBreaker::new(name, config).with_events(self.events.clone())
    }

    /// Releases resources in the reverse of build order: persist the
    /// emergency state one last time, stop the event listener and release
    /// its connections, then close the state store.
    pub async fn close(&self) -> Result<()> {
        self.emergency.persist_state(self.state.as_ref()).await?;
        self.events.close().await?;
        self.state.close().await?;
        Ok(())
    }
}

/// Wires state store, event bus, logger, and emergency controller from
/// `settings`, starting the event listener and restoring emergency state
/// from the store before returning.
pub async fn build(settings: Settings) -> Result<Infrastructure> {
    workflow_telemetry::init_tracing(settings.logging.format, settings.logging.level);

    let state: Arc<dyn StateStore> = match &settings.state_store {
        StateStoreConfig::InProcess => Arc::new(workflow_state::InProcessStore::new()),
        StateStoreConfig::Redis { url } => Arc::new(workflow_state::RedisStore::connect(url).await?),
    };

    let events: Arc<dyn EventBus> = match &settings.event_bus {
        EventBusConfig::InProcess => Arc::new(workflow_events::InProcessBus::new()),
        EventBusConfig::Redis { url } => Arc::new(workflow_events::RedisBus::connect(url).await?),
    };
    events.start_listening().await?;

    let emergency = Arc::new(EmergencyController::new(events.clone()));
    emergency.restore_state(state.as_ref()).await?;

    Ok(Infrastructure {
        state,
        events,
        emergency,
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_and_close_development_preset() {
        let infra = build(Settings::development()).await.unwrap();
        assert!(infra.emergency.can_operate());

        let breaker = infra.new_circuit_breaker("node:source-1");
        assert_eq!(breaker.name(), "node:source-1");

        infra.close().await.unwrap();
    }

    #[tokio::test]
    async fn restores_emergency_state_across_a_second_build() {
        let infra = build(Settings::development()).await.unwrap();
        infra
            .emergency
            .set_state(workflow_emergency::EmergencyLevel::Halt, "maintenance")
            .await
            .unwrap();
        infra.emergency.persist_state(infra.state.as_ref()).await.unwrap();

        // Reuse the same in-process store by constructing a second
        // infrastructure that shares it, mimicking "process restart"
        // without actually losing the in-memory map.
        let second = Infrastructure {
            state: infra.state.clone(),
            events: infra.events.clone(),
            emergency: Arc::new(EmergencyController::new(infra.events.clone())),
            settings: Settings::development(),
        };
        second.emergency.restore_state(second.state.as_ref()).await.unwrap();
        assert_eq!(second.emergency.state().level, workflow_emergency::EmergencyLevel::Halt);
    }
}

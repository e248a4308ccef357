//! The emergency controller (§4.C5): a single piece of shared, global state
//! gating whether nodes may run at all, with risk-limit monitoring and
//! persistence across restarts.

use std::sync::Arc;

use parking_lot::RwLock;
use workflow_events::EventBus;
use workflow_state::StateStore;

use crate::error::{EmergencyError, Result};
use crate::state::{EmergencyLevel, EmergencyState};

/// Node categories relevant to gating (§3 Node descriptor, §4.C5 rules).
/// Only the distinction "is this an EXECUTOR node" matters here; the full
/// category enum lives in `workflow-graph` and maps onto this one bit via
/// [`NodeKind::Executor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Executor,
    Other,
}

type Subscriber = Arc<dyn Fn(&EmergencyState) + Send + Sync>;

/// Global gate in front of node execution. One instance per process, owned
/// by the Factory (§4.C6) and shared (`Arc`) with the executor.
pub struct EmergencyController {
    state: RwLock<EmergencyState>,
    subscribers: RwLock<Vec<Subscriber>>,
    events: Arc<dyn EventBus>,
}

impl EmergencyController {
    pub fn new(events: Arc<dyn EventBus>) -> Self {
        Self {
            state: RwLock::new(EmergencyState::normal()),
            subscribers: RwLock::new(Vec::new()),
            events,
        }
    }

    pub fn state(&self) -> EmergencyState {
        self.state.read().clone()
    }

    /// Sets a new level, notifying in-process subscribers and publishing
    /// `emergency_state_changed` on the event bus. Transitions are logged
    /// and totally ordered by [`EmergencyLevel`]'s derive, but any level may
    /// follow any other — e.g. an operator clearing HALT back to NORMAL is
    /// a legitimate transition, not just monotone escalation.
    pub async fn set_state(&self, level: EmergencyLevel, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        let new_state = EmergencyState {
            level,
            reason: reason.clone(),
            since: chrono::Utc::now(),
        };

        {
            let mut guard = self.state.write();
            *guard = new_state.clone();
        }

        tracing::warn!(level = %level, %reason, "emergency state changed");

        for subscriber in self.subscribers.read().iter() {
            subscriber(&new_state);
        }

        let correlation_id = workflow_telemetry::current_correlation_id();
        self.events
            .publish(
                workflow_events::WORKFLOW_EVENTS_CHANNEL,
                serde_json::json!({
                    "type": "emergency_state_changed",
                    "timestamp": new_state.since,
                    "level": level,
                    "reason": reason,
                    "since": new_state.since,
                    "correlation_id": correlation_id,
                }),
            )
            .await?;

        Ok(())
    }

    /// All operations allowed up to and including ALERT; blocked at HALT
    /// and SHUTDOWN for EXECUTOR-category work, blocked entirely at
    /// SHUTDOWN (§4.C5 rules).
    pub fn can_operate(&self) -> bool {
        self.state.read().level < EmergencyLevel::Shutdown
    }

    pub fn can_trade(&self) -> bool {
        self.state.read().level < EmergencyLevel::Halt
    }

    pub fn assert_can_operate(&self) -> Result<()> {
        let state = self.state.read().clone();
        if state.level >= EmergencyLevel::Shutdown {
            return Err(EmergencyError::Halted {
                state: state.level,
                reason: state.reason,
            });
        }
        Ok(())
    }

    pub fn assert_can_trade(&self) -> Result<()> {
        let state = self.state.read().clone();
        if state.level >= EmergencyLevel::Halt {
            return Err(EmergencyError::Halted {
                state: state.level,
                reason: state.reason,
            });
        }
        Ok(())
    }

    /// Convenience used by the executor's per-node gating step (§4.C8 step
    /// 2): operate permission first, trade permission additionally for
    /// EXECUTOR nodes.
    pub fn assert_can_run(&self, kind: NodeKind) -> Result<()> {
        self.assert_can_operate()?;
        if kind == NodeKind::Executor {
            self.assert_can_trade()?;
        }
        Ok(())
    }

    /// Registers an in-process callback invoked synchronously whenever
    /// `set_state` runs, in addition to the `emergency_state_changed` event
    /// published on the bus. Useful for components (a CLI status line, a
    /// metrics gauge) that want a cheap hook without subscribing to events.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&EmergencyState) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(handler));
    }

    /// Compares `|current|` against `|limit|` — sign-agnostic magnitude
    /// comparison, so a limit of -500 is exceeded by -520 as well as by 520
    /// (§4.C5: "respects sign semantics for losses"). Emits
    /// `risk_limit_exceeded` and optionally calls `set_state(HALT, ..)` when
    /// the limit is breached and `auto_halt` is set.
    pub async fn check_risk_limit(
        &self,
        name: &str,
        current: f64,
        limit: f64,
        auto_halt: bool,
    ) -> Result<bool> {
        let exceeded = current.abs() >= limit.abs();
        if !exceeded {
            return Ok(false);
        }

        let correlation_id = workflow_telemetry::current_correlation_id();
        self.events
            .publish(
                workflow_events::WORKFLOW_EVENTS_CHANNEL,
                serde_json::json!({
                    "type": "risk_limit_exceeded",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "name": name,
                    "current": current,
                    "limit": limit,
                    "correlation_id": correlation_id,
                }),
            )
            .await?;
        tracing::error!(name, current, limit, "risk limit exceeded");

        if auto_halt {
            self.set_state(
                EmergencyLevel::Halt,
                format!("risk limit '{name}' exceeded: |{current}| >= |{limit}|"),
            )
            .await?;
        }

        Ok(true)
    }

    /// Writes the current state to `workflow_state::keys::EMERGENCY_STATE`
    /// (§4.C5 Persistence, §6).
    pub async fn persist_state(&self, store: &dyn StateStore) -> Result<()> {
        let state = self.state.read().clone();
        let value = serde_json::to_value(&state)?;
        store
            .set(workflow_state::keys::EMERGENCY_STATE, value, None)
            .await?;
        Ok(())
    }

    /// Reads back a previously persisted state on startup, so an
    /// operator-triggered SHUTDOWN survives a process restart (§4.C5). A
    /// missing key leaves the controller at its NORMAL default.
    pub async fn restore_state(&self, store: &dyn StateStore) -> Result<()> {
        let Some(value) = store.get(workflow_state::keys::EMERGENCY_STATE).await? else {
            return Ok(());
        };
        let restored: EmergencyState = serde_json::from_value(value)?;
        tracing::info!(level = %restored.level, reason = %restored.reason, "restored emergency state");
        *self.state.write() = restored;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use workflow_events::InProcessBus;
    use workflow_state::InProcessStore;

    fn controller() -> EmergencyController {
        EmergencyController::new(Arc::new(InProcessBus::new()))
    }

    #[test]
    fn normal_allows_everything() {
        let ctl = controller();
        assert!(ctl.can_operate());
        assert!(ctl.can_trade());
        assert!(ctl.assert_can_run(NodeKind::Executor).is_ok());
    }

    #[tokio::test]
    async fn halt_blocks_trading_but_not_other_categories() {
        let ctl = controller();
        ctl.set_state(EmergencyLevel::Halt, "risk breach").await.unwrap();

        assert!(ctl.can_operate());
        assert!(!ctl.can_trade());
        assert!(ctl.assert_can_run(NodeKind::Other).is_ok());
        assert!(matches!(
            ctl.assert_can_run(NodeKind::Executor),
            Err(EmergencyError::Halted { state: EmergencyLevel::Halt, .. })
        ));
    }

    #[tokio::test]
    async fn shutdown_blocks_everything() {
        let ctl = controller();
        ctl.set_state(EmergencyLevel::Shutdown, "operator kill switch")
            .await
            .unwrap();

        assert!(!ctl.can_operate());
        assert!(matches!(
            ctl.assert_can_run(NodeKind::Other),
            Err(EmergencyError::Halted { state: EmergencyLevel::Shutdown, .. })
        ));
    }

    #[tokio::test]
    async fn negative_limit_exceeded_by_more_negative_value() {
        let ctl = controller();
        let exceeded = ctl.check_risk_limit("daily_pnl", -520.0, -500.0, false).await.unwrap();
        assert!(exceeded);
    }

    #[tokio::test]
    async fn risk_limit_not_exceeded_within_bounds() {
        let ctl = controller();
        let exceeded = ctl.check_risk_limit("daily_pnl", -300.0, -500.0, false).await.unwrap();
        assert!(!exceeded);
    }

    #[tokio::test]
    async fn auto_halt_transitions_to_halt_on_breach() {
        let ctl = controller();
        ctl.check_risk_limit("daily_pnl", -600.0, -500.0, true).await.unwrap();
        assert_eq!(ctl.state().level, EmergencyLevel::Halt);
    }

    #[tokio::test]
    async fn subscribers_fire_on_every_transition() {
        let ctl = controller();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        ctl.subscribe(move |_state| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        ctl.set_state(EmergencyLevel::Alert, "watching").await.unwrap();
        ctl.set_state(EmergencyLevel::Normal, "cleared").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persist_and_restore_round_trip() {
        let store = InProcessStore::new();
        let ctl = controller();
        ctl.set_state(EmergencyLevel::Shutdown, "operator kill switch")
            .await
            .unwrap();
        ctl.persist_state(&store).await.unwrap();

        let restored = controller();
        restored.restore_state(&store).await.unwrap();
        assert_eq!(restored.state().level, EmergencyLevel::Shutdown);
        assert_eq!(restored.state().reason, "operator kill switch");
    }

    #[tokio::test]
    async fn restore_without_prior_persistence_stays_normal() {
        let store = InProcessStore::new();
        let ctl = controller();
        ctl.restore_state(&store).await.unwrap();
        assert_eq!(ctl.state().level, EmergencyLevel::Normal);
    }
}

//! Three-state circuit breaker (§4.C4).
//!
//! Config shape (`failure_threshold`, `timeout_duration`, `success_threshold`,
//! `failure_window`) is grounded on the `CircuitBreakerConfig` used by the
//! execution engine in the `garysomerhalder` LangGraph port found in the
//! retrieval pack. Failures are counted within a sliding `failure_window`
//! rather than since-forever, so an old failure can't keep a breaker
//! permanently one strike away from OPEN.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use workflow_events::EventBus;

use crate::error::{ResilienceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures within `failure_window` that trip the breaker to OPEN.
    pub failure_threshold: usize,
    /// How long the breaker stays OPEN before probing with a HALF_OPEN trial.
    pub timeout_duration: Duration,
    /// Consecutive successes in HALF_OPEN needed to return to CLOSED.
    pub success_threshold: usize,
    /// Sliding window over which failures are counted towards the threshold.
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_duration: Duration::from_secs(60),
            success_threshold: 3,
            failure_window: Duration::from_secs(60),
        }
    }
}

struct Inner {
    state: CircuitState,
    failures: VecDeque<Instant>,
    half_open_successes: usize,
    opened_at: Option<Instant>,
}

/// A single named circuit breaker. Cheap to clone (shares its state via
/// `Arc`); the executor keeps one per node, keyed by node id (§4.C8).
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
    events: Option<Arc<dyn EventBus>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                half_open_successes: 0,
                opened_at: None,
            })),
            events: None,
        }
    }

    /// Attaches an event bus so state transitions publish `circuit_opened` /
    /// `circuit_closed` events (§3, §6) carrying `{name, state}`.
    pub fn with_events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Decides whether a call is currently allowed through, transitioning
    /// OPEN -> HALF_OPEN once `timeout_duration` has elapsed.
    fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.timeout_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    tracing::info!(breaker = %self.name, "circuit half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    fn prune_window(inner: &mut Inner, window: Duration) {
        let cutoff = Instant::now() - window;
        while matches!(inner.failures.front(), Some(t) if *t < cutoff) {
            inner.failures.pop_front();
        }
    }

    async fn emit(&self, new_state: CircuitState) {
        if let Some(events) = &self.events {
            let event_type = match new_state {
                CircuitState::Open => "circuit_opened",
                CircuitState::Closed => "circuit_closed",
                CircuitState::HalfOpen => return,
            };
            let payload = serde_json::json!({
                "type": event_type,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "correlation_id": workflow_telemetry::current_correlation_id(),
                "name": self.name.as_ref(),
                "state": new_state.as_str(),
            });
            if let Err(err) = events.publish(workflow_events::WORKFLOW_EVENTS_CHANNEL, payload).await {
                tracing::warn!(breaker = %self.name, %err, "failed to publish circuit breaker event");
            }
        }
    }

    fn record_success(&self) -> Option<CircuitState> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failures.clear();
                None
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures.clear();
                    inner.half_open_successes = 0;
                    Some(CircuitState::Closed)
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    fn record_failure(&self) -> Option<CircuitState> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_successes = 0;
                Some(CircuitState::Open)
            }
            CircuitState::Closed => {
                let now = Instant::now();
                inner.failures.push_back(now);
                Self::prune_window(&mut inner, self.config.failure_window);
                if inner.failures.len() >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    Some(CircuitState::Open)
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    /// Runs `op` through the breaker: rejects immediately with
    /// `CircuitOpen` while tripped, otherwise runs it and updates state
    /// based on the outcome.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, E>>,
    {
        if !self.allow() {
            return Err(ResilienceError::CircuitOpen {
                name: self.name.to_string(),
            });
        }

        match op().await {
            Ok(value) => {
                if let Some(new_state) = self.record_success() {
                    self.emit(new_state).await;
                }
                Ok(value)
            }
            Err(err) => {
                if let Some(new_state) = self.record_failure() {
                    tracing::warn!(breaker = %self.name, state = new_state.as_str(), "circuit breaker tripped");
                    self.emit(new_state).await;
                }
                Err(ResilienceError::Inner(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_events::InProcessBus;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            timeout_duration: Duration::from_millis(50),
            success_threshold: 2,
            failure_window: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("node-a", config());

        for _ in 0..2 {
            let _: Result<(), &str> = breaker.call(|| async { Err("boom") }).await;
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        let result: Result<(), &str> = breaker.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn half_open_probe_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new("node-b", config());
        for _ in 0..2 {
            let _: Result<(), &str> = breaker.call(|| async { Err("boom") }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(60)).await;

        for _ in 0..2 {
            let r: Result<(), &str> = breaker.call(|| async { Ok(()) }).await;
            assert!(r.is_ok());
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new("node-c", config());
        for _ in 0..2 {
            let _: Result<(), &str> = breaker.call(|| async { Err("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        let _: Result<(), &str> = breaker.call(|| async { Err("still broken") }).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn emits_event_on_open() {
        let bus = Arc::new(InProcessBus::new());
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe(
            workflow_events::WORKFLOW_EVENTS_CHANNEL,
            Arc::new(move |_event| {
                let seen2 = seen2.clone();
                Box::pin(async move {
                    seen2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                })
            }),
        )
        .await
        .unwrap();

        let breaker = CircuitBreaker::new("node-d", config()).with_events(bus);
        for _ in 0..2 {
            let _: Result<(), &str> = breaker.call(|| async { Err("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

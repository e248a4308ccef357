use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use workflow_emergency::{EmergencyController, EmergencyLevel};
use workflow_events::InProcessBus;
use workflow_executor::{Executor, InitialInputs, Node, NodeError, NodeExecutionContext, NodeRegistry, NodeStatus, RunStatus};
use workflow_graph::{Connection, ConnectionEndpoint, Graph, NodeCategory, NodeDescriptor, PortSpec};
use workflow_resilience::{CircuitBreakerConfig, RetryPolicy};
use workflow_state::InProcessStore;

fn port(name: &str) -> PortSpec {
    PortSpec { name: name.to_string(), type_tag: "any".to_string() }
}

fn descriptor(id: &str, category: NodeCategory, inputs: &[&str], outputs: &[&str]) -> NodeDescriptor {
    NodeDescriptor {
        id: id.to_string(),
        category,
        kind: "test".to_string(),
        input_ports: inputs.iter().map(|n| port(n)).collect(),
        output_ports: outputs.iter().map(|n| port(n)).collect(),
        properties: Value::Null,
        extra: serde_json::Map::new(),
    }
}

fn connection(from: &str, from_idx: usize, to: &str, to_idx: usize) -> Connection {
    Connection {
        from: ConnectionEndpoint { node: from.to_string(), index: from_idx },
        to: ConnectionEndpoint { node: to.to_string(), index: to_idx },
        extra: serde_json::Map::new(),
    }
}

fn test_executor(emergency: Arc<EmergencyController>) -> Executor {
    Executor::new(
        Arc::new(InProcessStore::new()),
        Arc::new(InProcessBus::new()),
        emergency,
        Duration::from_secs(5),
        RetryPolicy::new(3).with_initial_interval(Duration::from_millis(1)).with_jitter(false),
        CircuitBreakerConfig { failure_threshold: 2, timeout_duration: Duration::from_millis(50), success_threshold: 1, failure_window: Duration::from_secs(60) },
    )
}

fn normal_controller() -> Arc<EmergencyController> {
    Arc::new(EmergencyController::new(Arc::new(InProcessBus::new())))
}

/// Doubles a numeric `value` input into a `value` output.
struct Doubler;

#[async_trait]
impl Node for Doubler {
    fn descriptor(&self) -> &NodeDescriptor {
        static DESC: std::sync::OnceLock<NodeDescriptor> = std::sync::OnceLock::new();
        DESC.get_or_init(|| descriptor("double", NodeCategory::Transform, &["value"], &["value"]))
    }

    async fn execute(&self, ctx: &NodeExecutionContext) -> Result<HashMap<String, Value>, NodeError> {
        let n = ctx.inputs.get("value").and_then(Value::as_i64).unwrap_or(0);
        let mut out = HashMap::new();
        out.insert("value".to_string(), json!(n * 2));
        Ok(out)
    }
}

/// A SOURCE node that emits a fixed value, failing its first `fail_times`
/// calls so resilience behavior (retry, circuit breaker) is exercisable.
struct FlakySource {
    desc: NodeDescriptor,
    value: i64,
    fail_times: usize,
    calls: AtomicUsize,
}

impl FlakySource {
    fn new(id: &'static str, value: i64, fail_times: usize) -> Self {
        Self {
            desc: descriptor(id, NodeCategory::Source, &[], &["value"]),
            value,
            fail_times,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Node for FlakySource {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.desc
    }

    async fn execute(&self, _ctx: &NodeExecutionContext) -> Result<HashMap<String, Value>, NodeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_times {
            return Err("transient upstream failure".into());
        }
        let mut out = HashMap::new();
        out.insert("value".to_string(), json!(self.value));
        Ok(out)
    }
}

/// A node that never returns its declared output port.
struct ContractBreaker;

#[async_trait]
impl Node for ContractBreaker {
    fn descriptor(&self) -> &NodeDescriptor {
        static DESC: std::sync::OnceLock<NodeDescriptor> = std::sync::OnceLock::new();
        DESC.get_or_init(|| descriptor("contract_breaker", NodeCategory::Transform, &[], &["value"]))
    }

    async fn execute(&self, _ctx: &NodeExecutionContext) -> Result<HashMap<String, Value>, NodeError> {
        Ok(HashMap::new())
    }
}

/// An EXECUTOR-category node used to confirm emergency gating.
struct PlaceTrade {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Node for PlaceTrade {
    fn descriptor(&self) -> &NodeDescriptor {
        static DESC: std::sync::OnceLock<NodeDescriptor> = std::sync::OnceLock::new();
        DESC.get_or_init(|| descriptor("place_trade", NodeCategory::Executor, &["value"], &["order_id"]))
    }

    async fn execute(&self, _ctx: &NodeExecutionContext) -> Result<HashMap<String, Value>, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = HashMap::new();
        out.insert("order_id".to_string(), json!("order-1"));
        Ok(out)
    }
}

#[tokio::test]
async fn empty_graph_completes_immediately() {
    let graph = Graph::new("g-empty").validate().unwrap();
    let executor = test_executor(normal_controller());
    let nodes: NodeRegistry = HashMap::new();

    let result = executor.execute(&graph, &nodes, InitialInputs::new(), serde_json::Map::new()).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.per_node_results.is_empty());
}

#[tokio::test]
async fn completes_a_simple_diamond_with_initial_inputs() {
    let graph = Graph::new("g-diamond")
        .add_node(descriptor("feed", NodeCategory::Source, &[], &["value"]))
        .add_node(descriptor("double", NodeCategory::Transform, &["value"], &["value"]))
        .add_connection(connection("feed", 0, "double", 0))
        .validate()
        .unwrap();

    let mut nodes: NodeRegistry = HashMap::new();
    nodes.insert("feed".to_string(), Arc::new(FlakySource::new("feed", 21, 0)));
    nodes.insert("double".to_string(), Arc::new(Doubler));

    let executor = test_executor(normal_controller());
    let result = executor.execute(&graph, &nodes, InitialInputs::new(), serde_json::Map::new()).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    let doubled = &result.per_node_results["double"];
    assert_eq!(doubled.status, NodeStatus::Completed);
    assert_eq!(doubled.outputs["value"], json!(42));
}

#[tokio::test]
async fn retries_a_provider_node_before_succeeding() {
    let graph = Graph::new("g-retry")
        .add_node(descriptor("feed", NodeCategory::Source, &[], &["value"]))
        .validate()
        .unwrap();

    let mut nodes: NodeRegistry = HashMap::new();
    nodes.insert("feed".to_string(), Arc::new(FlakySource::new("feed", 10, 2)));

    let executor = test_executor(normal_controller());
    let result = executor.execute(&graph, &nodes, InitialInputs::new(), serde_json::Map::new()).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.per_node_results["feed"].outputs["value"], json!(10));
}

#[tokio::test]
async fn downstream_node_is_skipped_as_upstream_failed() {
    let graph = Graph::new("g-upstream-fail")
        .add_node(descriptor("feed", NodeCategory::Source, &[], &["value"]))
        .add_node(descriptor("double", NodeCategory::Transform, &["value"], &["value"]))
        .add_connection(connection("feed", 0, "double", 0))
        .validate()
        .unwrap();

    let mut nodes: NodeRegistry = HashMap::new();
    // Always fails: fail_times larger than the retry budget ever exhausts.
    nodes.insert("feed".to_string(), Arc::new(FlakySource::new("feed", 1, 999)));
    nodes.insert("double".to_string(), Arc::new(Doubler));

    let executor = test_executor(normal_controller());
    let result = executor.execute(&graph, &nodes, InitialInputs::new(), serde_json::Map::new()).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.per_node_results["feed"].status, NodeStatus::Failed);
    assert_eq!(result.per_node_results["feed"].error_kind.as_deref(), Some("RetryExhausted"));
    assert_eq!(result.per_node_results["double"].status, NodeStatus::Skipped);
    assert_eq!(result.per_node_results["double"].error_kind.as_deref(), Some("UpstreamFailed"));
}

#[tokio::test]
async fn missing_output_port_is_a_contract_violation() {
    let graph = Graph::new("g-contract")
        .add_node(descriptor("contract_breaker", NodeCategory::Transform, &[], &["value"]))
        .validate()
        .unwrap();

    let mut nodes: NodeRegistry = HashMap::new();
    nodes.insert("contract_breaker".to_string(), Arc::new(ContractBreaker));

    let executor = test_executor(normal_controller());
    let result = executor.execute(&graph, &nodes, InitialInputs::new(), serde_json::Map::new()).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(
        result.per_node_results["contract_breaker"].error_kind.as_deref(),
        Some("NodeContractViolation")
    );
}

#[tokio::test]
async fn executor_node_is_skipped_with_emergency_halted_at_halt() {
    let emergency = normal_controller();
    emergency.set_state(EmergencyLevel::Halt, "risk breach").await.unwrap();

    let graph = Graph::new("g-halt")
        .add_node(descriptor("place_trade", NodeCategory::Executor, &[], &["order_id"]))
        .validate()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut nodes: NodeRegistry = HashMap::new();
    nodes.insert("place_trade".to_string(), Arc::new(PlaceTrade { calls: calls.clone() }));

    let executor = test_executor(emergency);
    let result = executor.execute(&graph, &nodes, InitialInputs::new(), serde_json::Map::new()).await.unwrap();

    assert_eq!(result.per_node_results["place_trade"].status, NodeStatus::Skipped);
    assert_eq!(result.per_node_results["place_trade"].error_kind.as_deref(), Some("EmergencyHalted"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // A node stopped by the emergency controller counts as the run itself
    // having halted, not merely failed.
    assert_eq!(result.status, RunStatus::Halted);
}

#[tokio::test]
async fn shutdown_halts_the_entire_run() {
    let emergency = normal_controller();
    emergency.set_state(EmergencyLevel::Shutdown, "operator kill switch").await.unwrap();

    let graph = Graph::new("g-shutdown")
        .add_node(descriptor("feed", NodeCategory::Source, &[], &["value"]))
        .validate()
        .unwrap();

    let mut nodes: NodeRegistry = HashMap::new();
    nodes.insert("feed".to_string(), Arc::new(FlakySource::new("feed", 1, 0)));

    let executor = test_executor(emergency);
    let result = executor.execute(&graph, &nodes, InitialInputs::new(), serde_json::Map::new()).await.unwrap();

    assert_eq!(result.status, RunStatus::Halted);
    assert!(result.per_node_results.is_empty());
}

#[tokio::test]
async fn every_node_started_has_exactly_one_terminal_with_matching_correlation() {
    let graph = Graph::new("g-events")
        .add_node(descriptor("feed", NodeCategory::Source, &[], &["value"]))
        .add_node(descriptor("double", NodeCategory::Transform, &["value"], &["value"]))
        .add_connection(connection("feed", 0, "double", 0))
        .validate()
        .unwrap();

    let mut nodes: NodeRegistry = HashMap::new();
    nodes.insert("feed".to_string(), Arc::new(FlakySource::new("feed", 7, 0)));
    nodes.insert("double".to_string(), Arc::new(Doubler));

    let bus = Arc::new(InProcessBus::new());
    let seen: Arc<std::sync::Mutex<Vec<(String, Value)>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        bus.subscribe(
            workflow_events::WORKFLOW_EVENTS_CHANNEL,
            Arc::new(move |event| {
                let seen = seen.clone();
                Box::pin(async move {
                    let event_type = event.payload["type"].as_str().unwrap_or_default().to_string();
                    seen.lock().unwrap().push((event_type, event.payload.clone()));
                })
            }),
        )
        .await
        .unwrap();
    }

    let executor = Executor::new(
        Arc::new(InProcessStore::new()),
        bus,
        normal_controller(),
        Duration::from_secs(5),
        RetryPolicy::new(3).with_initial_interval(Duration::from_millis(1)).with_jitter(false),
        CircuitBreakerConfig { failure_threshold: 2, timeout_duration: Duration::from_millis(50), success_threshold: 1, failure_window: Duration::from_secs(60) },
    );
    let result = executor.execute(&graph, &nodes, InitialInputs::new(), serde_json::Map::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let events = seen.lock().unwrap();
    let started: Vec<&str> = events
        .iter()
        .filter(|(channel, _)| channel == "node_started")
        .map(|(_, payload)| payload["node_id"].as_str().unwrap())
        .collect();
    let terminal: Vec<&str> = events
        .iter()
        .filter(|(channel, _)| channel == "node_completed" || channel == "node_failed")
        .map(|(_, payload)| payload["node_id"].as_str().unwrap())
        .collect();

    assert_eq!(started.len(), 2, "feed and double should each start exactly once");
    let mut started_sorted = started.clone();
    started_sorted.sort();
    let mut terminal_sorted = terminal.clone();
    terminal_sorted.sort();
    assert_eq!(started_sorted, terminal_sorted, "every started node has exactly one terminal event");

    for (_, payload) in events.iter() {
        assert_eq!(payload["correlation_id"].as_str().unwrap(), result.run_id);
        assert_eq!(payload["run_id"].as_str().unwrap(), result.run_id);
    }
}

#[tokio::test]
async fn missing_node_implementation_is_rejected_up_front() {
    let graph = Graph::new("g-missing")
        .add_node(descriptor("feed", NodeCategory::Source, &[], &["value"]))
        .validate()
        .unwrap();

    let executor = test_executor(normal_controller());
    let err = executor
        .execute(&graph, &NodeRegistry::new(), InitialInputs::new(), serde_json::Map::new())
        .await
        .unwrap_err();

    assert!(matches!(err, workflow_executor::ExecutorError::MissingImplementation(id) if id == "feed"));
}

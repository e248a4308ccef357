//! The executor (§4.C8): runs a [`ValidatedGraph`] to completion, one node at
//! a time in topological order, applying per-category resilience, emergency
//! gating, and checkpointing at every step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use workflow_emergency::{EmergencyController, NodeKind};
use workflow_events::EventBus;
use workflow_graph::{NodeCategory, ValidatedGraph};
use workflow_resilience::{CancellationSource, CancellationToken, CircuitBreaker, CircuitBreakerConfig, ResilienceError, RetryPolicy};
use workflow_state::StateStore;
use workflow_telemetry::Logger;

use crate::error::{self, Result};
use crate::node::{NodeExecutionContext, NodeExecutionResult, NodeRegistry, NodeStatus, SharedState};
use crate::run::{RunResult, RunStatus};
use crate::schedule::topological_order;

/// Per-run inputs the caller supplies for nodes with no incoming connection
/// (§4.C8 "roots"), keyed by node id then input port name.
pub type InitialInputs = HashMap<String, HashMap<String, Value>>;

/// Runs graphs against a fixed set of infrastructure dependencies. One
/// instance is normally shared (`Arc`) across every run a process performs;
/// its circuit breakers persist across runs of the same graph, which is the
/// point — a breaker that resets every run never actually protects anything.
pub struct Executor {
    state: Arc<dyn StateStore>,
    events: Arc<dyn EventBus>,
    emergency: Arc<EmergencyController>,
    default_timeout: Duration,
    retry_policy: RetryPolicy,
    circuit_breaker_config: CircuitBreakerConfig,
    breakers: dashmap::DashMap<String, Arc<CircuitBreaker>>,
}

impl Executor {
    pub fn new(
        state: Arc<dyn StateStore>,
        events: Arc<dyn EventBus>,
        emergency: Arc<EmergencyController>,
        default_timeout: Duration,
        retry_policy: RetryPolicy,
        circuit_breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            state,
            events,
            emergency,
            default_timeout,
            retry_policy,
            circuit_breaker_config,
            breakers: dashmap::DashMap::new(),
        }
    }

    fn breaker_for(&self, node_id: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(node_id.to_string())
            .or_insert_with(|| {
                Arc::new(
                    CircuitBreaker::new(format!("node:{node_id}"), self.circuit_breaker_config.clone())
                        .with_events(self.events.clone()),
                )
            })
            .clone()
    }

    /// Executes `graph` to completion. `nodes` must contain an implementation
    /// for every node id in `graph`; `initial_inputs` seeds the roots;
    /// `shared_state` seeds the run's mutable scratch space (`bot_id`,
    /// `strategy_id`, and similar correlation fields belong here).
    pub async fn execute(
        &self,
        graph: &ValidatedGraph,
        nodes: &NodeRegistry,
        initial_inputs: InitialInputs,
        shared_state: serde_json::Map<String, Value>,
    ) -> Result<RunResult> {
        for node in graph.nodes() {
            if !nodes.contains_key(&node.id) {
                return Err(error::ExecutorError::MissingImplementation(node.id.clone()));
            }
        }

        let run_id = workflow_telemetry::new_run_id(graph.id());
        let graph_id = graph.id().to_string();
        let cancel_source = CancellationSource::new();

        workflow_telemetry::with_correlation_id(run_id.clone(), async {
            self.run(graph, nodes, initial_inputs, shared_state, run_id, graph_id, cancel_source.token())
                .await
        })
        .await
    }

    async fn run(
        &self,
        graph: &ValidatedGraph,
        nodes: &NodeRegistry,
        initial_inputs: InitialInputs,
        shared_state: serde_json::Map<String, Value>,
        run_id: String,
        graph_id: String,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let started_at = chrono::Utc::now();
        let order = topological_order(graph)?;
        let logger = Logger::new().with([
            ("run_id", Value::String(run_id.clone())),
            ("graph_id", Value::String(graph_id.clone())),
        ]);
        let shared_state: SharedState = Arc::new(tokio::sync::RwLock::new(shared_state));

        let bot_id = shared_state.read().await.get("bot_id").and_then(Value::as_str).map(str::to_string);
        let strategy_id = shared_state.read().await.get("strategy_id").and_then(Value::as_str).map(str::to_string);

        self.emit("execution_started", &run_id, &graph_id, &bot_id, &strategy_id, serde_json::json!({})).await;
        logger.info("execution_started", &[]);

        let mut results: HashMap<String, NodeExecutionResult> = HashMap::new();
        let mut halted = false;

        for node_id in &order {
            if cancel.is_cancelled() {
                halted = true;
                break;
            }

            let descriptor = graph.node(node_id).expect("scheduled id exists in graph");
            let kind = if descriptor.category == NodeCategory::Executor { NodeKind::Executor } else { NodeKind::Other };

            if self.emergency.assert_can_operate().is_err() {
                halted = true;
                break;
            }

            if kind == NodeKind::Executor && self.emergency.assert_can_trade().is_err() {
                let result = NodeExecutionResult::skipped(
                    node_id.clone(),
                    error::ERR_EMERGENCY_HALTED,
                    "node skipped: emergency controller is at or above HALT",
                );
                self.emit_node(&run_id, &graph_id, &bot_id, &strategy_id, descriptor, &result).await;
                results.insert(node_id.clone(), result);
                continue;
            }

            let mut upstream_failed = false;
            let mut inputs: HashMap<String, Value> = HashMap::new();
            for (index, port) in descriptor.input_ports.iter().enumerate() {
                if let Some(conn) = graph.incoming(node_id).find(|c| c.to.index == index) {
                    match results.get(&conn.from.node) {
                        Some(upstream) if upstream.status == NodeStatus::Completed => {
                            let upstream_descriptor = graph.node(&conn.from.node).expect("connection endpoint exists");
                            let output_name = &upstream_descriptor.output_ports[conn.from.index].name;
                            let value = upstream.outputs.get(output_name).cloned().unwrap_or(Value::Null);
                            inputs.insert(port.name.clone(), value);
                        }
                        _ => upstream_failed = true,
                    }
                } else if let Some(value) = initial_inputs.get(node_id).and_then(|m| m.get(&port.name)) {
                    inputs.insert(port.name.clone(), value.clone());
                }
            }

            if upstream_failed {
                let result = NodeExecutionResult::skipped(
                    node_id.clone(),
                    error::ERR_UPSTREAM_FAILED,
                    "node skipped: an upstream dependency did not complete",
                );
                self.emit_node(&run_id, &graph_id, &bot_id, &strategy_id, descriptor, &result).await;
                results.insert(node_id.clone(), result);
                continue;
            }

            let ctx = NodeExecutionContext {
                correlation_id: run_id.clone(),
                run_id: run_id.clone(),
                graph_id: graph_id.clone(),
                node_id: node_id.clone(),
                bot_id: bot_id.clone(),
                strategy_id: strategy_id.clone(),
                inputs,
                shared_state: shared_state.clone(),
                cancellation_token: cancel.clone(),
                timeout: self.default_timeout,
                logger: logger.with([("node_id", Value::String(node_id.clone()))]),
            };

            self.emit(
                "node_started",
                &run_id,
                &graph_id,
                &bot_id,
                &strategy_id,
                serde_json::json!({
                    "node_id": node_id,
                    "node_name": node_id,
                    "node_category": descriptor.category,
                }),
            )
            .await;

            let node_impl = nodes.get(node_id).expect("presence checked before scheduling");
            let start = Instant::now();
            let outcome = self.invoke(descriptor.category, node_id, node_impl.as_ref(), &ctx).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(outputs) => match check_output_contract(descriptor, &outputs) {
                    Ok(()) => {
                        let outputs = drop_undeclared_outputs(node_id, descriptor, outputs);
                        NodeExecutionResult::completed(node_id.clone(), outputs, duration_ms)
                    }
                    Err(missing) => NodeExecutionResult::failed(
                        node_id.clone(),
                        error::ERR_NODE_CONTRACT_VIOLATION,
                        format!("node did not return declared output port '{missing}'"),
                        duration_ms,
                    ),
                },
                Err(NodeFailure::Halt) => {
                    halted = true;
                    NodeExecutionResult::failed(
                        node_id.clone(),
                        error::ERR_CANCELLED,
                        "node cancelled mid-execution",
                        duration_ms,
                    )
                }
                Err(NodeFailure::Outcome(kind, message)) => {
                    NodeExecutionResult::failed(node_id.clone(), kind, message, duration_ms)
                }
            };

            let stop_after_this_node = halted;

            self.emit_node(&run_id, &graph_id, &bot_id, &strategy_id, descriptor, &result).await;
            self.checkpoint(&graph_id, &run_id, &results, &result).await;
            results.insert(node_id.clone(), result);

            if stop_after_this_node {
                break;
            }
        }

        let completed_at = chrono::Utc::now();
        let any_emergency_halted = results.values().any(|r| {
            r.status == NodeStatus::Skipped && r.error_kind.as_deref() == Some(error::ERR_EMERGENCY_HALTED)
        });
        let status = if halted || any_emergency_halted {
            RunStatus::Halted
        } else if results.values().any(|r| r.status != NodeStatus::Completed) {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        let run_result = RunResult {
            run_id: run_id.clone(),
            graph_id: graph_id.clone(),
            status,
            per_node_results: results,
            started_at,
            completed_at,
        };

        let event_name = match status {
            RunStatus::Completed => "execution_completed",
            RunStatus::Failed => "execution_failed",
            RunStatus::Halted => "execution_halted",
        };
        self.emit(event_name, &run_id, &graph_id, &bot_id, &strategy_id, serde_json::json!({ "status": status })).await;
        logger.info(event_name, &[]);

        self.persist_result(&run_result).await;

        Ok(run_result)
    }

    async fn invoke(
        &self,
        category: NodeCategory,
        node_id: &str,
        node: &dyn crate::node::Node,
        ctx: &NodeExecutionContext,
    ) -> std::result::Result<HashMap<String, Value>, NodeFailure> {
        if category.is_provider() {
            let breaker = self.breaker_for(node_id);
            let outcome = workflow_resilience::execute_with_full_resilience(
                ctx.timeout,
                &self.retry_policy,
                &breaker,
                &ctx.cancellation_token,
                || node.execute(ctx),
            )
            .await;
            map_resilience_outcome(outcome)
        } else {
            let outcome = workflow_resilience::execute_with_timeout(ctx.timeout, &ctx.cancellation_token, node.execute(ctx)).await;
            map_timeout_outcome(outcome)
        }
    }

    /// Publishes one event envelope (§6) on the single
    /// [`workflow_events::WORKFLOW_EVENTS_CHANNEL`] every core event kind
    /// shares. `event_type` becomes the envelope's `type` field; `extra`'s
    /// own keys (node id, category, status, ...) are merged in on top of
    /// the common fields every envelope carries.
    async fn emit(&self, event_type: &str, run_id: &str, graph_id: &str, bot_id: &Option<String>, strategy_id: &Option<String>, mut extra: Value) {
        if let Value::Object(map) = &mut extra {
            map.insert("type".to_string(), Value::String(event_type.to_string()));
            map.insert("timestamp".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
            map.insert("correlation_id".to_string(), Value::String(run_id.to_string()));
            map.insert("workflow_id".to_string(), Value::String(graph_id.to_string()));
            map.insert("run_id".to_string(), Value::String(run_id.to_string()));
            map.entry("bot_id").or_insert_with(|| bot_id.clone().map(Value::String).unwrap_or(Value::Null));
            map.entry("strategy_id").or_insert_with(|| strategy_id.clone().map(Value::String).unwrap_or(Value::Null));
        }
        if let Err(e) = self.events.publish(workflow_events::WORKFLOW_EVENTS_CHANNEL, extra).await {
            tracing::warn!(error = %e, event_type, "failed to publish event");
        }
    }

    async fn emit_node(
        &self,
        run_id: &str,
        graph_id: &str,
        bot_id: &Option<String>,
        strategy_id: &Option<String>,
        descriptor: &workflow_graph::NodeDescriptor,
        result: &NodeExecutionResult,
    ) {
        let event_type = match result.status {
            NodeStatus::Completed => "node_completed",
            NodeStatus::Failed => "node_failed",
            NodeStatus::Skipped => "node_failed",
        };
        let payload = serde_json::json!({
            "node_id": result.node_id,
            "node_name": result.node_id,
            "node_category": descriptor.category,
            "status": result.status,
            "duration_ms": result.duration_ms,
            "outputs": if result.outputs.is_empty() { Value::Null } else { serde_json::to_value(&result.outputs).unwrap_or(Value::Null) },
            "error": result.error_message,
            "error_kind": result.error_kind,
        });
        self.emit(event_type, run_id, graph_id, bot_id, strategy_id, payload).await;
    }

    async fn checkpoint(
        &self,
        graph_id: &str,
        run_id: &str,
        completed: &HashMap<String, NodeExecutionResult>,
        latest: &NodeExecutionResult,
    ) {
        let mut completed_ids: Vec<&str> = completed.keys().map(String::as_str).collect();
        completed_ids.push(&latest.node_id);
        completed_ids.sort_unstable();

        let value = serde_json::json!({
            "status": "running",
            "completed_node_ids": completed_ids,
            "last_node_id": latest.node_id,
        });
        let key = workflow_state::keys::execution_status(graph_id, run_id);
        if let Err(e) = self.state.set(&key, value, Some(Duration::from_secs(3600))).await {
            tracing::warn!(error = %e, key, "failed to write execution checkpoint");
        }
    }

    async fn persist_result(&self, result: &RunResult) {
        let key = workflow_state::keys::execution_result(&result.graph_id, &result.run_id);
        let value = serde_json::to_value(result).unwrap_or(Value::Null);
        if let Err(e) = self.state.set(&key, value, None).await {
            tracing::warn!(error = %e, key, "failed to persist run result");
        }

        let latest_key = workflow_state::keys::latest_execution(&result.graph_id);
        if let Err(e) = self.state.set(&latest_key, Value::String(result.run_id.clone()), None).await {
            tracing::warn!(error = %e, key = latest_key, "failed to record latest execution pointer");
        }

        let status_key = workflow_state::keys::execution_status(&result.graph_id, &result.run_id);
        let status_value = serde_json::json!({ "status": result.status });
        if let Err(e) = self.state.set(&status_key, status_value, None).await {
            tracing::warn!(error = %e, key = status_key, "failed to finalize execution checkpoint");
        }
    }
}

/// Outcome of invoking one node once the resilience wrapper has run: either
/// the run should halt outright (cooperative cancellation fired mid-call),
/// or the node produced a concrete FAILED outcome with its tag and message.
enum NodeFailure {
    Halt,
    Outcome(&'static str, String),
}

fn map_resilience_outcome(
    outcome: workflow_resilience::Result<HashMap<String, Value>, ResilienceError<crate::node::NodeError>>,
) -> std::result::Result<HashMap<String, Value>, NodeFailure> {
    outcome.map_err(|e| match e {
        ResilienceError::Timeout => NodeFailure::Outcome(error::ERR_NODE_TIMEOUT, "node timed out".to_string()),
        ResilienceError::Cancelled => NodeFailure::Halt,
        ResilienceError::CircuitOpen { name } => {
            NodeFailure::Outcome(error::ERR_CIRCUIT_OPEN, format!("circuit breaker '{name}' is open"))
        }
        ResilienceError::RetryExhausted { attempts, last } => {
            NodeFailure::Outcome(error::ERR_RETRY_EXHAUSTED, format!("exhausted after {attempts} attempt(s): {last}"))
        }
        ResilienceError::Inner(inner) => match inner {
            ResilienceError::Timeout => NodeFailure::Outcome(error::ERR_NODE_TIMEOUT, "node timed out".to_string()),
            ResilienceError::Cancelled => NodeFailure::Halt,
            ResilienceError::CircuitOpen { name } => {
                NodeFailure::Outcome(error::ERR_CIRCUIT_OPEN, format!("circuit breaker '{name}' is open"))
            }
            ResilienceError::RetryExhausted { attempts, last } => {
                NodeFailure::Outcome(error::ERR_RETRY_EXHAUSTED, format!("exhausted after {attempts} attempt(s): {last}"))
            }
            ResilienceError::Inner(node_err) => NodeFailure::Outcome("NodeError", node_err.to_string()),
        },
    })
}

fn map_timeout_outcome(
    outcome: workflow_resilience::Result<HashMap<String, Value>, crate::node::NodeError>,
) -> std::result::Result<HashMap<String, Value>, NodeFailure> {
    outcome.map_err(|e| match e {
        ResilienceError::Timeout => NodeFailure::Outcome(error::ERR_NODE_TIMEOUT, "node timed out".to_string()),
        ResilienceError::Cancelled => NodeFailure::Halt,
        ResilienceError::Inner(node_err) => NodeFailure::Outcome("NodeError", node_err.to_string()),
        ResilienceError::CircuitOpen { name } => {
            NodeFailure::Outcome(error::ERR_CIRCUIT_OPEN, format!("circuit breaker '{name}' is open"))
        }
        ResilienceError::RetryExhausted { attempts, last } => {
            NodeFailure::Outcome(error::ERR_RETRY_EXHAUSTED, format!("exhausted after {attempts} attempt(s): {last}"))
        }
    })
}

/// Declared output ports the node did not return a value for (§4.C8 edge
/// case: "missing a declared output port"). Only a missing required port is
/// a contract violation; undeclared extras are handled separately by
/// `drop_undeclared_outputs`.
fn check_output_contract(descriptor: &workflow_graph::NodeDescriptor, outputs: &HashMap<String, Value>) -> std::result::Result<(), String> {
    for port in &descriptor.output_ports {
        if !outputs.contains_key(&port.name) {
            return Err(port.name.clone());
        }
    }
    Ok(())
}

/// Drops output keys the descriptor doesn't declare (§4.C8 edge case: "a node
/// that returns outputs containing an undeclared output port"), logging each
/// at warn. The node still counts as COMPLETED — this runs only after
/// `check_output_contract` has already confirmed every required port is present.
fn drop_undeclared_outputs(node_id: &str, descriptor: &workflow_graph::NodeDescriptor, outputs: HashMap<String, Value>) -> HashMap<String, Value> {
    let declared: std::collections::HashSet<&str> = descriptor.output_ports.iter().map(|p| p.name.as_str()).collect();
    let mut kept = HashMap::with_capacity(outputs.len());
    for (key, value) in outputs {
        if declared.contains(key.as_str()) {
            kept.insert(key, value);
        } else {
            tracing::warn!(node_id, output = %key, "dropping undeclared output port");
        }
    }
    kept
}

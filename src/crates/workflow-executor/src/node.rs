//! The node implementation contract (§6) and the per-invocation context and
//! result types (§3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use workflow_graph::NodeDescriptor;
use workflow_resilience::CancellationToken;
use workflow_telemetry::Logger;

/// Opaque error type node implementations raise. Kept as a boxed
/// `std::error::Error` rather than an associated type so the executor can
/// hold a homogeneous collection of `Arc<dyn Node>` regardless of what kind
/// of work any one node does (§6: "a node is any value offering...").
pub type NodeError = Box<dyn std::error::Error + Send + Sync>;

/// A run's mutable, shared scratch space (§3 `NodeExecutionContext.shared_state`).
/// Seeded by the caller (typically with `bot_id`/`strategy_id`) and visible
/// to every node for the run's duration.
pub type SharedState = Arc<RwLock<serde_json::Map<String, Value>>>;

/// Per-node-invocation context (§3). Exists only for the duration of one
/// node's `execute` call — nothing in the executor keeps one alive past
/// that.
#[derive(Clone)]
pub struct NodeExecutionContext {
    pub correlation_id: String,
    pub run_id: String,
    pub graph_id: String,
    pub node_id: String,
    pub bot_id: Option<String>,
    pub strategy_id: Option<String>,
    pub inputs: HashMap<String, Value>,
    pub shared_state: SharedState,
    pub cancellation_token: CancellationToken,
    pub timeout: Duration,
    pub logger: Logger,
}

/// Outcome of a single node's turn in the schedule (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Completed,
    Failed,
    Skipped,
}

/// §3 `NodeExecutionResult`. `outputs` keys equal the node's declared output
/// port names exactly once the executor's contract check has run — see
/// `crate::executor` for what happens when a node's raw return value
/// disagrees with its descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    pub node_id: String,
    pub status: NodeStatus,
    pub outputs: HashMap<String, Value>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

impl NodeExecutionResult {
    pub fn completed(node_id: impl Into<String>, outputs: HashMap<String, Value>, duration_ms: u64) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Completed,
            outputs,
            error_kind: None,
            error_message: None,
            duration_ms,
        }
    }

    pub fn failed(
        node_id: impl Into<String>,
        error_kind: impl Into<String>,
        error_message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Failed,
            outputs: HashMap::new(),
            error_kind: Some(error_kind.into()),
            error_message: Some(error_message.into()),
            duration_ms,
        }
    }

    pub fn skipped(node_id: impl Into<String>, error_kind: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Skipped,
            outputs: HashMap::new(),
            error_kind: Some(error_kind.into()),
            error_message: Some(error_message.into()),
            duration_ms: 0,
        }
    }
}

/// A pluggable node implementation (§6 "Node implementation contract").
/// `execute` must be idempotent-friendly: the executor may call it more
/// than once for a single logical attempt under the retry primitive.
#[async_trait]
pub trait Node: Send + Sync {
    fn descriptor(&self) -> &NodeDescriptor;

    async fn execute(&self, ctx: &NodeExecutionContext) -> Result<HashMap<String, Value>, NodeError>;
}

/// Maps node ids to their implementation. The executor requires one entry
/// per id in the graph being run; it does not invent behavior for a node
/// it has no implementation for.
pub type NodeRegistry = HashMap<String, Arc<dyn Node>>;

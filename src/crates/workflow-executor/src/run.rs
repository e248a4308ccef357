//! §3 `RunResult`: the terminal summary of one `Execute` call.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::NodeExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Completed,
    Failed,
    Halted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub graph_id: String,
    pub status: RunStatus,
    pub per_node_results: HashMap<String, NodeExecutionResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

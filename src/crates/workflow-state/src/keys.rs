//! Reserved state-store key layout (§6)
//!
//! Centralizing these avoids format-string drift between the executor, the
//! emergency controller, and anything inspecting the store out-of-band
//! (the CLI's `status` command, a future dashboard).

/// `workflow:{graph_id}:execution:{run_id}:status`
pub fn execution_status(graph_id: &str, run_id: &str) -> String {
    format!("workflow:{graph_id}:execution:{run_id}:status")
}

/// `workflow:{graph_id}:execution:{run_id}:result`
pub fn execution_result(graph_id: &str, run_id: &str) -> String {
    format!("workflow:{graph_id}:execution:{run_id}:result")
}

/// `workflow:{graph_id}:latest_execution`
pub fn latest_execution(graph_id: &str) -> String {
    format!("workflow:{graph_id}:latest_execution")
}

/// `emergency:state`
pub const EMERGENCY_STATE: &str = "emergency:state";

/// `circuit:{name}`
pub fn circuit_snapshot(name: &str) -> String {
    format!("circuit:{name}")
}

//! Read-only introspection helpers over a [`ValidatedGraph`]: a quick
//! summary for the CLI's `status`/`describe` output and a reachable
//! provider-node listing the executor's resilience wiring can sanity-check
//! against.

use std::collections::HashMap;

use crate::graph::ValidatedGraph;
use crate::types::NodeCategory;

#[derive(Debug, Clone)]
pub struct GraphSummary {
    pub graph_id: String,
    pub node_count: usize,
    pub connection_count: usize,
    pub nodes_by_category: HashMap<NodeCategory, usize>,
    pub provider_node_ids: Vec<String>,
}

pub fn summarize(graph: &ValidatedGraph) -> GraphSummary {
    let mut nodes_by_category: HashMap<NodeCategory, usize> = HashMap::new();
    let mut provider_node_ids = Vec::new();

    for node in graph.nodes() {
        *nodes_by_category.entry(node.category).or_insert(0) += 1;
        if node.category.is_provider() {
            provider_node_ids.push(node.id.clone());
        }
    }

    GraphSummary {
        graph_id: graph.id().to_string(),
        node_count: graph.nodes().len(),
        connection_count: graph.connections().len(),
        nodes_by_category,
        provider_node_ids,
    }
}

/// Node ids with no incoming connection — the roots initial_inputs must
/// supply values for (§3 `NodeExecutionContext`, §4.C8).
pub fn root_node_ids(graph: &ValidatedGraph) -> Vec<&str> {
    graph
        .nodes()
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| graph.incoming(id).next().is_none())
        .collect()
}

/// Node ids with no outgoing connection — the sinks a run's completion
/// waits on (§4.C8 "Multiple independent sinks").
pub fn sink_node_ids(graph: &ValidatedGraph) -> Vec<&str> {
    graph
        .nodes()
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| graph.outgoing(id).next().is_none())
        .collect()
}

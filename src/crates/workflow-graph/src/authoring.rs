//! YAML authoring sugar: lets a graph be written with
//! connections addressed by port *name* (`node.port`) instead of index, and
//! compiles that down to the canonical index-based [`Graph`] the validator
//! and executor work with. Nothing downstream of [`compile`] knows this
//! sugar ever existed.

use serde::Deserialize;

use crate::error::{GraphError, GraphInvalidReason, Result};
use crate::graph::Graph;
use crate::types::{Connection, ConnectionEndpoint, NodeDescriptor};

#[derive(Debug, Deserialize)]
struct NamedConnection {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct AuthoredGraph {
    graph_id: String,
    nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    connections: Vec<NamedConnection>,
}

/// Parses `yaml` (nodes exactly as in the JSON wire format, connections as
/// `"node.port"` pairs) and compiles it into a [`Graph`] ready for
/// [`Graph::validate`].
pub fn compile_yaml(yaml: &str) -> Result<Graph> {
    let authored: AuthoredGraph = serde_yaml::from_str(yaml)
        .map_err(|e| GraphError::new(GraphInvalidReason::DanglingRef, format!("invalid graph YAML: {e}")))?;

    let mut graph = Graph::new(authored.graph_id);
    for node in authored.nodes {
        graph = graph.add_node(node);
    }

    for named in authored.connections {
        let from = resolve_endpoint(&graph, &named.from, Direction::Output)?;
        let to = resolve_endpoint(&graph, &named.to, Direction::Input)?;
        graph = graph.add_connection(Connection {
            from,
            to,
            extra: serde_json::Map::new(),
        });
    }

    Ok(graph)
}

enum Direction {
    Output,
    Input,
}

fn resolve_endpoint(graph: &Graph, spec: &str, direction: Direction) -> Result<ConnectionEndpoint> {
    let (node_id, port_name) = spec.split_once('.').ok_or_else(|| {
        GraphError::new(
            GraphInvalidReason::DanglingRef,
            format!("expected 'node.port', got '{spec}'"),
        )
    })?;

    let node = graph.nodes.iter().find(|n| n.id == node_id).ok_or_else(|| {
        GraphError::new(GraphInvalidReason::DanglingRef, format!("unknown node '{node_id}' in '{spec}'"))
    })?;

    let index = match direction {
        Direction::Output => node.output_index(port_name),
        Direction::Input => node.input_index(port_name),
    }
    .ok_or_else(|| {
        GraphError::new(
            GraphInvalidReason::PortOutOfRange,
            format!("node '{node_id}' has no port named '{port_name}'"),
        )
    })?;

    Ok(ConnectionEndpoint { node: node_id.to_string(), index })
}

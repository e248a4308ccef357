//! The [`Graph`] container and its validation pass into an immutable
//! [`ValidatedGraph`] (§4.C7).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GraphError, GraphInvalidReason, Result};
use crate::types::{Connection, NodeDescriptor};

/// A graph as submitted: possibly invalid, possibly still being edited.
/// [`Graph::validate`] is the only way to obtain a [`ValidatedGraph`], which
/// is what the executor actually runs (§3: "handed to the Executor
/// read-only — its topology must not change during a run").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub graph_id: String,
    pub nodes: Vec<NodeDescriptor>,
    pub connections: Vec<Connection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Graph {
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn add_node(mut self, node: NodeDescriptor) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Runs every check in §4.C7 in the order the reason codes are listed
    /// there, so the first violation found is always the most "structural"
    /// one (duplicate ids before dangling refs before cycles, etc).
    pub fn validate(self) -> Result<ValidatedGraph> {
        let mut seen_ids = HashSet::new();
        for node in &self.nodes {
            if !seen_ids.insert(node.id.as_str()) {
                return Err(GraphError::new(
                    GraphInvalidReason::DuplicateId,
                    format!("node id '{}' appears more than once", node.id),
                ));
            }
        }

        let nodes_by_id: HashMap<&str, &NodeDescriptor> =
            self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        for conn in &self.connections {
            let from_node = nodes_by_id.get(conn.from.node.as_str()).ok_or_else(|| {
                GraphError::new(
                    GraphInvalidReason::DanglingRef,
                    format!("connection references unknown node '{}'", conn.from.node),
                )
            })?;
            let to_node = nodes_by_id.get(conn.to.node.as_str()).ok_or_else(|| {
                GraphError::new(
                    GraphInvalidReason::DanglingRef,
                    format!("connection references unknown node '{}'", conn.to.node),
                )
            })?;

            let from_port = from_node.output_ports.get(conn.from.index).ok_or_else(|| {
                GraphError::new(
                    GraphInvalidReason::PortOutOfRange,
                    format!(
                        "node '{}' has no output port at index {}",
                        conn.from.node, conn.from.index
                    ),
                )
            })?;
            let to_port = to_node.input_ports.get(conn.to.index).ok_or_else(|| {
                GraphError::new(
                    GraphInvalidReason::PortOutOfRange,
                    format!(
                        "node '{}' has no input port at index {}",
                        conn.to.node, conn.to.index
                    ),
                )
            })?;

            if from_port.type_tag != to_port.type_tag {
                return Err(GraphError::new(
                    GraphInvalidReason::TypeMismatch,
                    format!(
                        "'{}'.{} ({}) does not match '{}'.{} ({})",
                        conn.from.node, from_port.name, from_port.type_tag,
                        conn.to.node, to_port.name, to_port.type_tag,
                    ),
                ));
            }
        }

        let mut fan_in: HashMap<(&str, usize), usize> = HashMap::new();
        for conn in &self.connections {
            let key = (conn.to.node.as_str(), conn.to.index);
            let count = fan_in.entry(key).or_insert(0);
            *count += 1;
            if *count > 1 {
                return Err(GraphError::new(
                    GraphInvalidReason::FanIn,
                    format!(
                        "input port {} of node '{}' has more than one incoming connection",
                        conn.to.index, conn.to.node
                    ),
                ));
            }
        }

        if let Some(cycle_node) = find_cycle(&self.nodes, &self.connections) {
            return Err(GraphError::new(
                GraphInvalidReason::Cycle,
                format!("cycle detected through node '{cycle_node}'"),
            ));
        }

        Ok(ValidatedGraph { inner: self })
    }
}

/// Depth-first cycle detection with the standard white/gray/black
/// coloring. Returns the id of a node on a detected cycle, if any.
fn find_cycle(nodes: &[NodeDescriptor], connections: &[Connection]) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        adjacency.entry(node.id.as_str()).or_default();
    }
    for conn in connections {
        adjacency
            .entry(conn.from.node.as_str())
            .or_default()
            .push(conn.to.node.as_str());
    }

    let mut color: HashMap<&str, Color> = nodes.iter().map(|n| (n.id.as_str(), Color::White)).collect();

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        color: &mut HashMap<&'a str, Color>,
    ) -> Option<&'a str> {
        color.insert(node, Color::Gray);
        if let Some(neighbors) = adjacency.get(node) {
            for &next in neighbors {
                match color.get(next).copied().unwrap_or(Color::White) {
                    Color::White => {
                        if let Some(found) = visit(next, adjacency, color) {
                            return Some(found);
                        }
                    }
                    Color::Gray => return Some(next),
                    Color::Black => {}
                }
            }
        }
        color.insert(node, Color::Black);
        None
    }

    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    for id in ids {
        if color.get(id).copied() == Some(Color::White) {
            if let Some(found) = visit(id, &adjacency, &mut color) {
                return Some(found.to_string());
            }
        }
    }
    None
}

/// A [`Graph`] that has passed [`Graph::validate`]. Immutable: there is no
/// API to mutate nodes/connections in place, only to read them back out or
/// consume the graph again via [`ValidatedGraph::into_inner`] to rebuild a
/// modified copy (which must itself be re-validated).
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    inner: Graph,
}

impl ValidatedGraph {
    pub fn id(&self) -> &str {
        &self.inner.graph_id
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.inner.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.inner.connections
    }

    pub fn node(&self, id: &str) -> Option<&NodeDescriptor> {
        self.inner.nodes.iter().find(|n| n.id == id)
    }

    /// Connections whose `to` endpoint lands on `node_id`, i.e. this node's
    /// incoming edges.
    pub fn incoming(&self, node_id: &str) -> impl Iterator<Item = &Connection> {
        self.inner.connections.iter().filter(move |c| c.to.node == node_id)
    }

    /// Connections whose `from` endpoint leaves `node_id`, i.e. this node's
    /// outgoing edges.
    pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &Connection> {
        self.inner.connections.iter().filter(move |c| c.from.node == node_id)
    }

    pub fn into_inner(self) -> Graph {
        self.inner
    }
}

impl Serialize for ValidatedGraph {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.inner.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionEndpoint, NodeCategory, PortSpec};

    fn node(id: &str, category: NodeCategory, outputs: &[&str], inputs: &[&str]) -> NodeDescriptor {
        NodeDescriptor {
            id: id.to_string(),
            category,
            kind: "test".to_string(),
            input_ports: inputs
                .iter()
                .map(|n| PortSpec { name: n.to_string(), type_tag: "any".to_string() })
                .collect(),
            output_ports: outputs
                .iter()
                .map(|n| PortSpec { name: n.to_string(), type_tag: "any".to_string() })
                .collect(),
            properties: Value::Null,
            extra: Map::new(),
        }
    }

    fn conn(from: &str, from_idx: usize, to: &str, to_idx: usize) -> Connection {
        Connection {
            from: ConnectionEndpoint { node: from.to_string(), index: from_idx },
            to: ConnectionEndpoint { node: to.to_string(), index: to_idx },
            extra: Map::new(),
        }
    }

    #[test]
    fn empty_graph_is_valid() {
        let graph = Graph::new("g1");
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let graph = Graph::new("g1")
            .add_node(node("a", NodeCategory::Source, &["out"], &[]))
            .add_node(node("a", NodeCategory::Transform, &[], &["in"]));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.reason, GraphInvalidReason::DuplicateId);
    }

    #[test]
    fn rejects_dangling_reference() {
        let graph = Graph::new("g1")
            .add_node(node("a", NodeCategory::Source, &["out"], &[]))
            .add_connection(conn("a", 0, "missing", 0));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.reason, GraphInvalidReason::DanglingRef);
    }

    #[test]
    fn rejects_out_of_range_port_index() {
        let graph = Graph::new("g1")
            .add_node(node("a", NodeCategory::Source, &["out"], &[]))
            .add_node(node("b", NodeCategory::Transform, &[], &["in"]))
            .add_connection(conn("a", 5, "b", 0));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.reason, GraphInvalidReason::PortOutOfRange);
    }

    #[test]
    fn rejects_type_mismatch() {
        let mut a = node("a", NodeCategory::Source, &["out"], &[]);
        a.output_ports[0].type_tag = "number".to_string();
        let mut b = node("b", NodeCategory::Transform, &[], &["in"]);
        b.input_ports[0].type_tag = "string".to_string();
        let graph = Graph::new("g1").add_node(a).add_node(b).add_connection(conn("a", 0, "b", 0));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.reason, GraphInvalidReason::TypeMismatch);
    }

    #[test]
    fn rejects_fan_in() {
        let graph = Graph::new("g1")
            .add_node(node("a", NodeCategory::Source, &["out"], &[]))
            .add_node(node("b", NodeCategory::Source, &["out"], &[]))
            .add_node(node("c", NodeCategory::Transform, &[], &["in"]))
            .add_connection(conn("a", 0, "c", 0))
            .add_connection(conn("b", 0, "c", 0));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.reason, GraphInvalidReason::FanIn);
    }

    #[test]
    fn rejects_cycle() {
        let graph = Graph::new("g1")
            .add_node(node("a", NodeCategory::Transform, &["out"], &["in"]))
            .add_node(node("b", NodeCategory::Transform, &["out"], &["in"]))
            .add_connection(conn("a", 0, "b", 0))
            .add_connection(conn("b", 0, "a", 0));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.reason, GraphInvalidReason::Cycle);
    }

    #[test]
    fn accepts_diamond_shaped_dag() {
        let graph = Graph::new("g1")
            .add_node(node("a", NodeCategory::Source, &["out"], &[]))
            .add_node(node("b", NodeCategory::Transform, &["out"], &["in"]))
            .add_node(node("c", NodeCategory::Transform, &["out"], &["in"]))
            .add_node(node("d", NodeCategory::Executor, &[], &["in1", "in2"]))
            .add_connection(conn("a", 0, "b", 0))
            .add_connection(conn("a", 0, "c", 0))
            .add_connection(conn("b", 0, "d", 0))
            .add_connection(conn("c", 0, "d", 1));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn round_trips_unknown_properties() {
        let json = serde_json::json!({
            "graph_id": "g1",
            "nodes": [],
            "connections": [],
            "editor_metadata": { "zoom": 1.5 }
        });
        let graph: Graph = serde_json::from_value(json.clone()).unwrap();
        let round_tripped = serde_json::to_value(&graph).unwrap();
        assert_eq!(round_tripped, json);
    }
}

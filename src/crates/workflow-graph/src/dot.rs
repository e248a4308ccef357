//! Graphviz DOT export for visualization tooling, supplemental to the core
//! validation contract — nothing here affects execution.

use crate::graph::ValidatedGraph;

/// Renders `graph` as a Graphviz `digraph`, one node per [`NodeDescriptor`]
/// labeled `id\n(category)` and one edge per connection labeled with the
/// source output port name.
pub fn to_dot(graph: &ValidatedGraph) -> String {
    let mut out = String::new();
    out.push_str(&format!("digraph \"{}\" {{\n", graph.id()));
    out.push_str("  rankdir=LR;\n");

    for node in graph.nodes() {
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\\n({:?})\" shape=box];\n",
            node.id, node.id, node.category
        ));
    }

    for conn in graph.connections() {
        let from_node = graph.node(&conn.from.node);
        let label = from_node
            .and_then(|n| n.output_ports.get(conn.from.index))
            .map(|p| p.name.as_str())
            .unwrap_or("");
        out.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
            conn.from.node, conn.to.node, label
        ));
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::types::{Connection, ConnectionEndpoint, NodeCategory, NodeDescriptor, PortSpec};
    use serde_json::{Map, Value};

    #[test]
    fn renders_nodes_and_edges() {
        let graph = Graph::new("g1")
            .add_node(NodeDescriptor {
                id: "a".to_string(),
                category: NodeCategory::Source,
                kind: "feed".to_string(),
                input_ports: vec![],
                output_ports: vec![PortSpec { name: "price".to_string(), type_tag: "number".to_string() }],
                properties: Value::Null,
                extra: Map::new(),
            })
            .add_node(NodeDescriptor {
                id: "b".to_string(),
                category: NodeCategory::Transform,
                kind: "smooth".to_string(),
                input_ports: vec![PortSpec { name: "price".to_string(), type_tag: "number".to_string() }],
                output_ports: vec![],
                properties: Value::Null,
                extra: Map::new(),
            })
            .add_connection(Connection {
                from: ConnectionEndpoint { node: "a".to_string(), index: 0 },
                to: ConnectionEndpoint { node: "b".to_string(), index: 0 },
                extra: Map::new(),
            })
            .validate()
            .unwrap();

        let dot = to_dot(&graph);
        assert!(dot.contains("\"a\" -> \"b\""));
        assert!(dot.contains("price"));
    }
}

//! Kind-based node dispatch (DESIGN NOTES §9 "Dynamic node dispatch").
//!
//! The executor never knows about concrete node logic — it only knows the
//! [`Node`] trait. Something upstream of a run has to turn a graph's
//! `NodeDescriptor.kind` strings into actual `Arc<dyn Node>` values; rather
//! than resolving `kind` through a class registry and reflection (the
//! source's approach), a [`KindRegistry`] maps each `kind` to a plain
//! factory closure returning a fresh implementation for a given descriptor.
//! This keeps the executor itself fully polymorphic: it requires a
//! [`NodeRegistry`](crate::node::NodeRegistry), not a `KindRegistry` —
//! building one from the other is the embedding application's job (see
//! `workflow-cli` for the reference caller).

use std::sync::Arc;

use workflow_graph::{NodeDescriptor, ValidatedGraph};

use crate::error::{ExecutorError, Result};
use crate::node::{Node, NodeRegistry};

/// Produces a fresh [`Node`] implementation for one node descriptor. Boxed
/// rather than generic so a single registry can hold factories for
/// unrelated node kinds side by side.
pub type NodeFactory = Arc<dyn Fn(&NodeDescriptor) -> Arc<dyn Node> + Send + Sync>;

/// A `kind` → [`NodeFactory`] table. One instance is normally built once at
/// process startup (registering every node kind the embedding application
/// knows about) and reused across every graph the executor runs.
#[derive(Clone, Default)]
pub struct KindRegistry {
    factories: std::collections::HashMap<String, NodeFactory>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `kind`, replacing any prior registration.
    pub fn register(mut self, kind: impl Into<String>, factory: NodeFactory) -> Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Resolves every node in `graph` to an implementation, failing fast
    /// with [`ExecutorError::UnknownKind`] on the first node whose `kind`
    /// has no registered factory rather than building a partial registry.
    pub fn build(&self, graph: &ValidatedGraph) -> Result<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        for node in graph.nodes() {
            let factory = self.factories.get(&node.kind).ok_or_else(|| ExecutorError::UnknownKind {
                node: node.id.clone(),
                kind: node.kind.clone(),
            })?;
            registry.insert(node.id.clone(), factory(node));
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use workflow_graph::{Graph, NodeCategory, PortSpec};

    use crate::node::{NodeError, NodeExecutionContext};

    struct ConstNode {
        desc: NodeDescriptor,
        value: Value,
    }

    #[async_trait]
    impl Node for ConstNode {
        fn descriptor(&self) -> &NodeDescriptor {
            &self.desc
        }

        async fn execute(&self, _ctx: &NodeExecutionContext) -> std::result::Result<HashMap<String, Value>, NodeError> {
            let mut out = HashMap::new();
            out.insert("value".to_string(), self.value.clone());
            Ok(out)
        }
    }

    fn descriptor(id: &str, kind: &str) -> NodeDescriptor {
        NodeDescriptor {
            id: id.to_string(),
            category: NodeCategory::Source,
            kind: kind.to_string(),
            input_ports: vec![],
            output_ports: vec![PortSpec { name: "value".to_string(), type_tag: "any".to_string() }],
            properties: Value::Null,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn resolves_every_node_by_kind() {
        let registry = KindRegistry::new().register(
            "constant",
            Arc::new(|desc: &NodeDescriptor| -> Arc<dyn Node> {
                Arc::new(ConstNode { desc: desc.clone(), value: json!(42) })
            }),
        );

        let graph = Graph::new("g1").add_node(descriptor("a", "constant")).validate().unwrap();
        let built = registry.build(&graph).unwrap();
        assert!(built.contains_key("a"));
    }

    #[test]
    fn unknown_kind_fails_fast() {
        let registry = KindRegistry::new();
        let graph = Graph::new("g1").add_node(descriptor("a", "mystery")).validate().unwrap();
        let err = registry.build(&graph).unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownKind { kind, .. } if kind == "mystery"));
    }
}

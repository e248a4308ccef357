//! Built-in demo node kinds.
//!
//! Concrete node logic is explicitly out of scope for this engine (§1
//! "domain-specific node logic beyond its contract shape"): a real
//! deployment registers its own `kind -> Node` factories with
//! [`workflow_executor::KindRegistry`]. These three kinds exist only so
//! `workflow run` has something to execute against a hand-authored graph
//! without linking in a concrete trading/automation node library — they
//! implement the contract shape (§6) and nothing domain-specific.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use workflow_executor::{KindRegistry, Node, NodeError, NodeExecutionContext};
use workflow_graph::NodeDescriptor;

/// SOURCE stand-in: emits `properties.value` (or `null`) on its single
/// declared output port, ignoring every input.
struct ConstantNode(NodeDescriptor);

#[async_trait]
impl Node for ConstantNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.0
    }

    async fn execute(&self, _ctx: &NodeExecutionContext) -> Result<HashMap<String, Value>, NodeError> {
        let value = self.0.properties.get("value").cloned().unwrap_or(Value::Null);
        let mut out = HashMap::new();
        if let Some(port) = self.0.output_ports.first() {
            out.insert(port.name.clone(), value);
        }
        Ok(out)
    }
}

/// TRANSFORM stand-in: copies each input value onto the output port at the
/// same position, so a chain of `passthrough` nodes exercises scheduling
/// and event emission without doing anything to the data.
struct PassthroughNode(NodeDescriptor);

#[async_trait]
impl Node for PassthroughNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.0
    }

    async fn execute(&self, ctx: &NodeExecutionContext) -> Result<HashMap<String, Value>, NodeError> {
        let mut out = HashMap::new();
        for (input_port, output_port) in self.0.input_ports.iter().zip(self.0.output_ports.iter()) {
            if let Some(value) = ctx.inputs.get(&input_port.name) {
                out.insert(output_port.name.clone(), value.clone());
            }
        }
        Ok(out)
    }
}

/// EXECUTOR stand-in: logs its inputs at `info` and declares no outputs —
/// a sink, the way a real order-placement node would be.
struct EchoSinkNode(NodeDescriptor);

#[async_trait]
impl Node for EchoSinkNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.0
    }

    async fn execute(&self, ctx: &NodeExecutionContext) -> Result<HashMap<String, Value>, NodeError> {
        ctx.logger.info("echo_sink", &[("inputs", serde_json::to_value(&ctx.inputs).unwrap_or(Value::Null))]);
        Ok(HashMap::new())
    }
}

/// A [`KindRegistry`] carrying the three demo kinds above, registered under
/// `constant`, `passthrough`, and `echo_sink`.
pub fn builtin_registry() -> KindRegistry {
    KindRegistry::new()
        .register(
            "constant",
            Arc::new(|desc: &NodeDescriptor| -> Arc<dyn Node> { Arc::new(ConstantNode(desc.clone())) }),
        )
        .register(
            "passthrough",
            Arc::new(|desc: &NodeDescriptor| -> Arc<dyn Node> { Arc::new(PassthroughNode(desc.clone())) }),
        )
        .register(
            "echo_sink",
            Arc::new(|desc: &NodeDescriptor| -> Arc<dyn Node> { Arc::new(EchoSinkNode(desc.clone())) }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use workflow_graph::{Graph, NodeCategory, PortSpec};

    fn port(name: &str) -> PortSpec {
        PortSpec { name: name.to_string(), type_tag: "any".to_string() }
    }

    #[tokio::test]
    async fn constant_node_emits_configured_value() {
        let desc = NodeDescriptor {
            id: "a".to_string(),
            category: NodeCategory::Source,
            kind: "constant".to_string(),
            input_ports: vec![],
            output_ports: vec![port("value")],
            properties: json!({"value": 42}),
            extra: serde_json::Map::new(),
        };
        let graph = Graph::new("g1").add_node(desc).validate().unwrap();
        let registry = builtin_registry().build(&graph).unwrap();
        assert!(registry.contains_key("a"));
    }
}

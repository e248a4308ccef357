//! Node and connection types (§3 Data model, §6 serialization format).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node category (§3). Only SOURCE and EXECUTOR are "provider" categories
/// wrapped in the full resilience stack by the executor (§4.C4, §4.C8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeCategory {
    Source,
    Transform,
    Condition,
    Scorer,
    Risk,
    Optimizer,
    Executor,
    Monitor,
    Gate,
}

impl NodeCategory {
    /// Whether this category is allowed to touch external systems and is
    /// therefore run under `timeout ∘ retry ∘ circuit_breaker` (§4.C4,
    /// §4.C8 step 5), rather than `timeout` alone.
    pub fn is_provider(self) -> bool {
        matches!(self, NodeCategory::Source | NodeCategory::Executor)
    }
}

/// One named, typed port on a node (§6: `{"name": "...", "type": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
}

/// A node descriptor (§3). `static_properties` is opaque to the graph model
/// — node implementations interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: String,
    pub category: NodeCategory,
    pub kind: String,
    #[serde(rename = "inputs", default)]
    pub input_ports: Vec<PortSpec>,
    #[serde(rename = "outputs", default)]
    pub output_ports: Vec<PortSpec>,
    #[serde(default)]
    pub properties: Value,
    /// Fields the current model doesn't know about (editor metadata, future
    /// schema additions) — preserved verbatim across a parse/serialize
    /// round trip per §6.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeDescriptor {
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.output_ports.iter().position(|p| p.name == name)
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.input_ports.iter().position(|p| p.name == name)
    }
}

/// One endpoint of a [`Connection`]: a node id plus a port index. Indices,
/// not names, so renaming a port doesn't require rewriting every
/// connection (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEndpoint {
    pub node: String,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from: ConnectionEndpoint,
    pub to: ConnectionEndpoint,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

//! Typed node/port/connection DAG model and validation (§4.C7).

pub mod authoring;
pub mod dot;
pub mod error;
pub mod graph;
pub mod introspect;
pub mod types;

pub use authoring::compile_yaml;
pub use dot::to_dot;
pub use error::{GraphError, GraphInvalidReason, Result};
pub use graph::{Graph, ValidatedGraph};
pub use introspect::{root_node_ids, sink_node_ids, summarize, GraphSummary};
pub use types::{Connection, ConnectionEndpoint, NodeCategory, NodeDescriptor, PortSpec};

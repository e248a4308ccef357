//! Topological DAG executor with per-node resilience, checkpointing, and
//! emergency gating (§4.C8).

pub mod error;
pub mod executor;
pub mod node;
pub mod registry;
pub mod run;
pub mod schedule;

pub use error::{ExecutorError, Result};
pub use executor::{Executor, InitialInputs};
pub use node::{Node, NodeError, NodeExecutionContext, NodeExecutionResult, NodeRegistry, NodeStatus, SharedState};
pub use registry::{KindRegistry, NodeFactory};
pub use run::{RunResult, RunStatus};
pub use schedule::topological_order;

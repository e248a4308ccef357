//! Global emergency operating state, risk-limit monitoring, and
//! cross-restart persistence (§4.C5).

pub mod controller;
pub mod error;
pub mod state;

pub use controller::{EmergencyController, NodeKind};
pub use error::{EmergencyError, Result};
pub use state::{EmergencyLevel, EmergencyState};

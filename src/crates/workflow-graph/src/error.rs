//! Graph validation errors (§4.C7, §7 `GraphInvalid`).

use thiserror::Error;

/// Machine-readable reason codes a validation failure can carry (§4.C7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphInvalidReason {
    DuplicateId,
    DanglingRef,
    PortOutOfRange,
    TypeMismatch,
    FanIn,
    Cycle,
}

impl GraphInvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphInvalidReason::DuplicateId => "duplicate_id",
            GraphInvalidReason::DanglingRef => "dangling_ref",
            GraphInvalidReason::PortOutOfRange => "port_out_of_range",
            GraphInvalidReason::TypeMismatch => "type_mismatch",
            GraphInvalidReason::FanIn => "fan_in",
            GraphInvalidReason::Cycle => "cycle",
        }
    }
}

impl std::fmt::Display for GraphInvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("graph invalid ({reason}): {detail}")]
pub struct GraphError {
    pub reason: GraphInvalidReason,
    pub detail: String,
}

impl GraphError {
    pub fn new(reason: GraphInvalidReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

//! The [`EmergencyLevel`] totally-ordered state and its persisted envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global operating state, NORMAL < ALERT < HALT < SHUTDOWN (§3, §4.C5).
///
/// Derives `PartialOrd`/`Ord` from declaration order, which is what makes
/// `"HALT" <= current` style comparisons in [`crate::controller`] correct
/// without a hand-rolled rank table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyLevel {
    Normal,
    Alert,
    Halt,
    Shutdown,
}

impl EmergencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyLevel::Normal => "NORMAL",
            EmergencyLevel::Alert => "ALERT",
            EmergencyLevel::Halt => "HALT",
            EmergencyLevel::Shutdown => "SHUTDOWN",
        }
    }
}

impl std::fmt::Display for EmergencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted/observed state: a level plus the reason and time it was
/// set (§3 `EmergencyState`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyState {
    pub level: EmergencyLevel,
    pub reason: String,
    pub since: DateTime<Utc>,
}

impl EmergencyState {
    pub fn normal() -> Self {
        Self {
            level: EmergencyLevel::Normal,
            reason: "startup default".to_string(),
            since: Utc::now(),
        }
    }
}

impl Default for EmergencyState {
    fn default() -> Self {
        Self::normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_totally_ordered() {
        assert!(EmergencyLevel::Normal < EmergencyLevel::Alert);
        assert!(EmergencyLevel::Alert < EmergencyLevel::Halt);
        assert!(EmergencyLevel::Halt < EmergencyLevel::Shutdown);
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_value(EmergencyLevel::Halt).unwrap();
        assert_eq!(json, serde_json::json!("HALT"));
    }
}

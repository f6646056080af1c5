//! Health states and recorded transitions.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health verdict for a single sensor or for the whole host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemState {
    /// Never observed, or no sensors known yet.
    Unknown,
    Ok,
    Degraded,
    Failed,
}

impl SystemState {
    /// Stable upper-case label used in logs and event records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Ok => "OK",
            Self::Degraded => "DEGRADED",
            Self::Failed => "FAILED",
        }
    }

    /// Rank used when reducing sensor states to the host aggregate.
    ///
    /// Precedence is `Failed > Unknown > Degraded > Ok`: a sensor that has
    /// not produced a verdict yet outranks one that is merely degraded.
    pub(crate) fn aggregate_rank(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Degraded => 1,
            Self::Unknown => 2,
            Self::Failed => 3,
        }
    }
}

impl std::fmt::Display for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded change of one sensor's state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub sensor_id: String,
    pub from: SystemState,
    pub to: SystemState,
    /// Why the state changed (for example `rule_evaluation`).
    pub reason: String,
    pub timestamp: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_upper_case() {
        assert_eq!(SystemState::Ok.to_string(), "OK");
        assert_eq!(SystemState::Degraded.to_string(), "DEGRADED");
        assert_eq!(SystemState::Failed.to_string(), "FAILED");
        assert_eq!(SystemState::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn aggregate_rank_orders_unknown_above_degraded() {
        assert!(SystemState::Failed.aggregate_rank() > SystemState::Unknown.aggregate_rank());
        assert!(SystemState::Unknown.aggregate_rank() > SystemState::Degraded.aggregate_rank());
        assert!(SystemState::Degraded.aggregate_rank() > SystemState::Ok.aggregate_rank());
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&SystemState::Degraded).unwrap();
        assert_eq!(json, "\"DEGRADED\"");
        let back: SystemState = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(back, SystemState::Failed);
    }
}

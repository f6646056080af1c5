//! Rule contract and the built-in rules.
//!
//! A rule inspects the window for one sensor and reports a [`Severity`]
//! with an explanatory message. Rules never mutate the window; any state
//! they carry is their own configuration.
//!
//! | Rule                      | Can report               |
//! |---------------------------|--------------------------|
//! | [`ThresholdRule`]         | OK, breach severity, FAILED |
//! | [`ImplausibleValueRule`]  | OK, FAILED               |
//! | [`RateOfChangeRule`]      | OK, DEGRADED             |
//! | [`MissingDataRule`]       | OK, DEGRADED, FAILED     |

mod implausible;
mod missing_data;
mod rate_of_change;
mod threshold;

pub use implausible::ImplausibleValueRule;
pub use missing_data::MissingDataRule;
pub use rate_of_change::RateOfChangeRule;
pub use threshold::{ThresholdBounds, ThresholdRule, WILDCARD};

use crate::state::SystemState;
use crate::window::MeasurementWindow;
use serde::{Deserialize, Serialize};

/// Outcome of a single rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Degraded,
    Failed,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Degraded => "DEGRADED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Severity> for SystemState {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Ok => SystemState::Ok,
            Severity::Degraded => SystemState::Degraded,
            Severity::Failed => SystemState::Failed,
        }
    }
}

/// Result of evaluating one rule against one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleResult {
    pub rule_name: String,
    pub sensor_id: String,
    pub severity: Severity,
    /// Empty when the severity is OK.
    pub message: String,
}

impl RuleResult {
    /// A passing result.
    pub fn ok(rule_name: &str, sensor_id: &str) -> Self {
        Self::new(rule_name, sensor_id, Severity::Ok, String::new())
    }

    pub fn new(
        rule_name: &str,
        sensor_id: &str,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            sensor_id: sensor_id.to_string(),
            severity,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.severity == Severity::Ok
    }
}

/// A health rule evaluated by the engine for every incoming reading.
///
/// Implementations must be deterministic for a given window and must not
/// assume anything about the other rules registered alongside them.
pub trait Rule: Send + Sync {
    /// Stable identifier used in results and logs.
    fn name(&self) -> &'static str;

    /// Evaluate the history of `sensor_id` held in `window`.
    fn evaluate(&self, window: &MeasurementWindow, sensor_id: &str) -> RuleResult;
}

impl std::fmt::Debug for dyn Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rule").field(&self.name()).finish()
    }
}

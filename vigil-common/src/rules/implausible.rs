//! Physically impossible values.

use super::{Rule, RuleResult, Severity};
use crate::window::MeasurementWindow;

/// Fails a sensor whose latest value is outside hard physical limits.
///
/// These limits are wider than any [`ThresholdRule`](super::ThresholdRule)
/// bounds: crossing them means the sensor itself is broken, not the host.
/// Invalid readings pass; other rules report missing data.
#[derive(Debug, Clone)]
pub struct ImplausibleValueRule {
    absolute_min: f64,
    absolute_max: f64,
}

impl ImplausibleValueRule {
    pub fn new(absolute_min: f64, absolute_max: f64) -> Self {
        Self {
            absolute_min,
            absolute_max,
        }
    }
}

impl Rule for ImplausibleValueRule {
    fn name(&self) -> &'static str {
        "ImplausibleValueRule"
    }

    fn evaluate(&self, window: &MeasurementWindow, sensor_id: &str) -> RuleResult {
        let latest = window.latest(sensor_id);
        if !latest.valid {
            return RuleResult::ok(self.name(), sensor_id);
        }

        if latest.value < self.absolute_min || latest.value > self.absolute_max {
            return RuleResult::new(
                self.name(),
                sensor_id,
                Severity::Failed,
                format!(
                    "implausible value {} outside absolute bounds [{}, {}]",
                    latest.value, self.absolute_min, self.absolute_max
                ),
            );
        }

        RuleResult::ok(self.name(), sensor_id)
    }
}

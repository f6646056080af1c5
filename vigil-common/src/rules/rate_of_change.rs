//! Sudden jumps between consecutive readings.

use super::{Rule, RuleResult, Severity};
use crate::window::MeasurementWindow;

/// Degrades a sensor whose value moves faster than `max_rate_per_second`.
///
/// Only the last two readings are compared. The rule stays silent until two
/// valid readings with increasing timestamps are available.
#[derive(Debug, Clone)]
pub struct RateOfChangeRule {
    max_rate_per_second: f64,
}

impl RateOfChangeRule {
    pub fn new(max_rate_per_second: f64) -> Self {
        Self {
            max_rate_per_second,
        }
    }
}

impl Rule for RateOfChangeRule {
    fn name(&self) -> &'static str {
        "RateOfChangeRule"
    }

    fn evaluate(&self, window: &MeasurementWindow, sensor_id: &str) -> RuleResult {
        let mut newest_first = window.iter(sensor_id).rev();
        let (Some(curr), Some(prev)) = (newest_first.next(), newest_first.next()) else {
            return RuleResult::ok(self.name(), sensor_id);
        };

        if !prev.valid || !curr.valid {
            return RuleResult::ok(self.name(), sensor_id);
        }

        // Instant subtraction saturates, so out-of-order stamps land here too.
        let dt = curr
            .timestamp
            .saturating_duration_since(prev.timestamp)
            .as_secs_f64();
        if dt <= 0.0 {
            return RuleResult::ok(self.name(), sensor_id);
        }

        let rate = (curr.value - prev.value).abs() / dt;
        if rate > self.max_rate_per_second {
            return RuleResult::new(
                self.name(),
                sensor_id,
                Severity::Degraded,
                format!(
                    "rate of change {rate}/s exceeds limit {}/s",
                    self.max_rate_per_second
                ),
            );
        }

        RuleResult::ok(self.name(), sensor_id)
    }
}

//! Configurable upper/lower bounds per sensor.

use super::{Rule, RuleResult, Severity};
use crate::window::MeasurementWindow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bounds key that applies to every sensor without an entry of its own.
pub const WILDCARD: &str = "*";

/// Inclusive acceptable range and the severity reported when it is left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBounds {
    pub min: f64,
    pub max: f64,
    pub breach_severity: Severity,
}

impl ThresholdBounds {
    pub fn new(min: f64, max: f64, breach_severity: Severity) -> Self {
        Self {
            min,
            max,
            breach_severity,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Flags the latest reading when it falls outside its sensor's bounds.
///
/// Bounds are looked up by sensor id first, then under [`WILDCARD`].
/// Sensors matching neither are not checked by this rule.
#[derive(Debug, Clone, Default)]
pub struct ThresholdRule {
    bounds: HashMap<String, ThresholdBounds>,
}

impl ThresholdRule {
    pub fn new(bounds: HashMap<String, ThresholdBounds>) -> Self {
        Self { bounds }
    }

    /// Bounds applied to every sensor.
    pub fn global(min: f64, max: f64, breach_severity: Severity) -> Self {
        Self::default().with_bounds(WILDCARD, ThresholdBounds::new(min, max, breach_severity))
    }

    /// Bounds applied to a single sensor.
    pub fn for_sensor(
        sensor_id: impl Into<String>,
        min: f64,
        max: f64,
        breach_severity: Severity,
    ) -> Self {
        Self::default().with_bounds(sensor_id, ThresholdBounds::new(min, max, breach_severity))
    }

    /// Add or replace the bounds for `sensor_id`.
    pub fn with_bounds(mut self, sensor_id: impl Into<String>, bounds: ThresholdBounds) -> Self {
        self.bounds.insert(sensor_id.into(), bounds);
        self
    }

    /// Bounds that apply to `sensor_id`, if any.
    pub fn bounds_for(&self, sensor_id: &str) -> Option<&ThresholdBounds> {
        self.bounds
            .get(sensor_id)
            .or_else(|| self.bounds.get(WILDCARD))
    }
}

impl Rule for ThresholdRule {
    fn name(&self) -> &'static str {
        "ThresholdRule"
    }

    fn evaluate(&self, window: &MeasurementWindow, sensor_id: &str) -> RuleResult {
        let Some(bounds) = self.bounds_for(sensor_id) else {
            return RuleResult::ok(self.name(), sensor_id);
        };

        let latest = window.latest(sensor_id);
        if !latest.valid {
            return RuleResult::new(self.name(), sensor_id, Severity::Failed, "no valid reading");
        }

        if !bounds.contains(latest.value) {
            return RuleResult::new(
                self.name(),
                sensor_id,
                bounds.breach_severity,
                format!(
                    "value {} outside bounds [{}, {}]",
                    latest.value, bounds.min, bounds.max
                ),
            );
        }

        RuleResult::ok(self.name(), sensor_id)
    }
}

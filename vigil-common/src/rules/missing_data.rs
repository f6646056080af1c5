//! Stale or absent readings.

use super::{Rule, RuleResult, Severity};
use crate::window::MeasurementWindow;
use std::time::{Duration, Instant};

/// Degrades, then fails, a sensor whose latest reading grows old.
///
/// Age is measured from the latest reading's timestamp to the moment of
/// evaluation. `fail_age` is expected to exceed `max_age`; the failure check
/// runs first, so misordered limits still yield a defined result.
#[derive(Debug, Clone)]
pub struct MissingDataRule {
    max_age: Duration,
    fail_age: Duration,
}

impl MissingDataRule {
    pub fn new(max_age: Duration, fail_age: Duration) -> Self {
        Self { max_age, fail_age }
    }

    /// Evaluate as if the current instant were `now`.
    pub fn evaluate_at(
        &self,
        window: &MeasurementWindow,
        sensor_id: &str,
        now: Instant,
    ) -> RuleResult {
        let latest = window.latest(sensor_id);
        if !latest.valid {
            return RuleResult::new(
                self.name(),
                sensor_id,
                Severity::Failed,
                "no valid reading available",
            );
        }

        let age = now.saturating_duration_since(latest.timestamp);
        if age > self.fail_age {
            return RuleResult::new(
                self.name(),
                sensor_id,
                Severity::Failed,
                format!(
                    "reading age {}ms exceeds failure threshold {}ms",
                    age.as_millis(),
                    self.fail_age.as_millis()
                ),
            );
        }

        if age > self.max_age {
            return RuleResult::new(
                self.name(),
                sensor_id,
                Severity::Degraded,
                format!(
                    "reading age {}ms exceeds expected interval {}ms",
                    age.as_millis(),
                    self.max_age.as_millis()
                ),
            );
        }

        RuleResult::ok(self.name(), sensor_id)
    }
}

impl Rule for MissingDataRule {
    fn name(&self) -> &'static str {
        "MissingDataRule"
    }

    fn evaluate(&self, window: &MeasurementWindow, sensor_id: &str) -> RuleResult {
        self.evaluate_at(window, sensor_id, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;

    fn rule() -> MissingDataRule {
        MissingDataRule::new(Duration::from_secs(5), Duration::from_secs(15))
    }

    fn window_at(taken: Instant) -> MeasurementWindow {
        let mut window = MeasurementWindow::new(4);
        window.push(Reading::new("memory", 0.3, taken));
        window
    }

    #[test]
    fn fresh_reading_is_ok() {
        let taken = Instant::now();
        let result = rule().evaluate_at(&window_at(taken), "memory", taken + Duration::from_secs(1));
        assert!(result.is_ok());
    }

    #[test]
    fn stale_reading_degrades() {
        let taken = Instant::now();
        let result = rule().evaluate_at(&window_at(taken), "memory", taken + Duration::from_secs(6));
        assert_eq!(result.severity, Severity::Degraded);
    }

    #[test]
    fn very_stale_reading_fails() {
        let taken = Instant::now();
        let result =
            rule().evaluate_at(&window_at(taken), "memory", taken + Duration::from_secs(16));
        assert_eq!(result.severity, Severity::Failed);
        assert!(result.message.contains("failure threshold"));
    }

    #[test]
    fn age_at_limit_is_not_exceeded() {
        let taken = Instant::now();
        let result = rule().evaluate_at(&window_at(taken), "memory", taken + Duration::from_secs(5));
        assert!(result.is_ok());
    }

    #[test]
    fn invalid_reading_fails() {
        let mut window = MeasurementWindow::new(4);
        window.push(Reading::invalid("memory", Instant::now()));
        let result = rule().evaluate(&window, "memory");
        assert_eq!(result.severity, Severity::Failed);
    }

    #[test]
    fn unknown_sensor_fails() {
        let window = MeasurementWindow::new(4);
        assert_eq!(rule().evaluate(&window, "battery").severity, Severity::Failed);
    }
}

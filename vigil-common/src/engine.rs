//! Per-sensor health state machine.
//!
//! The engine ingests batches of readings, evaluates the registered rules
//! for every sensor that reported, and records each state change as an
//! append-only [`StateTransition`].
//!
//! # Severity resolution
//!
//! Rules run in registration order and the first non-OK result decides the
//! sensor's state; later rules are not consulted. Register the rules that
//! detect hard failures ahead of those that only detect degradation when a
//! failure must never be masked.
//!
//! # Aggregate
//!
//! The host state is the worst sensor state by `FAILED > UNKNOWN > DEGRADED > OK`.

use crate::reading::Reading;
use crate::rules::{Rule, RuleResult};
use crate::state::{StateTransition, SystemState};
use crate::window::{DEFAULT_CAPACITY, MeasurementWindow};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, info};

/// Transition reason recorded when rule evaluation changes a state.
pub const RULE_EVALUATION: &str = "rule_evaluation";

/// Undrained violations kept before the oldest are dropped.
pub const MAX_PENDING_VIOLATIONS: usize = 1024;

/// Rule-driven health evaluator for a set of sensors.
///
/// Not internally synchronized; drive it from a single task.
#[derive(Debug)]
pub struct Engine {
    window: MeasurementWindow,
    rules: Vec<Box<dyn Rule>>,
    states: HashMap<String, SystemState>,
    transitions: Vec<StateTransition>,
    violations: VecDeque<RuleResult>,
}

impl Engine {
    /// Create an engine whose window keeps `window_capacity` readings per sensor.
    pub fn new(window_capacity: usize) -> Self {
        Self {
            window: MeasurementWindow::new(window_capacity),
            rules: Vec::new(),
            states: HashMap::new(),
            transitions: Vec::new(),
            violations: VecDeque::new(),
        }
    }

    /// Register a rule after all previously registered ones.
    pub fn add_rule(&mut self, rule: impl Rule + 'static) {
        self.add_boxed_rule(Box::new(rule));
    }

    pub fn add_boxed_rule(&mut self, rule: Box<dyn Rule>) {
        debug!(rule = rule.name(), position = self.rules.len(), "Rule registered");
        self.rules.push(rule);
    }

    /// Builder form of [`Engine::add_rule`].
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.add_rule(rule);
        self
    }

    /// Names of the registered rules, in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Ingest a batch of readings and update sensor states.
    ///
    /// Readings are handled one at a time, in order. An empty batch does
    /// nothing.
    ///
    /// Each non-OK evaluation queues its deciding rule result for
    /// [`Engine::take_violations`]. At most [`MAX_PENDING_VIOLATIONS`] are
    /// held; callers that never drain lose the oldest.
    pub fn process<I>(&mut self, readings: I)
    where
        I: IntoIterator<Item = Reading>,
    {
        for reading in readings {
            let sensor_id = reading.sensor_id.clone();
            debug!(
                sensor = %sensor_id,
                value = reading.value,
                valid = reading.valid,
                "Processing reading"
            );
            self.window.push(reading);

            let current = match self.states.get(&sensor_id) {
                Some(state) => *state,
                None => {
                    self.states.insert(sensor_id.clone(), SystemState::Unknown);
                    SystemState::Unknown
                }
            };

            let (next, violation) = self.assess(&sensor_id);
            if let Some(violation) = violation {
                if self.violations.len() == MAX_PENDING_VIOLATIONS {
                    self.violations.pop_front();
                    debug!(sensor = %sensor_id, "Violation buffer full, dropped oldest");
                }
                self.violations.push_back(violation);
            }

            if next != current {
                self.transition(sensor_id, current, next, RULE_EVALUATION);
            }
        }
    }

    /// Compute the state the sensor's current history warrants.
    ///
    /// An invalid or missing latest reading is FAILED without consulting any
    /// rule. Otherwise the first non-OK rule result decides.
    pub fn evaluate_sensor(&self, sensor_id: &str) -> SystemState {
        self.assess(sensor_id).0
    }

    fn assess(&self, sensor_id: &str) -> (SystemState, Option<RuleResult>) {
        match self.window.last(sensor_id) {
            Some(latest) if latest.valid => {}
            _ => return (SystemState::Failed, None),
        }

        for rule in &self.rules {
            let result = rule.evaluate(&self.window, sensor_id);
            if !result.is_ok() {
                return (result.severity.into(), Some(result));
            }
        }

        (SystemState::Ok, None)
    }

    fn transition(&mut self, sensor_id: String, from: SystemState, to: SystemState, reason: &str) {
        info!(sensor = %sensor_id, %from, %to, reason, "Sensor state changed");
        self.states.insert(sensor_id.clone(), to);
        self.transitions.push(StateTransition {
            sensor_id,
            from,
            to,
            reason: reason.to_string(),
            timestamp: Instant::now(),
        });
    }

    /// Stored state of a sensor; UNKNOWN if it was never observed.
    pub fn sensor_state(&self, sensor_id: &str) -> SystemState {
        self.states
            .get(sensor_id)
            .copied()
            .unwrap_or(SystemState::Unknown)
    }

    /// Every observed sensor with its state, sorted by id.
    pub fn sensor_states(&self) -> Vec<(&str, SystemState)> {
        let mut states: Vec<(&str, SystemState)> = self
            .states
            .iter()
            .map(|(id, state)| (id.as_str(), *state))
            .collect();
        states.sort_unstable_by(|a, b| a.0.cmp(b.0));
        states
    }

    /// Worst state across all observed sensors; UNKNOWN when there are none.
    pub fn aggregate_state(&self) -> SystemState {
        self.states
            .values()
            .copied()
            .max_by_key(SystemState::aggregate_rank)
            .unwrap_or(SystemState::Unknown)
    }

    /// Full transition history, oldest first.
    ///
    /// The history only grows; callers remember how many entries they have
    /// already consumed.
    pub fn recent_transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Drain the rule results that decided a non-OK state since the last call.
    pub fn take_violations(&mut self) -> Vec<RuleResult> {
        self.violations.drain(..).collect()
    }

    /// Read-only access to the measurement history.
    pub fn window(&self) -> &MeasurementWindow {
        &self.window
    }

    /// Forget all sensors, history and transitions. Registered rules stay.
    pub fn reset(&mut self) {
        self.window.clear();
        self.states.clear();
        self.transitions.clear();
        self.violations.clear();
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleResult, Severity, ThresholdRule};

    struct Always(Severity, &'static str);

    impl Rule for Always {
        fn name(&self) -> &'static str {
            self.1
        }

        fn evaluate(&self, _window: &MeasurementWindow, sensor_id: &str) -> RuleResult {
            RuleResult::new(self.1, sensor_id, self.0, format!("always {}", self.0))
        }
    }

    fn pairs(engine: &Engine) -> Vec<(SystemState, SystemState)> {
        engine
            .recent_transitions()
            .iter()
            .map(|t| (t.from, t.to))
            .collect()
    }

    #[test]
    fn first_valid_reading_without_rules_is_ok() {
        let mut engine = Engine::new(8);
        engine.process(vec![Reading::now("cpu_load", 0.3)]);

        assert_eq!(engine.sensor_state("cpu_load"), SystemState::Ok);
        assert_eq!(pairs(&engine), vec![(SystemState::Unknown, SystemState::Ok)]);
        assert_eq!(engine.recent_transitions()[0].reason, RULE_EVALUATION);
    }

    #[test]
    fn invalid_reading_fails_without_consulting_rules() {
        let mut engine = Engine::new(8).with_rule(Always(Severity::Degraded, "Degrade"));
        engine.process(vec![Reading::invalid("memory", Instant::now())]);

        assert_eq!(engine.sensor_state("memory"), SystemState::Failed);
        assert!(engine.take_violations().is_empty());
    }

    #[test]
    fn first_non_ok_rule_wins() {
        let mut engine = Engine::new(8)
            .with_rule(Always(Severity::Degraded, "A"))
            .with_rule(Always(Severity::Failed, "B"));
        engine.process(vec![Reading::now("storage", 0.5)]);

        assert_eq!(engine.evaluate_sensor("storage"), SystemState::Degraded);
        let violations = engine.take_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_name, "A");
    }

    #[test]
    fn undrained_violations_are_capped() {
        let mut engine = Engine::new(8).with_rule(Always(Severity::Degraded, "A"));
        let readings: Vec<Reading> = (0..MAX_PENDING_VIOLATIONS + 10)
            .map(|_| Reading::now("memory", 0.5))
            .collect();
        engine.process(readings);

        assert_eq!(engine.take_violations().len(), MAX_PENDING_VIOLATIONS);
        assert!(engine.take_violations().is_empty());
    }

    #[test]
    fn failing_rule_first_fails() {
        let mut engine = Engine::new(8)
            .with_rule(Always(Severity::Failed, "B"))
            .with_rule(Always(Severity::Degraded, "A"));
        engine.process(vec![Reading::now("storage", 0.5)]);
        assert_eq!(engine.sensor_state("storage"), SystemState::Failed);
    }

    #[test]
    fn unchanged_state_records_no_transition() {
        let mut engine = Engine::new(8);
        engine.process(vec![Reading::now("cpu_load", 0.1), Reading::now("cpu_load", 0.2)]);
        assert_eq!(engine.recent_transitions().len(), 1);
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut engine = Engine::new(8);
        engine.process(Vec::new());
        assert!(engine.recent_transitions().is_empty());
        assert_eq!(engine.aggregate_state(), SystemState::Unknown);
    }

    #[test]
    fn unseen_sensor_is_unknown() {
        let engine = Engine::new(8);
        assert_eq!(engine.sensor_state("battery"), SystemState::Unknown);
    }

    #[test]
    fn aggregate_degraded_when_ok_and_degraded() {
        let mut engine = Engine::new(8).with_rule(ThresholdRule::for_sensor(
            "memory",
            0.0,
            0.9,
            Severity::Degraded,
        ));
        engine.process(vec![
            Reading::now("cpu_load", 0.2),
            Reading::now("memory", 0.95),
        ]);

        assert_eq!(engine.sensor_state("cpu_load"), SystemState::Ok);
        assert_eq!(engine.sensor_state("memory"), SystemState::Degraded);
        assert_eq!(engine.aggregate_state(), SystemState::Degraded);
    }

    #[test]
    fn aggregate_failed_dominates() {
        let mut engine = Engine::new(8).with_rule(ThresholdRule::for_sensor(
            "memory",
            0.0,
            0.9,
            Severity::Degraded,
        ));
        engine.process(vec![
            Reading::now("cpu_load", 0.2),
            Reading::now("memory", 0.95),
            Reading::invalid("battery", Instant::now()),
        ]);
        assert_eq!(engine.aggregate_state(), SystemState::Failed);
    }

    #[test]
    fn sensor_states_are_sorted() {
        let mut engine = Engine::new(8);
        engine.process(vec![Reading::now("storage", 0.1), Reading::now("battery", 0.9)]);
        let ids: Vec<&str> = engine.sensor_states().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["battery", "storage"]);
    }

    #[test]
    fn reset_forgets_sensors_but_keeps_rules() {
        let mut engine = Engine::new(8).with_rule(Always(Severity::Degraded, "A"));
        engine.process(vec![Reading::now("cpu_load", 0.1)]);
        engine.reset();

        assert!(engine.recent_transitions().is_empty());
        assert_eq!(engine.aggregate_state(), SystemState::Unknown);
        assert!(engine.window().is_empty());
        assert_eq!(engine.rule_names(), vec!["A"]);
    }
}

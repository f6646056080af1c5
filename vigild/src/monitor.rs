//! One monitoring cycle: schedule faults, poll sensors, inject, evaluate, log.

use crate::config::DaemonConfig;
use crate::event_log::EventLog;
use crate::schedule::{FaultSchedule, ScheduleAction};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use vigil_common::{
    Engine, FaultInjector, ImplausibleValueRule, MissingDataRule, RateOfChangeRule, Severity,
    ThresholdBounds, ThresholdRule,
};
use vigil_telemetry::sensor::{BATTERY, CPU_LOAD, MEMORY, STORAGE};
use vigil_telemetry::{BatterySensor, CpuLoadSensor, MemorySensor, SensorManager, StorageSensor};

/// Engine with the default rule chain: thresholds, implausible values,
/// rate of change, then missing data.
pub fn build_engine(config: &DaemonConfig) -> Engine {
    let usage = ThresholdBounds::new(0.0, config.threshold, Severity::Degraded);
    let thresholds = ThresholdRule::default()
        .with_bounds(CPU_LOAD, usage)
        .with_bounds(MEMORY, usage)
        .with_bounds(STORAGE, usage)
        .with_bounds(
            BATTERY,
            ThresholdBounds::new(1.0 - config.threshold, 1.0, Severity::Degraded),
        );

    let rules = &config.rules;
    Engine::new(config.window_capacity)
        .with_rule(thresholds)
        .with_rule(ImplausibleValueRule::new(
            rules.implausible_min,
            rules.implausible_max,
        ))
        .with_rule(RateOfChangeRule::new(rules.max_rate_per_second))
        .with_rule(MissingDataRule::new(
            rules.missing_max_age,
            rules.missing_fail_age,
        ))
}

/// The four host sensors at their configured intervals.
pub fn host_sensors(config: &DaemonConfig) -> SensorManager {
    let intervals = &config.sensors;
    let mut sensors = SensorManager::new();
    sensors.register(CpuLoadSensor::new(), intervals.cpu_load);
    sensors.register(MemorySensor::new(), intervals.memory);
    sensors.register(BatterySensor::new(), intervals.battery);
    sensors.register(
        StorageSensor::for_path(config.storage_path.clone()),
        intervals.storage,
    );
    sensors
}

/// Everything the run loop drives on each tick.
#[derive(Debug)]
pub struct Monitor {
    sensors: SensorManager,
    engine: Engine,
    injector: FaultInjector,
    schedule: FaultSchedule,
    events: EventLog,
    transitions_logged: usize,
    schedule_reported: bool,
}

impl Monitor {
    pub fn new(
        sensors: SensorManager,
        engine: Engine,
        schedule: FaultSchedule,
        events: EventLog,
    ) -> Self {
        Self {
            sensors,
            engine,
            injector: FaultInjector::new(),
            schedule,
            events,
            transitions_logged: 0,
            schedule_reported: false,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[cfg(test)]
    pub fn injector(&self) -> &FaultInjector {
        &self.injector
    }

    /// Run one cycle at `now`, `elapsed` after the daemon started.
    ///
    /// Delayed readings are held back here for the delay the injector asks
    /// for, so a cycle can take longer than one tick.
    pub async fn cycle(&mut self, now: Instant, elapsed: Duration) {
        self.apply_schedule(elapsed);

        let readings = self.sensors.poll(now);
        if readings.is_empty() {
            return;
        }

        let mut batch = Vec::with_capacity(readings.len());
        for reading in readings {
            let faulted = self.injector.apply(reading);
            if let Some(delay) = faulted.delay {
                debug!(
                    sensor = %faulted.reading.sensor_id,
                    delay_ms = delay.as_millis() as u64,
                    "Holding delayed reading"
                );
                tokio::time::sleep(delay).await;
            }
            self.events.reading(&faulted.reading);
            batch.push(faulted.reading);
        }

        self.engine.process(batch);

        let transitions = self.engine.recent_transitions();
        for transition in &transitions[self.transitions_logged..] {
            self.events.transition(transition);
        }
        self.transitions_logged = transitions.len();

        for violation in self.engine.take_violations() {
            self.events.rule_violation(&violation);
        }
    }

    fn apply_schedule(&mut self, elapsed: Duration) {
        for action in self.schedule.due(elapsed) {
            match action {
                ScheduleAction::Inject { sensor_id, fault } => {
                    self.events
                        .fault(&sensor_id, fault.kind(), fault.injected_value());
                    self.injector.inject(sensor_id, fault);
                }
                ScheduleAction::Clear { sensor_id } => {
                    self.injector.clear(&sensor_id);
                }
            }
        }

        if !self.schedule_reported && !self.schedule.is_empty() && self.schedule.is_finished() {
            info!(entries = self.schedule.len(), "Fault schedule complete");
            self.schedule_reported = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault_profile::FaultEntry;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use vigil_common::{Fault, Reading, SystemState};
    use vigil_telemetry::Sensor;

    struct Scripted {
        id: &'static str,
        values: VecDeque<f64>,
    }

    impl Scripted {
        fn new(id: &'static str, values: &[f64]) -> Self {
            Self {
                id,
                values: values.iter().copied().collect(),
            }
        }
    }

    impl Sensor for Scripted {
        fn id(&self) -> &str {
            self.id
        }

        fn read(&mut self) -> Reading {
            match self.values.pop_front() {
                Some(value) => Reading::now(self.id, value),
                None => Reading::invalid(self.id, Instant::now()),
            }
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn events(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }

        fn of_type(&self, kind: &str) -> Vec<Value> {
            self.events()
                .into_iter()
                .filter(|event| event["type"] == kind)
                .collect()
        }
    }

    fn monitor(sensor: Scripted, entries: Vec<FaultEntry>, sink: &Captured) -> Monitor {
        let mut sensors = SensorManager::new();
        sensors.register(sensor, Duration::from_millis(100));
        // Scripted readings are stamped with wall time, so consecutive
        // cycles can be microseconds apart.
        let mut config = DaemonConfig::default();
        config.rules.max_rate_per_second = f64::INFINITY;
        Monitor::new(
            sensors,
            build_engine(&config),
            FaultSchedule::new(entries),
            EventLog::new().with_writer(sink.clone()),
        )
    }

    #[test]
    fn default_chain_order() {
        let engine = build_engine(&DaemonConfig::default());
        assert_eq!(
            engine.rule_names(),
            vec![
                "ThresholdRule",
                "ImplausibleValueRule",
                "RateOfChangeRule",
                "MissingDataRule"
            ]
        );
    }

    #[test]
    fn host_sensors_registered_in_order() {
        let sensors = host_sensors(&DaemonConfig::default());
        assert_eq!(sensors.ids(), vec!["cpu_load", "memory", "battery", "storage"]);
    }

    #[tokio::test]
    async fn transitions_are_logged_once() {
        let sink = Captured::default();
        let mut monitor = monitor(Scripted::new("memory", &[0.4, 0.4]), Vec::new(), &sink);

        let start = Instant::now();
        monitor.cycle(start, Duration::ZERO).await;
        monitor
            .cycle(start + Duration::from_millis(100), Duration::from_millis(100))
            .await;

        let transitions = sink.of_type("transition");
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0]["from"], "UNKNOWN");
        assert_eq!(transitions[0]["to"], "OK");
        assert_eq!(sink.of_type("reading").len(), 2);
    }

    #[tokio::test]
    async fn scheduled_fault_is_logged_applied_and_cleared() {
        let sink = Captured::default();
        let entries = vec![FaultEntry {
            sensor_id: "memory".to_string(),
            fault: Fault::InvalidValue { value: 999.0 },
            trigger_after: Duration::from_millis(100),
            duration: Some(Duration::from_millis(100)),
        }];
        let mut monitor = monitor(Scripted::new("memory", &[0.4, 0.4, 0.4]), entries, &sink);

        let start = Instant::now();
        for step in 0..3u64 {
            let elapsed = Duration::from_millis(100 * step);
            monitor.cycle(start + elapsed, elapsed).await;
        }

        let faults = sink.of_type("fault");
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0]["sensor"], "memory");
        assert_eq!(faults[0]["fault_type"], "InvalidValue");
        assert_eq!(faults[0]["injected_value"], 999.0);

        let values: Vec<f64> = sink
            .of_type("reading")
            .iter()
            .map(|r| r["value"].as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![0.4, 999.0, 0.4]);

        // The usage threshold is checked first, so 999 degrades rather than fails.
        let to: Vec<String> = sink
            .of_type("transition")
            .iter()
            .map(|t| t["to"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(to, vec!["OK", "DEGRADED", "OK"]);
        assert_eq!(monitor.engine().sensor_state("memory"), SystemState::Ok);
        assert!(!monitor.injector().has_fault("memory"));

        let violations = sink.of_type("rule_violation");
        assert!(!violations.is_empty());
    }

    #[tokio::test]
    async fn delayed_reading_is_held_back() {
        let sink = Captured::default();
        let entries = vec![FaultEntry {
            sensor_id: "cpu_load".to_string(),
            fault: Fault::DelayedReading {
                delay: Duration::from_millis(30),
            },
            trigger_after: Duration::ZERO,
            duration: None,
        }];
        let mut monitor = monitor(Scripted::new("cpu_load", &[0.2]), entries, &sink);

        let started = Instant::now();
        monitor.cycle(started, Duration::ZERO).await;

        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(sink.of_type("reading").len(), 1);
        assert_eq!(monitor.engine().sensor_state("cpu_load"), SystemState::Ok);
    }

    #[tokio::test]
    async fn idle_tick_logs_nothing() {
        let sink = Captured::default();
        let mut monitor = monitor(Scripted::new("storage", &[0.1]), Vec::new(), &sink);

        let start = Instant::now();
        monitor.cycle(start, Duration::ZERO).await;
        let before = sink.events().len();
        monitor
            .cycle(start + Duration::from_millis(50), Duration::from_millis(50))
            .await;
        assert_eq!(sink.events().len(), before);
    }
}

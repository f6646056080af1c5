//! Per-sensor polling intervals.

use crate::sensor::Sensor;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use vigil_common::Reading;

#[derive(Debug)]
struct Registration {
    sensor: Box<dyn Sensor>,
    interval: Duration,
    last_polled: Option<Instant>,
}

impl Registration {
    fn is_due(&self, now: Instant) -> bool {
        match self.last_polled {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }
}

/// Polls registered sensors, each at its own interval.
///
/// The first poll reads every sensor. Afterwards a sensor is read once its
/// interval has elapsed since it was last read.
#[derive(Debug, Default)]
pub struct SensorManager {
    sensors: Vec<Registration>,
}

impl SensorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sensor: impl Sensor + 'static, interval: Duration) {
        self.register_boxed(Box::new(sensor), interval);
    }

    pub fn register_boxed(&mut self, sensor: Box<dyn Sensor>, interval: Duration) {
        debug!(sensor = sensor.id(), interval_ms = interval.as_millis() as u64, "Sensor registered");
        self.sensors.push(Registration {
            sensor,
            interval,
            last_polled: None,
        });
    }

    /// Read every sensor due at `now`, in registration order.
    pub fn poll(&mut self, now: Instant) -> Vec<Reading> {
        let mut readings = Vec::new();
        for registration in &mut self.sensors {
            if !registration.is_due(now) {
                continue;
            }
            registration.last_polled = Some(now);
            let reading = registration.sensor.read();
            trace!(
                sensor = %reading.sensor_id,
                value = reading.value,
                valid = reading.valid,
                "Sensor polled"
            );
            readings.push(reading);
        }
        readings
    }

    /// Read every sensor once regardless of interval. Does not affect `poll`.
    pub fn read_all(&mut self) -> Vec<Reading> {
        self.sensors
            .iter_mut()
            .map(|registration| registration.sensor.read())
            .collect()
    }

    /// Registered sensor ids, in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.sensors.iter().map(|r| r.sensor.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

//! Sensor readings.

use std::time::Instant;

/// One timestamped sample from a sensor.
///
/// `timestamp` is monotonic and only meaningful relative to other readings
/// taken in the same process. Timestamps for a given sensor are expected to
/// be non-decreasing; nothing enforces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Sampled value, normalized by the producing sensor.
    pub value: f64,
    /// When the sample was taken.
    pub timestamp: Instant,
    /// False when the sensor could not produce a trustworthy value.
    pub valid: bool,
    /// Identifier of the producing sensor.
    pub sensor_id: String,
}

impl Reading {
    /// A valid reading taken at `timestamp`.
    pub fn new(sensor_id: impl Into<String>, value: f64, timestamp: Instant) -> Self {
        Self {
            value,
            timestamp,
            valid: true,
            sensor_id: sensor_id.into(),
        }
    }

    /// A valid reading stamped with the current instant.
    pub fn now(sensor_id: impl Into<String>, value: f64) -> Self {
        Self::new(sensor_id, value, Instant::now())
    }

    /// An invalid reading. The value is zero and must not be interpreted.
    pub fn invalid(sensor_id: impl Into<String>, timestamp: Instant) -> Self {
        Self {
            value: 0.0,
            timestamp,
            valid: false,
            sensor_id: sensor_id.into(),
        }
    }
}

//! Deterministic fault injection for sensor readings.
//!
//! A [`FaultInjector`] sits between the sensors and the engine and rewrites
//! readings for sensors with an active fault. Each sensor holds at most one
//! fault; injecting again replaces it.
//!
//! | Fault              | Effect on the reading              | Lifetime                   |
//! |--------------------|------------------------------------|----------------------------|
//! | `InvalidValue`     | value replaced, still valid        | until cleared              |
//! | `Spike`            | value replaced, still valid        | one application            |
//! | `MissingUpdate`    | marked invalid                     | `suppress_cycles` applications |
//! | `InterfaceFailure` | marked invalid                     | until cleared              |
//! | `DelayedReading`   | unchanged, delay requested         | until cleared              |
//!
//! The injector never blocks. A delayed reading is returned with the latency
//! the caller's scheduling loop should wait before handing it on.

use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Fault category, as named in fault profiles and event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    InvalidValue,
    DelayedReading,
    MissingUpdate,
    Spike,
    InterfaceFailure,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidValue => "InvalidValue",
            Self::DelayedReading => "DelayedReading",
            Self::MissingUpdate => "MissingUpdate",
            Self::Spike => "Spike",
            Self::InterfaceFailure => "InterfaceFailure",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    /// Replace the value on every reading.
    InvalidValue { value: f64 },
    /// Replace the value on the next reading only.
    Spike { value: f64 },
    /// Mark the next `suppress_cycles` readings invalid.
    MissingUpdate { suppress_cycles: u32 },
    /// Mark every reading invalid.
    InterfaceFailure,
    /// Ask the caller to hold every reading back by `delay`.
    DelayedReading { delay: Duration },
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::InvalidValue { .. } => FaultKind::InvalidValue,
            Self::Spike { .. } => FaultKind::Spike,
            Self::MissingUpdate { .. } => FaultKind::MissingUpdate,
            Self::InterfaceFailure => FaultKind::InterfaceFailure,
            Self::DelayedReading { .. } => FaultKind::DelayedReading,
        }
    }

    /// Value written into readings, or zero for faults that do not write one.
    pub fn injected_value(&self) -> f64 {
        match self {
            Self::InvalidValue { value } | Self::Spike { value } => *value,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveFault {
    fault: Fault,
    cycles_remaining: u32,
}

/// A reading after fault application.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultedReading {
    pub reading: Reading,
    /// Latency to realize before the reading is processed.
    pub delay: Option<Duration>,
}

impl FaultedReading {
    fn passthrough(reading: Reading) -> Self {
        Self {
            reading,
            delay: None,
        }
    }
}

/// Per-sensor fault table applied to readings before evaluation.
///
/// Not internally synchronized; drive it from the same task as the engine.
#[derive(Debug, Default)]
pub struct FaultInjector {
    faults: HashMap<String, ActiveFault>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `fault` for `sensor_id`, replacing any fault already active.
    pub fn inject(&mut self, sensor_id: impl Into<String>, fault: Fault) {
        let sensor_id = sensor_id.into();
        let cycles_remaining = match fault {
            Fault::MissingUpdate { suppress_cycles } => suppress_cycles,
            _ => 0,
        };
        info!(
            sensor = %sensor_id,
            fault_type = %fault.kind(),
            injected_value = fault.injected_value(),
            "Fault injected"
        );
        self.faults.insert(
            sensor_id,
            ActiveFault {
                fault,
                cycles_remaining,
            },
        );
    }

    /// Remove the fault for `sensor_id`. Returns whether one was active.
    pub fn clear(&mut self, sensor_id: &str) -> bool {
        let removed = self.faults.remove(sensor_id).is_some();
        if removed {
            info!(sensor = %sensor_id, "Fault cleared");
        }
        removed
    }

    /// Remove every active fault.
    pub fn clear_all(&mut self) {
        if !self.faults.is_empty() {
            info!(count = self.faults.len(), "All faults cleared");
        }
        self.faults.clear();
    }

    pub fn has_fault(&self, sensor_id: &str) -> bool {
        self.faults.contains_key(sensor_id)
    }

    /// The fault currently active for `sensor_id`.
    pub fn active_fault(&self, sensor_id: &str) -> Option<Fault> {
        self.faults.get(sensor_id).map(|active| active.fault)
    }

    /// Number of sensors with an active fault.
    pub fn active_count(&self) -> usize {
        self.faults.len()
    }

    /// Apply the sensor's active fault, if any, to `reading`.
    pub fn apply(&mut self, mut reading: Reading) -> FaultedReading {
        let Some(active) = self.faults.get_mut(&reading.sensor_id) else {
            return FaultedReading::passthrough(reading);
        };

        let mut delay = None;
        let mut expired = false;

        match active.fault {
            Fault::InvalidValue { value } => {
                reading.value = value;
            }
            Fault::Spike { value } => {
                reading.value = value;
                expired = true;
            }
            Fault::MissingUpdate { .. } => {
                if active.cycles_remaining > 0 {
                    active.cycles_remaining -= 1;
                    reading.valid = false;
                } else {
                    expired = true;
                }
            }
            Fault::InterfaceFailure => {
                reading.valid = false;
            }
            Fault::DelayedReading { delay: requested } => {
                delay = Some(requested);
            }
        }

        debug!(
            sensor = %reading.sensor_id,
            fault_type = %active.fault.kind(),
            value = reading.value,
            valid = reading.valid,
            "Fault applied"
        );

        if expired {
            debug!(sensor = %reading.sensor_id, "Fault expired");
            self.faults.remove(&reading.sensor_id);
        }

        FaultedReading { reading, delay }
    }
}

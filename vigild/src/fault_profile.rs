//! Declarative fault profiles.
//!
//! A profile is a JSON document listing faults to inject while the daemon
//! runs:
//!
//! ```json
//! {
//!   "faults": [
//!     { "sensor_id": "cpu_load", "type": "Spike", "value": 0.99, "trigger_after_s": 5.0 },
//!     { "sensor_id": "battery", "type": "InterfaceFailure", "trigger_after_s": 10, "duration_s": 5 }
//!   ]
//! }
//! ```
//!
//! Optional fields default to zero. A `duration_s` of zero leaves the fault
//! active until the process exits (or the fault expires on its own).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vigil_common::Fault;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("cannot open fault profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed fault profile: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fault #{index}: unknown fault type '{name}'")]
    UnknownFaultType { index: usize, name: String },

    #[error("fault #{index}: sensor_id is empty")]
    EmptySensorId { index: usize },

    #[error("fault #{index}: {field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidTime {
        index: usize,
        field: &'static str,
        value: f64,
    },
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    faults: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    sensor_id: String,
    #[serde(rename = "type")]
    fault_type: String,
    #[serde(default)]
    value: f64,
    #[serde(default)]
    suppress_cycles: u32,
    #[serde(default)]
    delay_ms: u64,
    #[serde(default)]
    trigger_after_s: f64,
    #[serde(default)]
    duration_s: f64,
}

impl RawEntry {
    fn into_entry(self, index: usize) -> Result<FaultEntry, ProfileError> {
        if self.sensor_id.trim().is_empty() {
            return Err(ProfileError::EmptySensorId { index });
        }

        let fault = match self.fault_type.as_str() {
            "Spike" => Fault::Spike { value: self.value },
            "InvalidValue" => Fault::InvalidValue { value: self.value },
            "MissingUpdate" => Fault::MissingUpdate {
                suppress_cycles: self.suppress_cycles,
            },
            "DelayedReading" => Fault::DelayedReading {
                delay: Duration::from_millis(self.delay_ms),
            },
            "InterfaceFailure" => Fault::InterfaceFailure,
            _ => {
                return Err(ProfileError::UnknownFaultType {
                    index,
                    name: self.fault_type,
                });
            }
        };

        let trigger_after = seconds(index, "trigger_after_s", self.trigger_after_s)?;
        let duration = seconds(index, "duration_s", self.duration_s)?;

        Ok(FaultEntry {
            sensor_id: self.sensor_id,
            fault,
            trigger_after,
            duration: (!duration.is_zero()).then_some(duration),
        })
    }
}

fn seconds(index: usize, field: &'static str, value: f64) -> Result<Duration, ProfileError> {
    Duration::try_from_secs_f64(value).map_err(|_| ProfileError::InvalidTime {
        index,
        field,
        value,
    })
}

/// One scheduled fault.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultEntry {
    pub sensor_id: String,
    pub fault: Fault,
    /// Delay after daemon start before the fault is injected.
    pub trigger_after: Duration,
    /// How long the fault stays active; `None` means until shutdown.
    pub duration: Option<Duration>,
}

/// A parsed and validated fault profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultProfile {
    pub entries: Vec<FaultEntry>,
}

impl FaultProfile {
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ProfileError> {
        let raw: RawProfile = serde_json::from_str(content)?;
        let entries = raw
            .faults
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_entry(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

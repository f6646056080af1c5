//! Battery charge fraction from the power_supply class in sysfs.
//!
//! The first entry (by name) whose `type` file reads `Battery` is used.
//! Hosts without a battery produce invalid readings.

use crate::sensor::{BATTERY, Sensor};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};
use vigil_common::Reading;

#[derive(Error, Debug)]
pub enum BatteryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no battery under {0}")]
    NotPresent(PathBuf),

    #[error("invalid capacity '{0}'")]
    InvalidCapacity(String),
}

/// Parse a `capacity` file (percent) into a fraction.
pub fn parse_capacity(content: &str) -> Result<f64, BatteryError> {
    let trimmed = content.trim();
    let percent: f64 = trimmed
        .parse()
        .map_err(|_| BatteryError::InvalidCapacity(trimmed.to_string()))?;
    if !percent.is_finite() {
        return Err(BatteryError::InvalidCapacity(trimmed.to_string()));
    }
    Ok(percent / 100.0)
}

/// Locate the first `power_supply` entry of type `Battery`.
pub fn find_battery(power_supply_dir: &Path) -> Result<PathBuf, BatteryError> {
    let read_err = |source| BatteryError::Read {
        path: power_supply_dir.to_path_buf(),
        source,
    };
    let mut entries: Vec<PathBuf> = std::fs::read_dir(power_supply_dir)
        .map_err(read_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    entries
        .into_iter()
        .find(|entry| {
            std::fs::read_to_string(entry.join("type"))
                .map(|kind| kind.trim() == "Battery")
                .unwrap_or(false)
        })
        .ok_or_else(|| BatteryError::NotPresent(power_supply_dir.to_path_buf()))
}

/// `battery` sensor.
#[derive(Debug, Clone)]
pub struct BatterySensor {
    power_supply_dir: PathBuf,
    failure_reported: bool,
}

impl BatterySensor {
    pub fn new() -> Self {
        Self::with_sys_root("/sys")
    }

    pub fn with_sys_root(root: impl Into<PathBuf>) -> Self {
        Self {
            power_supply_dir: root.into().join("class").join("power_supply"),
            failure_reported: false,
        }
    }

    /// Whether the current run of failed samples has been logged at warn level.
    pub fn failure_reported(&self) -> bool {
        self.failure_reported
    }

    pub fn sample(&self) -> Result<f64, BatteryError> {
        let battery = find_battery(&self.power_supply_dir)?;
        let capacity_path = battery.join("capacity");
        let content =
            std::fs::read_to_string(&capacity_path).map_err(|source| BatteryError::Read {
                path: capacity_path.clone(),
                source,
            })?;
        let fraction = parse_capacity(&content)?;
        debug!(battery = %battery.display(), fraction, "Battery sampled");
        Ok(fraction)
    }
}

impl Default for BatterySensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for BatterySensor {
    fn id(&self) -> &str {
        BATTERY
    }

    fn read(&mut self) -> Reading {
        match self.sample() {
            Ok(value) => {
                self.failure_reported = false;
                Reading::now(BATTERY, value)
            }
            Err(e) => {
                // Hosts without a battery fail every sample; warn once per streak.
                if self.failure_reported {
                    debug!(sensor = BATTERY, error = %e, "Battery still unavailable");
                } else {
                    warn!(sensor = BATTERY, error = %e, "Battery sample failed");
                    self.failure_reported = true;
                }
                Reading::invalid(BATTERY, Instant::now())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_percent() {
        assert_eq!(parse_capacity("87\n").unwrap(), 0.87);
        assert_eq!(parse_capacity("100").unwrap(), 1.0);
    }

    #[test]
    fn garbage_capacity_is_rejected() {
        assert!(matches!(
            parse_capacity("full"),
            Err(BatteryError::InvalidCapacity(_))
        ));
        assert!(matches!(
            parse_capacity("NaN"),
            Err(BatteryError::InvalidCapacity(_))
        ));
    }
}

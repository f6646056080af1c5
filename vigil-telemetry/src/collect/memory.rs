//! Used memory fraction from /proc/meminfo.

use crate::sensor::{MEMORY, Sensor};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};
use vigil_common::Reading;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse /proc/meminfo: missing required field '{0}'")]
    MissingField(&'static str),

    #[error("MemTotal is zero")]
    ZeroTotal,
}

/// The /proc/meminfo fields the memory sensor needs, in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    /// Kernel estimate of memory available for new allocations.
    pub available_kb: u64,
}

impl MemoryInfo {
    pub fn parse(content: &str) -> Result<Self, MemoryError> {
        let fields: HashMap<&str, u64> = content
            .lines()
            .filter_map(|line| {
                let (key, rest) = line.split_once(':')?;
                let kb = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
                Some((key.trim(), kb))
            })
            .collect();

        let total_kb = *fields
            .get("MemTotal")
            .ok_or(MemoryError::MissingField("MemTotal"))?;
        if total_kb == 0 {
            return Err(MemoryError::ZeroTotal);
        }
        let free_kb = *fields
            .get("MemFree")
            .ok_or(MemoryError::MissingField("MemFree"))?;

        // Kernels before 3.14 have no MemAvailable.
        let available_kb = match fields.get("MemAvailable") {
            Some(kb) => *kb,
            None => {
                let buffers = fields.get("Buffers").copied().unwrap_or(0);
                let cached = fields.get("Cached").copied().unwrap_or(0);
                debug!(free_kb, buffers, cached, "MemAvailable missing, estimating");
                free_kb + buffers + cached
            }
        };

        Ok(Self {
            total_kb,
            free_kb,
            available_kb,
        })
    }

    /// `(total - available) / total`, clamped to `[0, 1]`.
    pub fn used_fraction(&self) -> f64 {
        let used = self.total_kb.saturating_sub(self.available_kb);
        used as f64 / self.total_kb as f64
    }
}

/// `memory` sensor.
#[derive(Debug, Clone)]
pub struct MemorySensor {
    meminfo_path: PathBuf,
}

impl MemorySensor {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        Self {
            meminfo_path: root.into().join("meminfo"),
        }
    }

    pub fn sample(&self) -> Result<f64, MemoryError> {
        let content =
            std::fs::read_to_string(&self.meminfo_path).map_err(|source| MemoryError::Read {
                path: self.meminfo_path.clone(),
                source,
            })?;
        let info = MemoryInfo::parse(&content)?;
        Ok(info.used_fraction())
    }
}

impl Default for MemorySensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for MemorySensor {
    fn id(&self) -> &str {
        MEMORY
    }

    fn read(&mut self) -> Reading {
        match self.sample() {
            Ok(value) => Reading::now(MEMORY, value),
            Err(e) => {
                warn!(sensor = MEMORY, error = %e, "Memory sample failed");
                Reading::invalid(MEMORY, Instant::now())
            }
        }
    }
}

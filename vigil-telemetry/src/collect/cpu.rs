//! CPU busy fraction from /proc/stat.

use crate::sensor::{CPU_LOAD, Sensor};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};
use vigil_common::Reading;

#[derive(Error, Debug)]
pub enum CpuError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse /proc/stat: {0}")]
    Parse(String),
}

/// Aggregate CPU counters, in jiffies since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStats {
    /// Parse the aggregate `cpu ` line of /proc/stat content.
    ///
    /// Kernels older than 2.6.11 omit the trailing columns; missing ones
    /// read as zero.
    pub fn parse(content: &str) -> Result<Self, CpuError> {
        let line = content
            .lines()
            .find(|line| line.starts_with("cpu "))
            .ok_or_else(|| CpuError::Parse("no aggregate cpu line".to_string()))?;

        let fields = line
            .split_whitespace()
            .skip(1)
            .map(|field| {
                field
                    .parse::<u64>()
                    .map_err(|_| CpuError::Parse(format!("invalid counter '{field}'")))
            })
            .collect::<Result<Vec<u64>, CpuError>>()?;

        if fields.len() < 4 {
            return Err(CpuError::Parse(format!(
                "cpu line has {} counters, expected at least 4",
                fields.len()
            )));
        }

        let at = |idx: usize| fields.get(idx).copied().unwrap_or(0);
        Ok(Self {
            user: at(0),
            nice: at(1),
            system: at(2),
            idle: at(3),
            iowait: at(4),
            irq: at(5),
            softirq: at(6),
            steal: at(7),
        })
    }

    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Time not spent idle or waiting on I/O.
    pub fn busy(&self) -> u64 {
        self.total()
            .saturating_sub(self.idle)
            .saturating_sub(self.iowait)
    }

    /// Busy fraction in `[0, 1]` between two samples; zero if no time passed.
    pub fn busy_fraction(prev: &CpuStats, curr: &CpuStats) -> f64 {
        let total = curr.total().saturating_sub(prev.total());
        if total == 0 {
            return 0.0;
        }
        let busy = curr.busy().saturating_sub(prev.busy()).min(total);
        busy as f64 / total as f64
    }
}

/// `cpu_load` sensor.
///
/// Each read compares against the previous sample. The first read has no
/// previous sample and measures the average since boot.
#[derive(Debug)]
pub struct CpuLoadSensor {
    stat_path: PathBuf,
    prev: Option<CpuStats>,
}

impl CpuLoadSensor {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        Self {
            stat_path: root.into().join("stat"),
            prev: None,
        }
    }

    /// Take a sample and return the busy fraction since the previous one.
    pub fn sample(&mut self) -> Result<f64, CpuError> {
        let content =
            std::fs::read_to_string(&self.stat_path).map_err(|source| CpuError::Read {
                path: self.stat_path.clone(),
                source,
            })?;
        let curr = CpuStats::parse(&content)?;
        let prev = self.prev.replace(curr).unwrap_or_default();
        let fraction = CpuStats::busy_fraction(&prev, &curr);
        debug!(busy_fraction = fraction, "CPU sampled");
        Ok(fraction)
    }
}

impl Default for CpuLoadSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for CpuLoadSensor {
    fn id(&self) -> &str {
        CPU_LOAD
    }

    fn read(&mut self) -> Reading {
        match self.sample() {
            Ok(value) => Reading::now(CPU_LOAD, value),
            Err(e) => {
                warn!(sensor = CPU_LOAD, error = %e, "CPU sample failed");
                Reading::invalid(CPU_LOAD, Instant::now())
            }
        }
    }
}

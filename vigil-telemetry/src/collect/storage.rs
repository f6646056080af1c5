//! Filesystem usage fraction via sysinfo.

use crate::sensor::{STORAGE, Sensor};
use std::path::{Path, PathBuf};
use std::time::Instant;
use sysinfo::Disks;
use thiserror::Error;
use tracing::{debug, warn};
use vigil_common::Reading;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StorageError {
    #[error("no mounted filesystem contains {0}")]
    NoFilesystem(PathBuf),

    #[error("filesystem at {0} reports zero capacity")]
    ZeroCapacity(PathBuf),
}

/// `1 - available / total`, clamped to `[0, 1]`.
pub fn usage_fraction(total_bytes: u64, available_bytes: u64) -> Option<f64> {
    if total_bytes == 0 {
        return None;
    }
    let used = total_bytes.saturating_sub(available_bytes);
    Some(used as f64 / total_bytes as f64)
}

/// Index of the mount point that most specifically contains `path`.
pub fn best_mount<'a, I>(path: &Path, mount_points: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a Path>,
{
    mount_points
        .into_iter()
        .enumerate()
        .filter(|(_, mount)| path.starts_with(mount))
        .max_by_key(|(_, mount)| mount.components().count())
        .map(|(idx, _)| idx)
}

/// `storage` sensor, watching the filesystem that holds `path` (`/` by default).
#[derive(Debug, Clone)]
pub struct StorageSensor {
    path: PathBuf,
}

impl StorageSensor {
    pub fn new() -> Self {
        Self::for_path("/")
    }

    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn sample(&self) -> Result<f64, StorageError> {
        let disks = Disks::new_with_refreshed_list();
        let list = disks.list();
        let idx = best_mount(&self.path, list.iter().map(|disk| disk.mount_point()))
            .ok_or_else(|| StorageError::NoFilesystem(self.path.clone()))?;
        let disk = &list[idx];

        let fraction = usage_fraction(disk.total_space(), disk.available_space())
            .ok_or_else(|| StorageError::ZeroCapacity(disk.mount_point().to_path_buf()))?;
        debug!(
            mount = %disk.mount_point().display(),
            total = disk.total_space(),
            available = disk.available_space(),
            "Storage sampled"
        );
        Ok(fraction)
    }
}

impl Default for StorageSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for StorageSensor {
    fn id(&self) -> &str {
        STORAGE
    }

    fn read(&mut self) -> Reading {
        match self.sample() {
            Ok(value) => Reading::now(STORAGE, value),
            Err(e) => {
                warn!(sensor = STORAGE, error = %e, "Storage sample failed");
                Reading::invalid(STORAGE, Instant::now())
            }
        }
    }
}

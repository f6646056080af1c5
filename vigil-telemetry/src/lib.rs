//! Host sensors for Vigil.
//!
//! Each sensor produces one normalized [`Reading`](vigil_common::Reading)
//! per call, in `[0, 1]`, or an invalid reading when the underlying
//! source cannot be read. [`SensorManager`] decides which sensors are due
//! on each tick.

#![forbid(unsafe_code)]

pub mod collect;
pub mod manager;
pub mod sensor;

pub use collect::battery::{BatteryError, BatterySensor};
pub use collect::cpu::{CpuError, CpuLoadSensor, CpuStats};
pub use collect::memory::{MemoryError, MemoryInfo, MemorySensor};
pub use collect::storage::{StorageError, StorageSensor};
pub use manager::SensorManager;
pub use sensor::Sensor;

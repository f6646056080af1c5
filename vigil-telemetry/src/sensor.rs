//! The sensor contract.

use vigil_common::Reading;

/// Sensor id of the CPU busy fraction.
pub const CPU_LOAD: &str = "cpu_load";
/// Sensor id of the used memory fraction.
pub const MEMORY: &str = "memory";
/// Sensor id of the root filesystem usage fraction.
pub const STORAGE: &str = "storage";
/// Sensor id of the battery charge fraction.
pub const BATTERY: &str = "battery";

/// A source of readings for one sensor id.
///
/// `read` never fails: a sensor that cannot sample returns
/// [`Reading::invalid`] and lets the engine decide what that means.
pub trait Sensor: Send {
    fn id(&self) -> &str;

    fn read(&mut self) -> Reading;
}

impl std::fmt::Debug for dyn Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor").field("id", &self.id()).finish()
    }
}

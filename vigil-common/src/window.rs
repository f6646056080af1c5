//! Bounded per-sensor measurement history.
//!
//! Every sensor gets a ring of `capacity` readings, allocated on the first
//! push for that sensor. Once a ring is full each push overwrites the oldest
//! slot in place, so steady-state pushes never allocate.

use crate::reading::Reading;
use std::collections::HashMap;
use std::time::Instant;

/// Default history depth per sensor.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug)]
struct Ring {
    slots: Vec<Reading>,
    /// Index of the most recent reading.
    head: usize,
}

impl Ring {
    fn with_first(reading: Reading, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.push(reading);
        Self { slots, head: 0 }
    }

    fn push(&mut self, reading: Reading, capacity: usize) {
        if self.slots.len() < capacity {
            self.slots.push(reading);
            self.head = self.slots.len() - 1;
        } else {
            self.head = (self.head + 1) % capacity;
            self.slots[self.head] = reading;
        }
    }

    /// The ring split into (oldest..end, start..oldest).
    fn halves(&self, capacity: usize) -> (&[Reading], &[Reading]) {
        if self.slots.len() < capacity {
            (&self.slots[..], &[])
        } else {
            let oldest = (self.head + 1) % capacity;
            (&self.slots[oldest..], &self.slots[..oldest])
        }
    }
}

/// Fixed-depth history of readings, keyed by sensor id.
///
/// The capacity is shared by all sensors and fixed for the lifetime of the
/// window, so every rule evaluating a sensor sees the same history depth.
#[derive(Debug)]
pub struct MeasurementWindow {
    capacity: usize,
    rings: HashMap<String, Ring>,
    created_at: Instant,
}

impl MeasurementWindow {
    /// Create a window holding up to `capacity` readings per sensor.
    ///
    /// A capacity of zero is raised to one; the latest reading must always
    /// be retrievable.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rings: HashMap::new(),
            created_at: Instant::now(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading to its sensor's ring, evicting the oldest at capacity.
    pub fn push(&mut self, reading: Reading) {
        if let Some(ring) = self.rings.get_mut(&reading.sensor_id) {
            ring.push(reading, self.capacity);
        } else {
            let id = reading.sensor_id.clone();
            self.rings.insert(id, Ring::with_first(reading, self.capacity));
        }
    }

    /// Most recent reading for `sensor_id`.
    ///
    /// Unknown sensors yield an invalid sentinel reading carrying the
    /// requested id and the window's creation instant as timestamp.
    pub fn latest(&self, sensor_id: &str) -> Reading {
        match self.last(sensor_id) {
            Some(reading) => reading.clone(),
            None => Reading::invalid(sensor_id, self.created_at),
        }
    }

    /// Borrow the most recent reading, if the sensor has any.
    pub fn last(&self, sensor_id: &str) -> Option<&Reading> {
        self.rings.get(sensor_id).and_then(|r| r.slots.get(r.head))
    }

    /// Snapshot of the sensor's history, oldest first.
    pub fn readings_for(&self, sensor_id: &str) -> Vec<Reading> {
        self.iter(sensor_id).cloned().collect()
    }

    /// Borrowing view of the sensor's history, oldest first.
    pub fn iter<'a>(
        &'a self,
        sensor_id: &str,
    ) -> impl DoubleEndedIterator<Item = &'a Reading> + use<'a> {
        let (older, newer) = match self.rings.get(sensor_id) {
            Some(ring) => ring.halves(self.capacity),
            None => (&[][..], &[][..]),
        };
        older.iter().chain(newer.iter())
    }

    /// Number of readings currently held for `sensor_id`.
    pub fn len(&self, sensor_id: &str) -> usize {
        self.rings.get(sensor_id).map_or(0, |r| r.slots.len())
    }

    /// True when no sensor has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Ids of every sensor with history, sorted.
    pub fn sensor_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.rings.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Drop all history. Capacity is kept.
    pub fn clear(&mut self) {
        self.rings.clear();
    }
}

impl Default for MeasurementWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn values(window: &MeasurementWindow, id: &str) -> Vec<f64> {
        window.readings_for(id).iter().map(|r| r.value).collect()
    }

    #[test]
    fn keeps_push_order_below_capacity() {
        let mut window = MeasurementWindow::new(5);
        for v in [1.0, 2.0, 3.0] {
            window.push(Reading::now("cpu_load", v));
        }
        assert_eq!(values(&window, "cpu_load"), vec![1.0, 2.0, 3.0]);
        assert_eq!(window.len("cpu_load"), 3);
    }

    #[test]
    fn overwrites_oldest_at_capacity() {
        let mut window = MeasurementWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(Reading::now("memory", v));
        }
        assert_eq!(values(&window, "memory"), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.latest("memory").value, 4.0);
    }

    #[test]
    fn wraps_repeatedly() {
        let mut window = MeasurementWindow::new(3);
        for v in 1..=8 {
            window.push(Reading::now("storage", v as f64));
        }
        assert_eq!(values(&window, "storage"), vec![6.0, 7.0, 8.0]);
        assert_eq!(window.latest("storage").value, 8.0);
    }

    #[test]
    fn latest_on_unknown_sensor_is_invalid_sentinel() {
        let window = MeasurementWindow::new(4);
        let latest = window.latest("battery");
        assert!(!latest.valid);
        assert_eq!(latest.sensor_id, "battery");
        assert!(window.readings_for("battery").is_empty());
    }

    #[test]
    fn sensors_are_isolated() {
        let mut window = MeasurementWindow::new(2);
        window.push(Reading::now("a", 1.0));
        window.push(Reading::now("b", 10.0));
        window.push(Reading::now("a", 2.0));
        window.push(Reading::now("a", 3.0));

        assert_eq!(values(&window, "a"), vec![2.0, 3.0]);
        assert_eq!(values(&window, "b"), vec![10.0]);
        assert_eq!(window.sensor_ids(), vec!["a", "b"]);
    }

    #[test]
    fn zero_capacity_still_keeps_latest() {
        let mut window = MeasurementWindow::new(0);
        window.push(Reading::now("cpu_load", 0.1));
        window.push(Reading::now("cpu_load", 0.2));
        assert_eq!(window.capacity(), 1);
        assert_eq!(values(&window, "cpu_load"), vec![0.2]);
    }

    #[test]
    fn iter_reverses_newest_first() {
        let mut window = MeasurementWindow::new(3);
        let base = Instant::now();
        for (i, v) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            window.push(Reading::new("x", v, base + Duration::from_secs(i as u64)));
        }
        let newest: Vec<f64> = window.iter("x").rev().take(2).map(|r| r.value).collect();
        assert_eq!(newest, vec![4.0, 3.0]);
    }

    #[test]
    fn clear_drops_history() {
        let mut window = MeasurementWindow::new(3);
        window.push(Reading::now("x", 1.0));
        window.clear();
        assert!(window.is_empty());
        assert!(!window.latest("x").valid);
    }
}

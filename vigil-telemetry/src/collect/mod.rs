//! Linux sources behind the built-in sensors.
//!
//! Parsers are pure functions over file contents so they can be exercised
//! against fixtures; the sensors add file access on top.

pub mod battery;
pub mod cpu;
pub mod memory;
pub mod storage;

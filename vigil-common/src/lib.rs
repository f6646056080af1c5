//! Shared core for Vigil.
//!
//! This crate holds the host-health evaluation core:
//! - [`reading`]: timestamped sensor samples
//! - [`window`]: bounded per-sensor history
//! - [`rules`]: the rule contract and the built-in rules
//! - [`engine`]: per-sensor state machine and host aggregate
//! - [`fault`]: deterministic fault injection for readings
//!
//! It also carries the tracing setup shared by the Vigil binaries.

#![forbid(unsafe_code)]

pub mod engine;
pub mod fault;
pub mod logging;
pub mod reading;
pub mod rules;
pub mod state;
pub mod window;

pub use engine::Engine;
pub use fault::{Fault, FaultInjector, FaultKind, FaultedReading};
pub use logging::{LogConfig, LoggingError, LoggingGuards, init_logging};
pub use reading::Reading;
pub use rules::{
    ImplausibleValueRule, MissingDataRule, RateOfChangeRule, Rule, RuleResult, Severity,
    ThresholdBounds, ThresholdRule,
};
pub use state::{StateTransition, SystemState};
pub use window::MeasurementWindow;

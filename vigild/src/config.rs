//! Daemon configuration.
//!
//! Values are layered, later layers winning:
//! 1. built-in defaults
//! 2. a TOML file (`--config`, else `$XDG_CONFIG_HOME/vigil/config.toml` if present)
//! 3. `VIGIL_*` environment variables
//! 4. command-line flags (applied by `main`)
//!
//! Durations are written as humantime strings such as `"500ms"` or `"5s"`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "VIGIL_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment: {}", join_errors(.0))]
    Env(Vec<EnvError>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn join_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: &'static str,
        value: String,
    },

    #[error("Invalid duration for {var}: '{value}'")]
    InvalidDuration { var: String, value: String },
}

type Lookup = Box<dyn Fn(&str) -> Option<String>>;

/// Reads prefixed environment variables, collecting every parse error so
/// they can be reported together.
pub struct EnvParser {
    prefix: &'static str,
    lookup: Lookup,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Parser over the process environment.
    pub fn new() -> Self {
        Self {
            prefix: ENV_PREFIX,
            lookup: Box::new(|name| std::env::var(name).ok()),
            errors: Vec::new(),
        }
    }

    /// Parser over a fixed set of variables (names include the prefix).
    #[cfg(test)]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: std::collections::HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            prefix: ENV_PREFIX,
            lookup: Box::new(move |name| vars.get(name).cloned()),
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn raw(&self, name: &str) -> Option<(String, String)> {
        let var = format!("{}{}", self.prefix, name);
        (self.lookup)(&var).map(|value| (var, value))
    }

    fn invalid(&mut self, var: String, expected: &'static str, value: String) {
        self.errors.push(EnvError::InvalidValue {
            var,
            expected,
            value,
        });
    }

    pub fn get_f64(&mut self, name: &str, default: f64) -> f64 {
        let Some((var, value)) = self.raw(name) else {
            return default;
        };
        match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => n,
            _ => {
                self.invalid(var, "finite number", value);
                default
            }
        }
    }

    pub fn get_usize(&mut self, name: &str, default: usize) -> usize {
        let Some((var, value)) = self.raw(name) else {
            return default;
        };
        match value.trim().parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                self.invalid(var, "unsigned integer", value);
                default
            }
        }
    }

    /// Accepts 1/true/yes/on and 0/false/no/off/"".
    pub fn get_bool(&mut self, name: &str, default: bool) -> bool {
        let Some((var, value)) = self.raw(name) else {
            return default;
        };
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                self.invalid(var, "boolean (true/false/1/0/yes/no)", value);
                default
            }
        }
    }

    pub fn get_duration(&mut self, name: &str, default: Duration) -> Duration {
        let Some((var, value)) = self.raw(name) else {
            return default;
        };
        match humantime::parse_duration(value.trim()) {
            Ok(d) => d,
            Err(_) => {
                self.errors.push(EnvError::InvalidDuration { var, value });
                default
            }
        }
    }

    /// Path value with `~/` expanded to the home directory.
    pub fn get_path(&mut self, name: &str, default: &Path) -> PathBuf {
        match self.raw(name) {
            Some((_, value)) => expand_home(&value),
            None => default.to_path_buf(),
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

fn expand_home(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}

mod humantime_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// How often each sensor is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorIntervals {
    #[serde(with = "humantime_str")]
    pub cpu_load: Duration,
    #[serde(with = "humantime_str")]
    pub memory: Duration,
    #[serde(with = "humantime_str")]
    pub battery: Duration,
    #[serde(with = "humantime_str")]
    pub storage: Duration,
}

impl Default for SensorIntervals {
    fn default() -> Self {
        Self {
            cpu_load: Duration::from_secs(1),
            memory: Duration::from_secs(2),
            battery: Duration::from_secs(5),
            storage: Duration::from_secs(10),
        }
    }
}

/// Parameters of the built-in rule chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSettings {
    pub implausible_min: f64,
    pub implausible_max: f64,
    pub max_rate_per_second: f64,
    #[serde(with = "humantime_str")]
    pub missing_max_age: Duration,
    #[serde(with = "humantime_str")]
    pub missing_fail_age: Duration,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            implausible_min: -1.0,
            implausible_max: 200.0,
            max_rate_per_second: 0.5,
            missing_max_age: Duration::from_secs(5),
            missing_fail_age: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Main loop period.
    #[serde(with = "humantime_str")]
    pub tick: Duration,
    /// Readings kept per sensor.
    pub window_capacity: usize,
    /// Usage fraction above which a sensor degrades (battery: charge below `1 - threshold`).
    pub threshold: f64,
    /// JSONL event log, opened in append mode.
    pub event_log: PathBuf,
    /// Mirror events to stdout.
    pub stdout_events: bool,
    /// Path whose filesystem the storage sensor watches.
    pub storage_path: PathBuf,
    pub sensors: SensorIntervals,
    pub rules: RuleSettings,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(500),
            window_capacity: vigil_common::window::DEFAULT_CAPACITY,
            threshold: 0.95,
            event_log: PathBuf::from("vigil.jsonl"),
            stdout_events: true,
            storage_path: PathBuf::from("/"),
            sensors: SensorIntervals::default(),
            rules: RuleSettings::default(),
        }
    }
}

impl DaemonConfig {
    /// `$XDG_CONFIG_HOME/vigil/config.toml` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vigil").join("config.toml"))
    }

    /// Load from `explicit` if given, else from the default path if it
    /// exists, else fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `VIGIL_*` variables. Every malformed variable is reported.
    pub fn apply_env(&mut self, env: &mut EnvParser) -> Result<(), ConfigError> {
        self.tick = env.get_duration("TICK", self.tick);
        self.window_capacity = env.get_usize("WINDOW_CAPACITY", self.window_capacity);
        self.threshold = env.get_f64("THRESHOLD", self.threshold);
        self.event_log = env.get_path("EVENT_LOG", &self.event_log);
        self.stdout_events = env.get_bool("STDOUT_EVENTS", self.stdout_events);
        self.storage_path = env.get_path("STORAGE_PATH", &self.storage_path);

        let s = &mut self.sensors;
        s.cpu_load = env.get_duration("CPU_INTERVAL", s.cpu_load);
        s.memory = env.get_duration("MEMORY_INTERVAL", s.memory);
        s.battery = env.get_duration("BATTERY_INTERVAL", s.battery);
        s.storage = env.get_duration("STORAGE_INTERVAL", s.storage);

        let r = &mut self.rules;
        r.implausible_min = env.get_f64("IMPLAUSIBLE_MIN", r.implausible_min);
        r.implausible_max = env.get_f64("IMPLAUSIBLE_MAX", r.implausible_max);
        r.max_rate_per_second = env.get_f64("MAX_RATE", r.max_rate_per_second);
        r.missing_max_age = env.get_duration("MISSING_MAX_AGE", r.missing_max_age);
        r.missing_fail_age = env.get_duration("MISSING_FAIL_AGE", r.missing_fail_age);

        if env.has_errors() {
            return Err(ConfigError::Env(env.take_errors()));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.tick.is_zero() {
            return invalid("tick must be greater than zero".to_string());
        }
        if self.window_capacity == 0 {
            return invalid("window_capacity must be at least 1".to_string());
        }
        if self.threshold.is_nan() || self.threshold <= 0.0 || self.threshold > 1.0 {
            return invalid(format!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            ));
        }
        let s = &self.sensors;
        if [s.cpu_load, s.memory, s.battery, s.storage]
            .iter()
            .any(Duration::is_zero)
        {
            return invalid("sensor intervals must be greater than zero".to_string());
        }
        let r = &self.rules;
        if r.implausible_min > r.implausible_max {
            return invalid(format!(
                "implausible_min {} exceeds implausible_max {}",
                r.implausible_min, r.implausible_max
            ));
        }
        if r.max_rate_per_second.is_nan() || r.max_rate_per_second <= 0.0 {
            return invalid(format!(
                "max_rate_per_second must be positive, got {}",
                r.max_rate_per_second
            ));
        }
        if r.missing_fail_age <= r.missing_max_age {
            return invalid(format!(
                "missing_fail_age {} must exceed missing_max_age {}",
                humantime::format_duration(r.missing_fail_age),
                humantime::format_duration(r.missing_max_age)
            ));
        }
        Ok(())
    }
}

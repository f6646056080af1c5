//! JSON-lines event log.
//!
//! Every record carries a UTC `ts` (`YYYY-MM-DDTHH:MM:SSZ`) and a `type`:
//!
//! ```text
//! {"ts":"...","type":"reading","sensor":"cpu_load","value":0.12,"valid":true}
//! {"ts":"...","type":"transition","sensor":"cpu_load","from":"UNKNOWN","to":"OK","reason":"rule_evaluation"}
//! {"ts":"...","type":"fault","sensor":"battery","fault_type":"InterfaceFailure","injected_value":0.0}
//! {"ts":"...","type":"rule_violation","rule":"ThresholdRule","sensor":"memory","message":"..."}
//! ```

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;
use vigil_common::{FaultKind, Reading, RuleResult, StateTransition, SystemState};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Event<'a> {
    Reading {
        sensor: &'a str,
        value: f64,
        valid: bool,
    },
    Transition {
        sensor: &'a str,
        from: SystemState,
        to: SystemState,
        reason: &'a str,
    },
    Fault {
        sensor: &'a str,
        fault_type: FaultKind,
        injected_value: f64,
    },
    RuleViolation {
        rule: &'a str,
        sensor: &'a str,
        message: &'a str,
    },
}

#[derive(Serialize)]
struct Record<'a> {
    ts: String,
    #[serde(flatten)]
    event: Event<'a>,
}

type Sink = Box<dyn Write + Send>;

/// Writes events to every configured sink, one line each.
#[derive(Default)]
pub struct EventLog {
    sinks: Vec<Sink>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventLog {
    /// A log with no sinks; events are discarded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to `path`, creating the file and its parent directory if needed.
    pub fn with_file(self, path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(self.with_writer(file))
    }

    pub fn with_stdout(self) -> Self {
        self.with_writer(io::stdout())
    }

    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.sinks.push(Box::new(writer));
        self
    }

    pub fn reading(&mut self, reading: &Reading) {
        self.emit(Event::Reading {
            sensor: &reading.sensor_id,
            value: reading.value,
            valid: reading.valid,
        });
    }

    pub fn transition(&mut self, transition: &StateTransition) {
        self.emit(Event::Transition {
            sensor: &transition.sensor_id,
            from: transition.from,
            to: transition.to,
            reason: &transition.reason,
        });
    }

    pub fn fault(&mut self, sensor: &str, fault_type: FaultKind, injected_value: f64) {
        self.emit(Event::Fault {
            sensor,
            fault_type,
            injected_value,
        });
    }

    pub fn rule_violation(&mut self, result: &RuleResult) {
        self.emit(Event::RuleViolation {
            rule: &result.rule_name,
            sensor: &result.sensor_id,
            message: &result.message,
        });
    }

    fn emit(&mut self, event: Event<'_>) {
        if self.sinks.is_empty() {
            return;
        }

        let record = Record {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            event,
        };
        let mut line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize event");
                return;
            }
        };
        line.push('\n');

        for sink in &mut self.sinks {
            if let Err(e) = write_line(sink, line.as_bytes()) {
                warn!(error = %e, "Failed to write event");
            }
        }
    }
}

fn write_line(sink: &mut Sink, line: &[u8]) -> io::Result<()> {
    sink.write_all(line)?;
    sink.flush()
}

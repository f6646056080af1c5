//! Turns a fault profile into inject/clear actions over elapsed time.

use crate::fault_profile::FaultEntry;
use std::time::Duration;
use vigil_common::Fault;

/// Something the run loop should do to the fault injector.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleAction {
    Inject { sensor_id: String, fault: Fault },
    Clear { sensor_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    /// Injected; waiting for the clear deadline.
    Active { clear_at: Duration },
    Done,
}

#[derive(Debug)]
struct Slot {
    entry: FaultEntry,
    phase: Phase,
}

/// Fires each profile entry once.
///
/// Entries are checked in profile order, so two entries for the same sensor
/// due on the same call are applied in that order and the later one wins.
#[derive(Debug)]
pub struct FaultSchedule {
    slots: Vec<Slot>,
}

impl FaultSchedule {
    pub fn new(entries: Vec<FaultEntry>) -> Self {
        Self {
            slots: entries
                .into_iter()
                .map(|entry| Slot {
                    entry,
                    phase: Phase::Pending,
                })
                .collect(),
        }
    }

    /// Actions that became due by `elapsed` since the daemon started.
    ///
    /// An entry's duration runs from the call that injects it, so a late
    /// first call still leaves the fault active for its full duration.
    pub fn due(&mut self, elapsed: Duration) -> Vec<ScheduleAction> {
        let mut actions = Vec::new();
        for slot in &mut self.slots {
            if slot.phase == Phase::Pending && elapsed >= slot.entry.trigger_after {
                actions.push(ScheduleAction::Inject {
                    sensor_id: slot.entry.sensor_id.clone(),
                    fault: slot.entry.fault,
                });
                slot.phase = match slot.entry.duration {
                    Some(duration) => Phase::Active {
                        clear_at: elapsed.saturating_add(duration),
                    },
                    None => Phase::Done,
                };
            }

            if let Phase::Active { clear_at } = slot.phase
                && elapsed >= clear_at
            {
                actions.push(ScheduleAction::Clear {
                    sensor_id: slot.entry.sensor_id.clone(),
                });
                slot.phase = Phase::Done;
            }
        }
        actions
    }

    /// True once every entry has fired all of its actions.
    pub fn is_finished(&self) -> bool {
        self.slots.iter().all(|slot| slot.phase == Phase::Done)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

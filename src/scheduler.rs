//! Deadline scheduler for the periodic work of the control task.
//!
//! The scheduler notifies a [`TickDelegate`] when an entry comes due;
//! the control task implements the delegate to run a control cycle,
//! hand a snapshot to the telemetry logger or flush settings.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ┌───────────┐     ┌──────────────┐     ┌───────────────┐    │
//! │  │ Control   │     │ TelemetryLog │     │ SettingsFlush │    │
//! │  │ (1 s)     │     │ (10 s)       │     │ (1 s)         │    │
//! │  └─────┬─────┘     └──────┬───────┘     └───────┬───────┘    │
//! │        ▼                  ▼                     ▼            │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                    TickDelegate                        │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                ControlManager::tick / ...                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are deadline-driven rather than tick-counted, so the caller
//! may wake early (for a command or a pulse deadline) without skewing
//! the schedule.

use log::{debug, info};

use crate::app::ports::{TickDelegate, TickKind};
use crate::config::SystemConfig;

/// A single periodic entry.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Human-readable label (e.g. "control").
    pub label: &'static str,
    pub kind: TickKind,
    pub interval_ms: u64,
}

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

/// The scheduler engine.
pub struct Scheduler {
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
}

#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    /// `None` until first poll, which fires immediately.
    next_due_ms: Option<u64>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [None, None, None, None],
        }
    }

    /// Standard entries for the control task.
    pub fn from_config(config: &SystemConfig) -> Self {
        let mut sched = Self::new();
        let entries = [
            ("control", TickKind::Control, config.control_interval_ms),
            ("telemetry-log", TickKind::TelemetryLog, config.telemetry_log_interval_ms),
            ("settings-flush", TickKind::SettingsFlush, config.control_interval_ms),
        ];
        for (label, kind, interval_ms) in entries {
            sched.add(Schedule {
                label,
                kind,
                interval_ms: u64::from(interval_ms),
            });
        }
        sched
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        let (i, slot) = self
            .schedules
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.is_none())?;
        info!("Scheduler: added '{}' every {} ms at slot {}", schedule.label, schedule.interval_ms, i);
        *slot = Some(ScheduleEntry {
            schedule,
            next_due_ms: None,
        });
        Some(i)
    }

    /// Fire every entry that is due at `now_ms`, in slot order.
    ///
    /// An entry that fell more than one interval behind fires once and
    /// realigns to `now_ms`; missed periods are not replayed.
    pub fn poll(&mut self, now_ms: u64, delegate: &mut dyn TickDelegate) {
        for entry in self.schedules.iter_mut().flatten() {
            let due = entry.next_due_ms.unwrap_or(now_ms);
            if now_ms < due {
                continue;
            }
            debug!("Scheduler: '{}' due at {}", entry.schedule.label, due);
            delegate.on_tick(entry.schedule.kind, now_ms);
            let interval = entry.schedule.interval_ms.max(1);
            let next = due + interval;
            entry.next_due_ms = Some(if next <= now_ms { now_ms + interval } else { next });
        }
    }

    /// Earliest upcoming deadline.  Entries that never fired are due at `now_ms`.
    pub fn next_due(&self, now_ms: u64) -> Option<u64> {
        self.schedules
            .iter()
            .flatten()
            .map(|e| e.next_due_ms.unwrap_or(now_ms))
            .min()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

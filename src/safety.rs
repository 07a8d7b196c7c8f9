//! Actuator fault supervisor.
//!
//! Tracks which relays have failed a write.  A faulted actuator isolates
//! only the loop that owns it; every other loop keeps running.
//!
//! ## Fault lifecycle
//!
//! 1. A relay write returns an error.
//! 2. The manager latches the actuator's bit here and makes a
//!    best-effort attempt to drive it off.
//! 3. While any actuator of a loop is latched, that loop is skipped by
//!    the control tick.
//! 4. Re-enabling the loop (disable → enable) clears its bits so the
//!    operator can retry after fixing the wiring.

use log::{error, info};

use crate::app::ports::Actuator;
use crate::control::Parameter;

/// Latched per-actuator fault bitmask.
#[derive(Debug, Default)]
pub struct SafetySupervisor {
    faults: u8,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self { faults: 0 }
    }

    /// Set or clear an actuator's fault bit.
    pub fn eval_fault(&mut self, actuator: Actuator, condition: bool) {
        if condition {
            if self.faults & actuator.mask() == 0 {
                error!("ACTUATOR FAULT SET: {actuator}");
            }
            self.faults |= actuator.mask();
        } else {
            if self.faults & actuator.mask() != 0 {
                info!("ACTUATOR FAULT CLEARED: {actuator}");
            }
            self.faults &= !actuator.mask();
        }
    }

    /// Clear every fault owned by `parameter`'s loop.
    pub fn clear_loop(&mut self, parameter: Parameter) {
        for a in parameter.actuators() {
            self.eval_fault(*a, false);
        }
    }

    /// Current fault bitmask (bit = [`Actuator::mask`]).
    pub fn faults(&self) -> u8 {
        self.faults
    }

    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    pub fn has_fault(&self, actuator: Actuator) -> bool {
        self.faults & actuator.mask() != 0
    }

    /// True if any actuator owned by `parameter` is latched.
    pub fn loop_faulted(&self, parameter: Parameter) -> bool {
        parameter.actuators().iter().any(|a| self.has_fault(*a))
    }
}

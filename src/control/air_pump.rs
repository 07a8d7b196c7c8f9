//! Air pump: fixed on/off duty cycle, no sensor input.

use super::{ActuatorCommand, Commands, push_command};
use crate::app::ports::Actuator;

pub struct AirPumpLoop {
    on_ms: u64,
    off_ms: u64,
    /// Start of the current duty cycle; `None` while halted.
    cycle_start: Option<u64>,
    /// Time into the cycle at the last evaluation.
    last_elapsed: u64,
    on: bool,
}

impl AirPumpLoop {
    pub fn new(on_ms: u64, off_ms: u64) -> Self {
        Self {
            on_ms,
            off_ms,
            cycle_start: None,
            last_elapsed: 0,
            on: false,
        }
    }

    pub fn pump_on(&self) -> bool {
        self.on
    }

    fn period(&self) -> u64 {
        (self.on_ms + self.off_ms).max(1)
    }

    /// Next phase boundary while cycling.
    pub fn next_deadline(&self) -> Option<u64> {
        let start = self.cycle_start?;
        if self.off_ms == 0 {
            return None;
        }
        let period = self.period();
        let cycle_base = start + (self.last_elapsed / period) * period;
        if self.last_elapsed % period < self.on_ms {
            Some(cycle_base + self.on_ms)
        } else {
            Some(cycle_base + period)
        }
    }

    pub(super) fn decide(&mut self, now_ms: u64, out: &mut Commands) {
        let start = *self.cycle_start.get_or_insert(now_ms);
        self.phase_at(start, now_ms, out);
    }

    pub(super) fn poll(&mut self, now_ms: u64, out: &mut Commands) {
        if let Some(start) = self.cycle_start {
            self.phase_at(start, now_ms, out);
        }
    }

    pub(super) fn halt(&mut self, out: &mut Commands) {
        self.cycle_start = None;
        self.last_elapsed = 0;
        self.on = false;
        push_command(out, ActuatorCommand::off(Actuator::AirPump));
    }

    fn phase_at(&mut self, start: u64, now_ms: u64, out: &mut Commands) {
        let elapsed = now_ms.saturating_sub(start);
        let want = elapsed % self.period() < self.on_ms;
        self.last_elapsed = elapsed;
        if want != self.on {
            self.on = want;
            push_command(out, ActuatorCommand { actuator: Actuator::AirPump, on: want });
        }
    }
}

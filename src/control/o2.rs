//! O2 loop: argon displacement pulses with a long cooldown.

use log::info;

use super::cooldown::CooldownTimer;
use super::{ActuatorCommand, Commands, push_command};
use crate::app::ports::Actuator;
use crate::config::SystemConfig;

pub struct O2Loop {
    pulse_ms: u64,
    cooldown: CooldownTimer,
    /// Valve close deadline while a pulse is in flight.
    pulse_off_at: Option<u64>,
}

impl O2Loop {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            pulse_ms: u64::from(config.o2_pulse_ms),
            cooldown: CooldownTimer::new(u64::from(config.o2_cooldown_ms)),
            pulse_off_at: None,
        }
    }

    pub fn cooldown(&self) -> &CooldownTimer {
        &self.cooldown
    }

    pub fn is_pulsing(&self) -> bool {
        self.pulse_off_at.is_some()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pulse_off_at
    }

    pub(super) fn decide(
        &mut self,
        setpoint: f32,
        reading: Option<f32>,
        now_ms: u64,
        out: &mut Commands,
    ) {
        self.poll(now_ms, out);
        let Some(o2) = reading else {
            return;
        };
        if self.pulse_off_at.is_some() || o2 <= setpoint || !self.cooldown.ready(now_ms) {
            return;
        }
        info!("O2 {o2:.1}% above {setpoint:.1}%, pulsing argon");
        self.cooldown.mark(now_ms);
        self.pulse_off_at = Some(now_ms + self.pulse_ms);
        push_command(out, ActuatorCommand::on(Actuator::ArgonValve));
    }

    pub(super) fn poll(&mut self, now_ms: u64, out: &mut Commands) {
        if self.pulse_off_at.is_some_and(|t| now_ms >= t) {
            self.pulse_off_at = None;
            push_command(out, ActuatorCommand::off(Actuator::ArgonValve));
        }
    }

    pub(super) fn halt(&mut self, out: &mut Commands) {
        self.pulse_off_at = None;
        push_command(out, ActuatorCommand::off(Actuator::ArgonValve));
    }
}

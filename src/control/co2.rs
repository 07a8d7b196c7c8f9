//! CO2 loop: timed dual-solenoid injection with a cooldown.
//!
//! ```text
//!  Idle ──(ppm < sp, cooldown ready)──▶ Primary ──pulse──▶ Pause ──pause──▶ Secondary ──pulse──▶ Idle
//! ```
//!
//! Each transition is a deadline checked by [`Co2Loop::poll`]; nothing
//! here sleeps, so a stop or disable can abort the sequence between any
//! two steps.

use log::info;

use super::cooldown::CooldownTimer;
use super::{ActuatorCommand, Commands, push_command};
use crate::app::ports::Actuator;
use crate::config::SystemConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPhase {
    Idle,
    /// Primary solenoid open until `off_at`.
    Primary { off_at: u64 },
    /// Both closed until `until`.
    Pause { until: u64 },
    /// Secondary solenoid open until `off_at`.
    Secondary { off_at: u64 },
}

pub struct Co2Loop {
    raw_scale: f32,
    pulse_ms: u64,
    pause_ms: u64,
    cooldown: CooldownTimer,
    phase: InjectionPhase,
}

impl Co2Loop {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            raw_scale: config.co2_raw_scale,
            pulse_ms: u64::from(config.co2_pulse_ms),
            pause_ms: u64::from(config.co2_pause_ms),
            cooldown: CooldownTimer::new(u64::from(config.co2_cooldown_ms)),
            phase: InjectionPhase::Idle,
        }
    }

    pub fn to_ppm(&self, raw: f32) -> f32 {
        raw * self.raw_scale
    }

    pub fn phase(&self) -> InjectionPhase {
        self.phase
    }

    pub fn cooldown(&self) -> &CooldownTimer {
        &self.cooldown
    }

    pub fn in_sequence(&self) -> bool {
        self.phase != InjectionPhase::Idle
    }

    pub fn next_deadline(&self) -> Option<u64> {
        match self.phase {
            InjectionPhase::Idle => None,
            InjectionPhase::Primary { off_at } | InjectionPhase::Secondary { off_at } => {
                Some(off_at)
            }
            InjectionPhase::Pause { until } => Some(until),
        }
    }

    pub(super) fn decide(
        &mut self,
        setpoint: f32,
        reading_ppm: Option<f32>,
        now_ms: u64,
        out: &mut Commands,
    ) {
        self.poll(now_ms, out);
        let Some(ppm) = reading_ppm else {
            return;
        };
        if self.phase != InjectionPhase::Idle || ppm >= setpoint || !self.cooldown.ready(now_ms) {
            return;
        }
        info!("CO2 {ppm:.0} ppm below {setpoint:.0}, starting injection");
        self.cooldown.mark(now_ms);
        self.phase = InjectionPhase::Primary {
            off_at: now_ms + self.pulse_ms,
        };
        push_command(out, ActuatorCommand::on(Actuator::Co2Primary));
    }

    /// Advance through every phase whose deadline has passed.
    pub(super) fn poll(&mut self, now_ms: u64, out: &mut Commands) {
        loop {
            match self.phase {
                InjectionPhase::Primary { off_at } if now_ms >= off_at => {
                    push_command(out, ActuatorCommand::off(Actuator::Co2Primary));
                    self.phase = InjectionPhase::Pause {
                        until: off_at + self.pause_ms,
                    };
                }
                InjectionPhase::Pause { until } if now_ms >= until => {
                    push_command(out, ActuatorCommand::on(Actuator::Co2Secondary));
                    self.phase = InjectionPhase::Secondary {
                        off_at: now_ms + self.pulse_ms,
                    };
                }
                InjectionPhase::Secondary { off_at } if now_ms >= off_at => {
                    push_command(out, ActuatorCommand::off(Actuator::Co2Secondary));
                    self.phase = InjectionPhase::Idle;
                }
                _ => break,
            }
        }
    }

    pub(super) fn halt(&mut self, out: &mut Commands) {
        if self.phase != InjectionPhase::Idle {
            info!("CO2 injection aborted");
        }
        self.phase = InjectionPhase::Idle;
        push_command(out, ActuatorCommand::off(Actuator::Co2Primary));
        push_command(out, ActuatorCommand::off(Actuator::Co2Secondary));
    }
}

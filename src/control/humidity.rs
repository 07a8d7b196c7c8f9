//! Humidity loop: hysteresis band around the setpoint.

use super::{ActuatorCommand, Commands, push_command};
use crate::app::ports::Actuator;

pub struct HumidityLoop {
    band: f32,
    on: bool,
}

impl HumidityLoop {
    /// `band` is the half-width of the dead zone in %RH.
    pub fn new(band: f32) -> Self {
        Self { band, on: false }
    }

    pub fn humidifier_on(&self) -> bool {
        self.on
    }

    pub(super) fn decide(&mut self, setpoint: f32, reading: Option<f32>, out: &mut Commands) {
        // No reading: keep whatever we were doing.
        let Some(rh) = reading else {
            return;
        };
        let want = if rh < setpoint - self.band {
            true
        } else if rh > setpoint + self.band {
            false
        } else {
            self.on
        };
        if want != self.on {
            self.on = want;
            push_command(out, ActuatorCommand { actuator: Actuator::Humidifier, on: want });
        }
    }

    pub(super) fn halt(&mut self, out: &mut Commands) {
        self.on = false;
        push_command(out, ActuatorCommand::off(Actuator::Humidifier));
    }
}

//! Liquid-temperature loop: PID on the reservoir probe, on/off heater.

use log::warn;

use super::pid::PidController;
use super::{ActuatorCommand, Commands, push_command};
use crate::app::ports::Actuator;
use crate::config::SystemConfig;

pub struct TemperatureLoop {
    pid: PidController,
    heater_on: bool,
    last_output: f32,
    last_step_ms: Option<u64>,
    /// dt used for the first step after (re)activation.
    nominal_dt_s: f32,
}

impl TemperatureLoop {
    pub fn from_config(config: &SystemConfig) -> Self {
        let pid = PidController::new(
            config.temp_kp,
            config.temp_ki,
            config.temp_kd,
            config.temperature_setpoint_c,
        )
        .with_output_limit(config.temp_output_limit);
        Self {
            pid,
            heater_on: false,
            last_output: 0.0,
            last_step_ms: None,
            nominal_dt_s: config.control_interval_ms as f32 / 1000.0,
        }
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn heater_on(&self) -> bool {
        self.heater_on
    }

    pub fn last_output(&self) -> f32 {
        self.last_output
    }

    pub(super) fn decide(
        &mut self,
        setpoint: f32,
        reading: Option<f32>,
        now_ms: u64,
        out: &mut Commands,
    ) {
        self.pid.set_target(setpoint);
        let dt = match self.last_step_ms {
            Some(prev) if now_ms > prev => (now_ms - prev) as f32 / 1000.0,
            _ => self.nominal_dt_s,
        };
        self.last_step_ms = Some(now_ms);

        let Some(measured) = reading else {
            // No reading: heater off, PID history left alone.
            if self.heater_on {
                warn!("temperature probe lost, heater forced off");
            }
            self.set_heater(false, out);
            return;
        };

        self.last_output = self.pid.compute(measured, dt);
        self.set_heater(self.last_output > 0.0, out);
    }

    pub(super) fn halt(&mut self, out: &mut Commands) {
        self.heater_on = false;
        push_command(out, ActuatorCommand::off(Actuator::Heater));
    }

    pub(super) fn reset(&mut self) {
        self.pid.reset();
        self.last_output = 0.0;
        self.last_step_ms = None;
    }

    fn set_heater(&mut self, on: bool, out: &mut Commands) {
        if on != self.heater_on {
            self.heater_on = on;
            push_command(out, ActuatorCommand { actuator: Actuator::Heater, on });
        }
    }
}

//! Telemetry snapshots.
//!
//! A [`TelemetrySnapshot`] is built from scratch by the manager after
//! every tick and every applied command, then published whole.  Readers
//! never see a half-updated view.  [`TelemetryFrame`] is the flat JSON
//! shape external consumers get.

use serde::Serialize;

use super::ports::Actuator;
use crate::control::Parameter;

/// Per-loop view at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopState {
    pub parameter: Parameter,
    pub enabled: bool,
    /// `None` for loops without a setpoint (air pump).
    pub setpoint: Option<f32>,
    /// `None` = NC (sensor failed) or not yet read.
    pub last_reading: Option<f32>,
    /// Any of this loop's actuators energised.
    pub actuating: bool,
    pub cooldown_until_ms: Option<u64>,
    pub faulted: bool,
}

/// Coherent view of the whole engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub loops: [LoopState; Parameter::COUNT],
    /// Chamber air probe, informational only.
    pub chamber_temperature: Option<f32>,
    pub actuators: [bool; Actuator::COUNT],
    pub running: bool,
    pub actuator_faults: u8,
    pub taken_at_ms: u64,
}

impl TelemetrySnapshot {
    pub fn loop_state(&self, parameter: Parameter) -> &LoopState {
        &self.loops[parameter.index()]
    }

    pub fn actuator_on(&self, actuator: Actuator) -> bool {
        self.actuators[actuator.index()]
    }

    /// Either CO2 solenoid open.
    pub fn vent_active(&self) -> bool {
        self.actuator_on(Actuator::Co2Primary) || self.actuator_on(Actuator::Co2Secondary)
    }

    pub fn to_frame(&self) -> TelemetryFrame {
        let l = |p: Parameter| self.loop_state(p);
        TelemetryFrame {
            temperature: l(Parameter::Temperature).last_reading,
            temperature_chamber: self.chamber_temperature,
            humidity: l(Parameter::Humidity).last_reading,
            co2_ppm: l(Parameter::Co2).last_reading,
            o2: l(Parameter::O2).last_reading,
            temperature_setpoint: l(Parameter::Temperature).setpoint,
            humidity_setpoint: l(Parameter::Humidity).setpoint,
            co2_setpoint: l(Parameter::Co2).setpoint,
            o2_setpoint: l(Parameter::O2).setpoint,
            temperature_enabled: l(Parameter::Temperature).enabled,
            humidity_enabled: l(Parameter::Humidity).enabled,
            co2_enabled: l(Parameter::Co2).enabled,
            o2_enabled: l(Parameter::O2).enabled,
            air_pump_enabled: l(Parameter::AirPump).enabled,
            heater_on: self.actuator_on(Actuator::Heater),
            humidifier_on: self.actuator_on(Actuator::Humidifier),
            vent_active: self.vent_active(),
            argon_valve_on: self.actuator_on(Actuator::ArgonValve),
            air_pump_on: self.actuator_on(Actuator::AirPump),
            incubator_running: self.running,
            actuator_faults: self.actuator_faults,
            co2_cooldown_until_ms: l(Parameter::Co2).cooldown_until_ms,
            o2_cooldown_until_ms: l(Parameter::O2).cooldown_until_ms,
            timestamp_ms: self.taken_at_ms,
        }
    }
}

/// Flat telemetry record; `null` readings mean NC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryFrame {
    pub temperature: Option<f32>,
    pub temperature_chamber: Option<f32>,
    pub humidity: Option<f32>,
    pub co2_ppm: Option<f32>,
    pub o2: Option<f32>,
    pub temperature_setpoint: Option<f32>,
    pub humidity_setpoint: Option<f32>,
    pub co2_setpoint: Option<f32>,
    pub o2_setpoint: Option<f32>,
    pub temperature_enabled: bool,
    pub humidity_enabled: bool,
    pub co2_enabled: bool,
    pub o2_enabled: bool,
    pub air_pump_enabled: bool,
    pub heater_on: bool,
    pub humidifier_on: bool,
    pub vent_active: bool,
    pub argon_valve_on: bool,
    pub air_pump_on: bool,
    pub incubator_running: bool,
    pub actuator_faults: u8,
    pub co2_cooldown_until_ms: Option<u64>,
    pub o2_cooldown_until_ms: Option<u64>,
    pub timestamp_ms: u64,
}

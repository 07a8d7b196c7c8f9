//! Control loops: one stateful policy per regulated parameter.
//!
//! The set of loops is closed: [`Policy`] is a tagged union over exactly
//! five variants and every capability is dispatched with an exhaustive
//! `match`, so adding a parameter is a compile error everywhere it
//! matters.
//!
//! ```text
//!  reading ──▶ ControlLoop::ingest ──▶ Policy::decide ──▶ Commands ──▶ manager
//!                                      Policy::poll   ──▶ Commands ──▶ manager
//! ```
//!
//! Policies never touch hardware.  They push [`ActuatorCommand`]s into a
//! fixed-capacity buffer and the manager, as the single owner of the
//! actuator port, applies them.

pub mod air_pump;
pub mod co2;
pub mod cooldown;
pub mod humidity;
pub mod o2;
pub mod pid;
pub mod temperature;

use core::fmt;
use core::ops::RangeInclusive;
use core::str::FromStr;

use log::error;
use serde::{Deserialize, Serialize};

use crate::app::ports::{Actuator, Quantity};
use crate::config::SystemConfig;
use crate::error::{ControlError, Result};

use air_pump::AirPumpLoop;
use co2::Co2Loop;
use humidity::HumidityLoop;
use o2::O2Loop;
use temperature::TemperatureLoop;

// ---------------------------------------------------------------------------
// Parameter identity
// ---------------------------------------------------------------------------

/// A regulated parameter; also the control name used by the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature = 0,
    Humidity = 1,
    Co2 = 2,
    O2 = 3,
    AirPump = 4,
}

impl Parameter {
    pub const COUNT: usize = 5;

    pub const ALL: [Parameter; Self::COUNT] = [
        Parameter::Temperature,
        Parameter::Humidity,
        Parameter::Co2,
        Parameter::O2,
        Parameter::AirPump,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Wire name (`"temperature"`, `"co2"`, `"air_pump"`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Co2 => "co2",
            Self::O2 => "o2",
            Self::AirPump => "air_pump",
        }
    }

    /// The sensor this loop controls on, if any.
    pub const fn quantity(self) -> Option<Quantity> {
        match self {
            Self::Temperature => Some(Quantity::LiquidTemperature),
            Self::Humidity => Some(Quantity::Humidity),
            Self::Co2 => Some(Quantity::Co2Raw),
            Self::O2 => Some(Quantity::O2),
            Self::AirPump => None,
        }
    }

    /// Actuators exclusively owned by this loop.
    pub const fn actuators(self) -> &'static [Actuator] {
        match self {
            Self::Temperature => &[Actuator::Heater],
            Self::Humidity => &[Actuator::Humidifier],
            Self::Co2 => &[Actuator::Co2Primary, Actuator::Co2Secondary],
            Self::O2 => &[Actuator::ArgonValve],
            Self::AirPump => &[Actuator::AirPump],
        }
    }

    /// Physically sane setpoint range; `None` for loops without a setpoint.
    pub fn setpoint_range(self) -> Option<RangeInclusive<f32>> {
        match self {
            Self::Temperature => Some(0.0..=60.0),
            Self::Humidity => Some(0.0..=100.0),
            Self::Co2 => Some(f32::MIN_POSITIVE..=100_000.0),
            Self::O2 => Some(0.0..=100.0),
            Self::AirPump => None,
        }
    }

    /// Check a candidate setpoint against this parameter's range.
    pub fn validate_setpoint(self, value: f32) -> Result<f32> {
        let range = self.setpoint_range().ok_or(ControlError::UnknownParameter)?;
        if value.is_finite() && range.contains(&value) {
            Ok(value)
        } else {
            Err(ControlError::InvalidSetpoint {
                parameter: self,
                value,
            })
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or(ControlError::UnknownParameter)
    }
}

// ---------------------------------------------------------------------------
// Commands produced by policies
// ---------------------------------------------------------------------------

/// One relay write requested by a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub actuator: Actuator,
    pub on: bool,
}

impl ActuatorCommand {
    pub const fn on(actuator: Actuator) -> Self {
        Self { actuator, on: true }
    }

    pub const fn off(actuator: Actuator) -> Self {
        Self {
            actuator,
            on: false,
        }
    }
}

/// Upper bound on commands one loop can emit in a single call.
pub const MAX_COMMANDS: usize = 8;

/// Fixed-capacity command buffer filled by a policy and drained by the manager.
pub type Commands = heapless::Vec<ActuatorCommand, MAX_COMMANDS>;

pub(crate) fn push_command(out: &mut Commands, cmd: ActuatorCommand) {
    if out.push(cmd).is_err() {
        error!("command buffer full, dropping {:?}", cmd);
    }
}

// ---------------------------------------------------------------------------
// Policy (closed set of variants)
// ---------------------------------------------------------------------------

/// The actuation policy of one loop.
pub enum Policy {
    Temperature(TemperatureLoop),
    Humidity(HumidityLoop),
    Co2(Co2Loop),
    O2(O2Loop),
    AirPump(AirPumpLoop),
}

impl Policy {
    /// Build the policy for `parameter` from configuration.
    pub fn for_parameter(parameter: Parameter, config: &SystemConfig) -> Self {
        match parameter {
            Parameter::Temperature => Self::Temperature(TemperatureLoop::from_config(config)),
            Parameter::Humidity => Self::Humidity(HumidityLoop::new(config.humidity_band_pct)),
            Parameter::Co2 => Self::Co2(Co2Loop::from_config(config)),
            Parameter::O2 => Self::O2(O2Loop::from_config(config)),
            Parameter::AirPump => Self::AirPump(AirPumpLoop::new(
                u64::from(config.air_pump_on_ms),
                u64::from(config.air_pump_off_ms),
            )),
        }
    }

    pub fn parameter(&self) -> Parameter {
        match self {
            Self::Temperature(_) => Parameter::Temperature,
            Self::Humidity(_) => Parameter::Humidity,
            Self::Co2(_) => Parameter::Co2,
            Self::O2(_) => Parameter::O2,
            Self::AirPump(_) => Parameter::AirPump,
        }
    }

    /// Convert a raw sensor value into the unit the setpoint is expressed in.
    fn convert(&self, raw: f32) -> f32 {
        match self {
            Self::Co2(p) => p.to_ppm(raw),
            Self::Temperature(_) | Self::Humidity(_) | Self::O2(_) | Self::AirPump(_) => raw,
        }
    }

    /// One control decision for an active loop.
    fn decide(&mut self, setpoint: f32, reading: Option<f32>, now_ms: u64, out: &mut Commands) {
        match self {
            Self::Temperature(p) => p.decide(setpoint, reading, now_ms, out),
            Self::Humidity(p) => p.decide(setpoint, reading, out),
            Self::Co2(p) => p.decide(setpoint, reading, now_ms, out),
            Self::O2(p) => p.decide(setpoint, reading, now_ms, out),
            Self::AirPump(p) => p.decide(now_ms, out),
        }
    }

    /// Advance timed continuations (pulse ends, pauses, duty phases).
    fn poll(&mut self, now_ms: u64, out: &mut Commands) {
        match self {
            Self::Co2(p) => p.poll(now_ms, out),
            Self::O2(p) => p.poll(now_ms, out),
            Self::AirPump(p) => p.poll(now_ms, out),
            Self::Temperature(_) | Self::Humidity(_) => {}
        }
    }

    /// Force every owned actuator off and abandon in-flight sequences.
    fn halt(&mut self, out: &mut Commands) {
        match self {
            Self::Temperature(p) => p.halt(out),
            Self::Humidity(p) => p.halt(out),
            Self::Co2(p) => p.halt(out),
            Self::O2(p) => p.halt(out),
            Self::AirPump(p) => p.halt(out),
        }
    }

    /// Loop goes from gated to active (enable or incubator start).
    fn activate(&mut self) {
        match self {
            Self::Temperature(p) => p.reset(),
            Self::Humidity(_) | Self::Co2(_) | Self::O2(_) | Self::AirPump(_) => {}
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        match self {
            Self::Co2(p) => p.next_deadline(),
            Self::O2(p) => p.next_deadline(),
            Self::AirPump(p) => p.next_deadline(),
            Self::Temperature(_) | Self::Humidity(_) => None,
        }
    }

    fn cooldown_until(&self) -> Option<u64> {
        match self {
            Self::Co2(p) => p.cooldown().until(),
            Self::O2(p) => p.cooldown().until(),
            Self::Temperature(_) | Self::Humidity(_) | Self::AirPump(_) => None,
        }
    }

    /// True while a multi-step pulse sequence is in flight.
    fn in_sequence(&self) -> bool {
        match self {
            Self::Co2(p) => p.in_sequence(),
            Self::O2(p) => p.is_pulsing(),
            Self::Temperature(_) | Self::Humidity(_) | Self::AirPump(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// ControlLoop: per-parameter state around a policy
// ---------------------------------------------------------------------------

/// A regulated parameter: enable flag, setpoint, last reading, policy.
pub struct ControlLoop {
    enabled: bool,
    setpoint: f32,
    last_reading: Option<f32>,
    policy: Policy,
}

impl ControlLoop {
    pub fn new(policy: Policy, setpoint: f32, enabled: bool) -> Self {
        Self {
            enabled,
            setpoint,
            last_reading: None,
            policy,
        }
    }

    pub fn parameter(&self) -> Parameter {
        self.policy.parameter()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    /// Last converted reading; `None` means NC.
    pub fn last_reading(&self) -> Option<f32> {
        self.last_reading
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn cooldown_until(&self) -> Option<u64> {
        self.policy.cooldown_until()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.policy.next_deadline()
    }

    pub fn in_sequence(&self) -> bool {
        self.policy.in_sequence()
    }

    /// Store an already-validated setpoint; effective on the next decision.
    pub(crate) fn set_setpoint(&mut self, value: f32) {
        self.setpoint = value;
    }

    /// Flip the enable flag.  Returns `true` if it changed.
    pub(crate) fn set_enabled(&mut self, enabled: bool) -> bool {
        if self.enabled == enabled {
            return false;
        }
        self.enabled = enabled;
        true
    }

    /// Record a sensor result.  Failures are reported as NC.
    pub(crate) fn ingest(&mut self, raw: Option<f32>) {
        self.last_reading = raw.map(|v| self.policy.convert(v));
    }

    pub(crate) fn decide(&mut self, now_ms: u64, out: &mut Commands) {
        self.policy
            .decide(self.setpoint, self.last_reading, now_ms, out);
    }

    pub(crate) fn poll(&mut self, now_ms: u64, out: &mut Commands) {
        self.policy.poll(now_ms, out);
    }

    pub(crate) fn halt(&mut self, out: &mut Commands) {
        self.policy.halt(out);
    }

    pub(crate) fn activate(&mut self) {
        self.policy.activate();
    }
}

//! Inbound commands to the control engine.
//!
//! These are the requests the outside world (HTTP handlers, a console,
//! a realtime channel) makes.  Everything arriving as JSON is parsed
//! here; the manager only ever sees typed [`ControlCommand`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control::Parameter;
use crate::error::{ControlError, Result};

/// Commands the control task accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    /// Replace one loop's setpoint.
    SetSetpoint(Parameter, f32),
    /// Enable or disable one loop.
    SetEnabled(Parameter, bool),
    /// Start or stop the whole incubator.
    SetRunning(bool),
}

// ───────────────────────────────────────────────────────────────
// Setpoint updates (partial, per-field validated)
// ───────────────────────────────────────────────────────────────

/// Body of a setpoint update.  Every field is optional and validated
/// independently; a bad field does not reject the good ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetpointUpdate {
    pub temperature: Option<Value>,
    pub humidity: Option<Value>,
    pub co2: Option<Value>,
    pub o2: Option<Value>,
}

impl SetpointUpdate {
    /// Fields that were present, paired with their parameter.
    pub fn fields(&self) -> impl Iterator<Item = (Parameter, &Value)> {
        [
            (Parameter::Temperature, self.temperature.as_ref()),
            (Parameter::Humidity, self.humidity.as_ref()),
            (Parameter::Co2, self.co2.as_ref()),
            (Parameter::O2, self.o2.as_ref()),
        ]
        .into_iter()
        .filter_map(|(p, v)| v.map(|v| (p, v)))
    }

    /// Coerce and range-check every present field.
    pub fn validate(&self) -> SetpointReport {
        let mut report = SetpointReport::default();
        for (parameter, raw) in self.fields() {
            let outcome = coerce_setpoint(raw)
                .ok_or(ControlError::InvalidSetpoint {
                    parameter,
                    value: f32::NAN,
                })
                .and_then(|v| parameter.validate_setpoint(v));
            report.set(parameter, outcome);
        }
        report
    }
}

/// Numbers pass through; numeric strings are parsed; anything else fails.
pub fn coerce_setpoint(raw: &Value) -> Option<f32> {
    match raw {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
}

/// Per-field outcome of a setpoint update.  `None` = field absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetpointReport {
    pub temperature: Option<Result<f32>>,
    pub humidity: Option<Result<f32>>,
    pub co2: Option<Result<f32>>,
    pub o2: Option<Result<f32>>,
}

impl SetpointReport {
    fn slot(&mut self, parameter: Parameter) -> Option<&mut Option<Result<f32>>> {
        match parameter {
            Parameter::Temperature => Some(&mut self.temperature),
            Parameter::Humidity => Some(&mut self.humidity),
            Parameter::Co2 => Some(&mut self.co2),
            Parameter::O2 => Some(&mut self.o2),
            Parameter::AirPump => None,
        }
    }

    pub(crate) fn set(&mut self, parameter: Parameter, outcome: Result<f32>) {
        if let Some(slot) = self.slot(parameter) {
            *slot = Some(outcome);
        }
    }

    /// Accepted values, in field order.
    pub fn accepted(&self) -> impl Iterator<Item = (Parameter, f32)> + '_ {
        self.entries()
            .filter_map(|(p, r)| r.ok().map(|v| (p, v)))
    }

    /// Rejected fields, in field order.
    pub fn rejected(&self) -> impl Iterator<Item = (Parameter, ControlError)> + '_ {
        self.entries().filter_map(|(p, r)| r.err().map(|e| (p, e)))
    }

    fn entries(&self) -> impl Iterator<Item = (Parameter, Result<f32>)> + '_ {
        [
            (Parameter::Temperature, self.temperature),
            (Parameter::Humidity, self.humidity),
            (Parameter::Co2, self.co2),
            (Parameter::O2, self.o2),
        ]
        .into_iter()
        .filter_map(|(p, r)| r.map(|r| (p, r)))
    }

    /// Human-readable summary for a response body.
    pub fn to_json(&self) -> Value {
        let mut updated = serde_json::Map::new();
        let mut errors = serde_json::Map::new();
        for (p, v) in self.accepted() {
            updated.insert(p.name().into(), Value::from(f64::from(v)));
        }
        for (p, e) in self.rejected() {
            errors.insert(p.name().into(), Value::String(e.to_string()));
        }
        serde_json::json!({ "updated": updated, "errors": errors })
    }
}

// ───────────────────────────────────────────────────────────────
// Loop enable / incubator run state
// ───────────────────────────────────────────────────────────────

/// Body of a per-control enable request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlStateRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncubatorRunState {
    Running,
    Stopped,
}

impl IncubatorRunState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

/// Messages accepted on the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ChannelMessage {
    SetIncubatorState { state: IncubatorRunState },
}

impl ChannelMessage {
    pub fn into_command(self) -> ControlCommand {
        match self {
            Self::SetIncubatorState { state } => ControlCommand::SetRunning(state.is_running()),
        }
    }
}

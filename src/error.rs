//! Unified error types for the incubator control engine.
//!
//! A single [`ControlError`] enum that every subsystem converts into, so
//! the manager and the command surface handle failures uniformly.  All
//! variants are `Copy` so they can travel through the safety supervisor
//! and the telemetry path without allocation.

use core::fmt;

use crate::app::ports::{Actuator, Quantity};
use crate::control::Parameter;

// ---------------------------------------------------------------------------
// Top-level control error
// ---------------------------------------------------------------------------

/// Every fallible operation in the control engine funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlError {
    /// A sensor read failed or timed out; the reading is reported as NC.
    SensorUnavailable(Quantity),
    /// A setpoint was non-numeric, non-finite, or outside its physical range.
    InvalidSetpoint { parameter: Parameter, value: f32 },
    /// The control name is not one the manager knows (or has no setpoint).
    UnknownParameter,
    /// A relay write failed; the owning loop is isolated.
    Actuator { actuator: Actuator, error: ActuatorError },
    /// The command channel to the control task is full.
    CommandQueueFull,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorUnavailable(q) => write!(f, "sensor unavailable: {q}"),
            Self::InvalidSetpoint { parameter, value } => {
                write!(f, "invalid {parameter} setpoint: {value}")
            }
            Self::UnknownParameter => write!(f, "unknown parameter"),
            Self::Actuator { actuator, error } => write!(f, "{actuator}: {error}"),
            Self::CommandQueueFull => write!(f, "command queue full"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus transaction (SPI / I2C / serial) failed.
    ReadFailed,
    /// The sensor did not answer within its timeout.
    Timeout,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Sensor is not connected (NC).
    NotConnected,
    /// Sensor requires warm-up time before readings are valid.
    WarmingUp,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::Timeout => write!(f, "timed out"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NotConnected => write!(f, "not connected"),
            Self::WarmingUp => write!(f, "sensor warming up"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// The actuator is latched faulted and refuses to energise.
    Faulted,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::Faulted => write!(f, "actuator faulted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Engine-wide `Result` alias.
pub type Result<T> = core::result::Result<T, ControlError>;

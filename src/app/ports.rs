//! Port traits: the hexagonal boundary between the control engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlManager (domain)
//! ```
//!
//! Driven adapters (sensor drivers, relay banks, event sinks, settings
//! storage) implement these traits.  The
//! [`ControlManager`](super::service::ControlManager) owns one sensor port
//! and one actuator port, so the domain core never touches hardware
//! directly and no other component can assert a relay.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ControlSettings;
use crate::error::{ActuatorError, SensorError};

// ───────────────────────────────────────────────────────────────
// Port vocabulary
// ───────────────────────────────────────────────────────────────

/// A physical quantity the board can sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// PT100 probe immersed in the liquid reservoir (control input).
    LiquidTemperature,
    /// PT100 probe in the chamber air (informational only).
    ChamberTemperature,
    /// Relative humidity, %RH.
    Humidity,
    /// Raw CO2 sensor output, before the ppm calibration factor.
    Co2Raw,
    /// Oxygen concentration, %.
    O2,
}

impl Quantity {
    pub const COUNT: usize = 5;

    pub const ALL: [Quantity; Self::COUNT] = [
        Quantity::LiquidTemperature,
        Quantity::ChamberTemperature,
        Quantity::Humidity,
        Quantity::Co2Raw,
        Quantity::O2,
    ];

    /// Dense index for per-quantity bookkeeping arrays.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LiquidTemperature => write!(f, "liquid temperature"),
            Self::ChamberTemperature => write!(f, "chamber temperature"),
            Self::Humidity => write!(f, "humidity"),
            Self::Co2Raw => write!(f, "CO2"),
            Self::O2 => write!(f, "O2"),
        }
    }
}

/// A relay-driven actuator wired to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Actuator {
    Heater = 0,
    Humidifier = 1,
    AirPump = 2,
    Co2Primary = 3,
    Co2Secondary = 4,
    ArgonValve = 5,
}

impl Actuator {
    pub const COUNT: usize = 6;

    pub const ALL: [Actuator; Self::COUNT] = [
        Actuator::Heater,
        Actuator::Humidifier,
        Actuator::AirPump,
        Actuator::Co2Primary,
        Actuator::Co2Secondary,
        Actuator::ArgonValve,
    ];

    /// Dense index for per-actuator bookkeeping arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit for this actuator in fault / state bitmasks.
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heater => write!(f, "heater"),
            Self::Humidifier => write!(f, "humidifier"),
            Self::AirPump => write!(f, "air pump"),
            Self::Co2Primary => write!(f, "CO2 primary solenoid"),
            Self::Co2Secondary => write!(f, "CO2 secondary solenoid"),
            Self::ArgonValve => write!(f, "argon valve"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: "read current value or fail".
///
/// Reads must be side-effect-free with respect to actuators and must
/// not block longer than the sensor's own bus timeout.
pub trait SensorPort {
    fn read(&mut self, quantity: Quantity) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: set a relay state.
///
/// Timed pulses are composed by the manager out of an ON write and a
/// deadline-scheduled OFF write, so an implementation never sleeps.
pub trait ActuatorPort {
    /// Energise (`true`) or de-energise (`false`) one relay.
    fn set(&mut self, actuator: Actuator, on: bool) -> Result<(), ActuatorError>;

    /// De-energise one relay.
    fn off(&mut self, actuator: Actuator) -> Result<(), ActuatorError> {
        self.set(actuator, false)
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (log, dashboard
/// push, data logger).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Settings port (driven adapter: domain ↔ persistent settings)
// ───────────────────────────────────────────────────────────────

/// Loads and persists operator settings (setpoints and enable flags).
///
/// The run state is deliberately absent: the incubator always boots
/// stopped.
pub trait SettingsPort {
    /// Returns [`SettingsError::NotFound`] if nothing was stored yet.
    fn load(&self) -> Result<ControlSettings, SettingsError>;

    fn save(&self, settings: &ControlSettings) -> Result<(), SettingsError>;
}

// ───────────────────────────────────────────────────────────────
// Tick delegate (decouples scheduler from the control task)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the [`Scheduler`](crate::scheduler::Scheduler)
/// invokes when a periodic entry comes due.
pub trait TickDelegate {
    fn on_tick(&mut self, kind: TickKind, now_ms: u64);
}

/// Discriminant passed to [`TickDelegate::on_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Run one control cycle over every loop.
    Control,
    /// Hand a snapshot to the (coarser) telemetry logger.
    TelemetryLog,
    /// Check whether dirty settings should be flushed.
    SettingsFlush,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`SettingsPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// No settings stored yet (first boot).
    NotFound,
    /// Stored settings failed to deserialize.
    Corrupted,
    /// A stored value failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "settings not found"),
            Self::Corrupted => write!(f, "settings corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

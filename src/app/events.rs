//! Outbound application events.
//!
//! The [`ControlManager`](super::service::ControlManager) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log lines, a dashboard
//! push, a data logger.

use super::ports::{Actuator, Quantity};
use super::telemetry::TelemetrySnapshot;
use crate::control::Parameter;
use crate::error::{ActuatorError, SensorError};

/// Structured events emitted by the control engine.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Snapshot taken at the end of a control tick.
    Telemetry(TelemetrySnapshot),

    /// The incubator was started or stopped.
    RunStateChanged { running: bool },

    /// A loop was enabled or disabled.
    LoopToggled { parameter: Parameter, enabled: bool },

    /// A setpoint was accepted.
    SetpointChanged { parameter: Parameter, value: f32 },

    /// A sensor read started failing.
    SensorLost { quantity: Quantity, error: SensorError },

    /// A previously failing sensor answered again.
    SensorRestored(Quantity),

    /// A relay write failed; the owning loop is isolated.
    ActuatorFault { actuator: Actuator, error: ActuatorError },

    /// A timed injection sequence began (CO2 or O2).
    InjectionStarted(Parameter),

    /// A timed injection sequence completed or was aborted.
    InjectionFinished(Parameter),
}

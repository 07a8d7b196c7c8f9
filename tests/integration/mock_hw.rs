//! Mock hardware adapters for integration tests.
//!
//! Records every relay write so tests can assert on the full command
//! history without a relay board.  Sensor readings are settable per
//! quantity, and any relay can be told to fail.

use incubator::app::events::AppEvent;
use incubator::app::ports::{Actuator, ActuatorPort, EventSink, Quantity, SensorPort};
use incubator::app::service::ControlManager;
use incubator::config::SystemConfig;
use incubator::error::{ActuatorError, SensorError};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCall {
    pub actuator: Actuator,
    pub on: bool,
}

// ── MockRelays ────────────────────────────────────────────────

pub struct MockRelays {
    pub calls: Vec<ActuatorCall>,
    /// Bitmask of relays whose writes fail.
    pub failing: u8,
}

#[allow(dead_code)]
impl MockRelays {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            failing: 0,
        }
    }

    pub fn fail(&mut self, actuator: Actuator) {
        self.failing |= actuator.mask();
    }

    pub fn repair(&mut self, actuator: Actuator) {
        self.failing &= !actuator.mask();
    }

    /// Level of the last write to `actuator` (false if never written).
    pub fn is_on(&self, actuator: Actuator) -> bool {
        self.calls
            .iter()
            .rev()
            .find(|c| c.actuator == actuator)
            .is_some_and(|c| c.on)
    }

    /// Writes to `actuator` recorded after index `since`.
    pub fn writes_to(&self, actuator: Actuator, since: usize) -> Vec<bool> {
        self.calls[since..]
            .iter()
            .filter(|c| c.actuator == actuator)
            .map(|c| c.on)
            .collect()
    }

    /// Whether an ON write to `actuator` was recorded after `since`.
    pub fn switched_on(&self, actuator: Actuator, since: usize) -> bool {
        self.writes_to(actuator, since).contains(&true)
    }
}

impl Default for MockRelays {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockRelays {
    fn set(&mut self, actuator: Actuator, on: bool) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall { actuator, on });
        if self.failing & actuator.mask() != 0 {
            return Err(ActuatorError::GpioWriteFailed);
        }
        Ok(())
    }
}

// ── MockSensors ───────────────────────────────────────────────

pub struct MockSensors {
    pub readings: [Result<f32, SensorError>; Quantity::COUNT],
}

#[allow(dead_code)]
impl MockSensors {
    /// Readings that sit on the default setpoints: nothing should fire
    /// except the air pump.
    pub fn nominal() -> Self {
        Self {
            readings: [Ok(37.0), Ok(30.0), Ok(60.0), Ok(100.0), Ok(5.0)],
        }
    }

    pub fn set(&mut self, quantity: Quantity, value: f32) {
        self.readings[quantity.index()] = Ok(value);
    }

    pub fn fail(&mut self, quantity: Quantity, error: SensorError) {
        self.readings[quantity.index()] = Err(error);
    }
}

impl SensorPort for MockSensors {
    fn read(&mut self, quantity: Quantity) -> Result<f32, SensorError> {
        self.readings[quantity.index()]
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Collects every non-telemetry event.
pub struct LogSink {
    pub events: Vec<AppEvent>,
    pub telemetry_count: usize,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            telemetry_count: 0,
        }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(_) => self.telemetry_count += 1,
            other => self.events.push(other.clone()),
        }
    }
}

// ── Builders ──────────────────────────────────────────────────

pub type Manager = ControlManager<MockSensors, MockRelays>;

#[allow(dead_code)]
pub fn make_manager_with(config: &SystemConfig) -> (Manager, LogSink) {
    let mut sink = LogSink::new();
    let mut manager = ControlManager::new(config, MockSensors::nominal(), MockRelays::new());
    manager.start(&mut sink);
    manager.actuator_port_mut().calls.clear();
    (manager, sink)
}

/// Started manager on default config, relay history cleared.
#[allow(dead_code)]
pub fn make_manager() -> (Manager, LogSink) {
    make_manager_with(&SystemConfig::default())
}

/// Same as [`make_manager`] but already running.
#[allow(dead_code)]
pub fn make_running() -> (Manager, LogSink) {
    let (mut manager, mut sink) = make_manager();
    manager.set_running(true, &mut sink);
    (manager, sink)
}

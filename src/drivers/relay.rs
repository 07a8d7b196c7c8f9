//! Relay bank driver.
//!
//! Six relay channels, one per [`Actuator`], each behind an
//! [`embedded_hal::digital::OutputPin`].  Boards differ in polarity, so
//! the bank is built as either active-high or active-low.
//!
//! ## Safety contract
//!
//! This driver is a dumb actuator.  Pulse timing, interlocks and the
//! global stop live in the control manager.

use embedded_hal::digital::{Error as _, OutputPin};
use log::warn;

use crate::app::ports::{Actuator, ActuatorPort};
use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pin high = relay energised.
    ActiveHigh,
    /// Pin low = relay energised (common on opto-isolated boards).
    ActiveLow,
}

pub struct RelayBank<P> {
    pins: [P; Actuator::COUNT],
    polarity: Polarity,
}

impl<P: OutputPin> RelayBank<P> {
    /// `pins` is indexed by [`Actuator::index`].
    pub fn new(pins: [P; Actuator::COUNT], polarity: Polarity) -> Self {
        Self { pins, polarity }
    }

    pub fn pin(&self, actuator: Actuator) -> &P {
        &self.pins[actuator.index()]
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }
}

impl<P: OutputPin> ActuatorPort for RelayBank<P> {
    fn set(&mut self, actuator: Actuator, on: bool) -> Result<(), ActuatorError> {
        let high = match self.polarity {
            Polarity::ActiveHigh => on,
            Polarity::ActiveLow => !on,
        };
        let pin = &mut self.pins[actuator.index()];
        let result = if high { pin.set_high() } else { pin.set_low() };
        result.map_err(|e| {
            warn!("relay {actuator}: pin write failed ({:?})", e.kind());
            ActuatorError::GpioWriteFailed
        })
    }
}

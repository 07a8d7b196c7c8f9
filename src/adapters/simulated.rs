//! Simulated incubator chamber.
//!
//! A first-order physical model standing in for the real board on the
//! host.  Relays go through a real [`RelayBank`] over in-memory pins;
//! the sensor side reads those pins to decide how the chamber evolves.
//!
//! | Actuator      | Effect while energised                    |
//! |---------------|-------------------------------------------|
//! | heater        | liquid warms; chamber air follows         |
//! | humidifier    | RH rises                                  |
//! | CO2 solenoids | CO2 rises fast                            |
//! | argon valve   | O2 is displaced                           |
//! | air pump      | faster exchange with ambient              |

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use crate::app::ports::{Actuator, Quantity, SensorPort};
use crate::drivers::relay::{Polarity, RelayBank};
use crate::error::SensorError;

// ── Ambient and rates ────────────────────────────────────────

const AMBIENT_C: f32 = 22.0;
const AMBIENT_RH: f32 = 40.0;
const AMBIENT_CO2_PPM: f32 = 400.0;
const AMBIENT_O2_PCT: f32 = 20.9;

const HEATER_C_PER_S: f32 = 0.05;
const LIQUID_TAU_S: f32 = 1800.0;
const CHAMBER_TAU_S: f32 = 120.0;
const HUMIDIFIER_PCT_PER_S: f32 = 0.5;
const HUMIDITY_TAU_S: f32 = 300.0;
const CO2_PPM_PER_S: f32 = 5000.0;
const ARGON_O2_PCT_PER_S: f32 = 10.0;
const GAS_TAU_S: f32 = 600.0;
/// Exchange speed-up while the air pump runs.
const PUMP_EXCHANGE_FACTOR: f32 = 5.0;

// ── In-memory pin ────────────────────────────────────────────

/// Error from a pin whose write failure has been injected.
#[derive(Debug, Clone, Copy)]
pub struct SimPinError;

impl embedded_hal::digital::Error for SimPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin backed by shared cells so the model can observe it.
pub struct SimPin {
    level: Rc<Cell<bool>>,
    fail: Rc<Cell<bool>>,
}

impl ErrorType for SimPin {
    type Error = SimPinError;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), SimPinError> {
        if self.fail.get() {
            return Err(SimPinError);
        }
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), SimPinError> {
        if self.fail.get() {
            return Err(SimPinError);
        }
        self.level.set(true);
        Ok(())
    }
}

// ── Chamber model ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChamberState {
    pub liquid_c: f32,
    pub chamber_c: f32,
    pub humidity_pct: f32,
    pub co2_ppm: f32,
    pub o2_pct: f32,
}

impl Default for ChamberState {
    fn default() -> Self {
        Self {
            liquid_c: AMBIENT_C,
            chamber_c: AMBIENT_C,
            humidity_pct: AMBIENT_RH,
            co2_ppm: AMBIENT_CO2_PPM,
            o2_pct: AMBIENT_O2_PCT,
        }
    }
}

fn relax(value: f32, target: f32, tau_s: f32, dt: f32) -> f32 {
    value + (target - value) * (dt / tau_s).min(1.0)
}

/// Sensor side of the simulation.
pub struct SimulatedSensors {
    state: ChamberState,
    /// Active-high relay levels, indexed by [`Actuator::index`].
    relays: [Rc<Cell<bool>>; Actuator::COUNT],
    relay_faults: [Rc<Cell<bool>>; Actuator::COUNT],
    sensor_faults: [Option<SensorError>; Quantity::COUNT],
    co2_raw_scale: f32,
    last_update: Option<Instant>,
    /// Wall-clock advance disabled; only [`advance`](Self::advance) moves time.
    frozen: bool,
}

/// Build a simulated chamber: the sensor side and its relay bank.
pub fn simulated_chamber(co2_raw_scale: f32) -> (SimulatedSensors, RelayBank<SimPin>) {
    let relays: [Rc<Cell<bool>>; Actuator::COUNT] = core::array::from_fn(|_| Rc::default());
    let relay_faults: [Rc<Cell<bool>>; Actuator::COUNT] = core::array::from_fn(|_| Rc::default());
    let pins = core::array::from_fn(|i| SimPin {
        level: Rc::clone(&relays[i]),
        fail: Rc::clone(&relay_faults[i]),
    });
    let sensors = SimulatedSensors {
        state: ChamberState::default(),
        relays,
        relay_faults,
        sensor_faults: [None; Quantity::COUNT],
        co2_raw_scale,
        last_update: None,
        frozen: false,
    };
    (sensors, RelayBank::new(pins, Polarity::ActiveHigh))
}

impl SimulatedSensors {
    pub fn state(&self) -> ChamberState {
        self.state
    }

    pub fn set_state(&mut self, state: ChamberState) {
        self.state = state;
    }

    /// Stop following the wall clock (deterministic tests).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn relay_on(&self, actuator: Actuator) -> bool {
        self.relays[actuator.index()].get()
    }

    /// Make every write to `actuator`'s pin fail (or succeed again).
    pub fn fail_relay(&self, actuator: Actuator, fail: bool) {
        self.relay_faults[actuator.index()].set(fail);
    }

    /// Make reads of `quantity` fail with `error`; `None` restores it.
    pub fn set_sensor_fault(&mut self, quantity: Quantity, error: Option<SensorError>) {
        self.sensor_faults[quantity.index()] = error;
    }

    /// Integrate the model over `dt_s` seconds with the current relay states.
    pub fn advance(&mut self, dt_s: f32) {
        if dt_s <= 0.0 {
            return;
        }
        let on = |a: Actuator| self.relays[a.index()].get();
        let exchange = if on(Actuator::AirPump) { PUMP_EXCHANGE_FACTOR } else { 1.0 };
        let s = &mut self.state;

        if on(Actuator::Heater) {
            s.liquid_c += HEATER_C_PER_S * dt_s;
        }
        s.liquid_c = relax(s.liquid_c, AMBIENT_C, LIQUID_TAU_S, dt_s);
        s.chamber_c = relax(s.chamber_c, s.liquid_c, CHAMBER_TAU_S, dt_s);

        if on(Actuator::Humidifier) {
            s.humidity_pct += HUMIDIFIER_PCT_PER_S * dt_s;
        }
        s.humidity_pct = relax(s.humidity_pct, AMBIENT_RH, HUMIDITY_TAU_S / exchange, dt_s)
            .clamp(0.0, 100.0);

        let valves = [Actuator::Co2Primary, Actuator::Co2Secondary]
            .into_iter()
            .filter(|a| on(*a))
            .count();
        s.co2_ppm += CO2_PPM_PER_S * valves as f32 * dt_s;
        s.co2_ppm = relax(s.co2_ppm, AMBIENT_CO2_PPM, GAS_TAU_S / exchange, dt_s);

        if on(Actuator::ArgonValve) {
            s.o2_pct -= ARGON_O2_PCT_PER_S * dt_s;
        }
        s.o2_pct = relax(s.o2_pct, AMBIENT_O2_PCT, GAS_TAU_S / exchange, dt_s).clamp(0.0, 100.0);
    }

    fn follow_clock(&mut self) {
        if self.frozen {
            return;
        }
        let now = Instant::now();
        if let Some(prev) = self.last_update.replace(now) {
            self.advance(now.duration_since(prev).as_secs_f32());
        }
    }
}

impl SensorPort for SimulatedSensors {
    fn read(&mut self, quantity: Quantity) -> Result<f32, SensorError> {
        self.follow_clock();
        if let Some(e) = self.sensor_faults[quantity.index()] {
            return Err(e);
        }
        let s = &self.state;
        Ok(match quantity {
            Quantity::LiquidTemperature => s.liquid_c,
            Quantity::ChamberTemperature => s.chamber_c,
            Quantity::Humidity => s.humidity_pct,
            Quantity::Co2Raw => s.co2_ppm / self.co2_raw_scale,
            Quantity::O2 => s.o2_pct,
        })
    }
}

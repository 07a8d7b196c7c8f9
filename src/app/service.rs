//! Control manager, the hexagonal core.
//!
//! [`ControlManager`] owns the five control loops, the safety
//! supervisor, and the only handles to the sensor and actuator ports.
//! It exposes a clean, hardware-agnostic API; every relay write in the
//! process goes through [`ControlManager::write`], which is what keeps
//! two loops from ever racing on the same pin.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │        ControlManager         │
//! ActuatorPort ◀──│  loops · safety · run state   │
//!                 └──────────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::{ControlSettings, SystemConfig};
use crate::control::{Commands, ControlLoop, Parameter, Policy};
use crate::error::{ActuatorError, Result, SensorError};
use crate::safety::SafetySupervisor;

use super::commands::{ControlCommand, SetpointReport, SetpointUpdate};
use super::events::AppEvent;
use super::ports::{Actuator, ActuatorPort, EventSink, Quantity, SensorPort, SettingsPort};
use super::telemetry::{LoopState, TelemetrySnapshot};

// ───────────────────────────────────────────────────────────────
// ControlManager
// ───────────────────────────────────────────────────────────────

/// Orchestrates every loop against one sensor port and one actuator port.
pub struct ControlManager<S, A> {
    sensors: S,
    actuators: A,
    loops: [ControlLoop; Parameter::COUNT],
    /// Last state successfully written to each relay.
    actuator_state: [bool; Actuator::COUNT],
    safety: SafetySupervisor,
    running: bool,
    /// Per-quantity availability, for edge-triggered loss/recovery events.
    sensor_ok: [bool; Quantity::COUNT],
    chamber_temperature: Option<f32>,
    last_now_ms: u64,
    tick_count: u64,
    settings_dirty: bool,
    dirty_since_ms: u64,
    save_debounce_ms: u64,
}

impl<S: SensorPort, A: ActuatorPort> ControlManager<S, A> {
    /// Construct the manager in the `stopped` state.
    ///
    /// Does **not** touch hardware; call [`start`](Self::start) next.
    pub fn new(config: &SystemConfig, sensors: S, actuators: A) -> Self {
        let defaults = config.default_settings();
        let loops = Parameter::ALL.map(|p| {
            ControlLoop::new(
                Policy::for_parameter(p, config),
                setpoint_of(&defaults, p),
                enabled_of(&defaults, p),
            )
        });
        Self {
            sensors,
            actuators,
            loops,
            actuator_state: [false; Actuator::COUNT],
            safety: SafetySupervisor::new(),
            running: false,
            sensor_ok: [true; Quantity::COUNT],
            chamber_temperature: None,
            last_now_ms: 0,
            tick_count: 0,
            settings_dirty: false,
            dirty_since_ms: 0,
            save_debounce_ms: u64::from(config.settings_save_debounce_ms),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive every relay to a known de-energised state.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.force_all_off(sink);
        info!(
            "ControlManager started: {} loops, incubator stopped",
            Parameter::COUNT
        );
    }

    /// Write OFF to all six relays, whatever their owners think.
    pub fn force_all_off(&mut self, sink: &mut impl EventSink) {
        for a in Actuator::ALL {
            self.force_off(a, sink);
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: continuations → sensors → decisions → telemetry.
    ///
    /// Sensors are sampled even while stopped or disabled so the
    /// dashboard keeps showing live values.
    pub fn tick(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.tick_count += 1;
        self.service(now_ms, sink);

        // 1. Sample every quantity
        let mut readings = [None; Quantity::COUNT];
        for q in Quantity::ALL {
            let result = self.sensors.read(q);
            self.track_sensor(q, result, sink);
            readings[q.index()] = result.ok();
        }
        self.chamber_temperature = readings[Quantity::ChamberTemperature.index()];
        for l in &mut self.loops {
            if let Some(q) = l.parameter().quantity() {
                l.ingest(readings[q.index()]);
            }
        }

        // 2. Decide for every active loop, in a fixed order
        for p in Parameter::ALL {
            if !self.is_active(p) {
                continue;
            }
            let was_in_sequence = self.loops[p.index()].in_sequence();
            let mut out = Commands::new();
            self.loops[p.index()].decide(now_ms, &mut out);
            self.apply(&out, sink);
            self.note_sequence(p, was_in_sequence, sink);
        }

        // 3. Publish
        sink.emit(&AppEvent::Telemetry(self.snapshot()));
    }

    /// Advance pulse and duty-cycle deadlines without sampling sensors.
    ///
    /// Called from [`tick`](Self::tick) and whenever the runtime wakes
    /// for a deadline between ticks.
    pub fn service(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.last_now_ms = self.last_now_ms.max(now_ms);
        for p in Parameter::ALL {
            if !self.is_active(p) {
                continue;
            }
            let was_in_sequence = self.loops[p.index()].in_sequence();
            let mut out = Commands::new();
            self.loops[p.index()].poll(now_ms, &mut out);
            self.apply(&out, sink);
            self.note_sequence(p, was_in_sequence, sink);
        }
    }

    /// Earliest pending pulse or phase deadline across active loops.
    pub fn next_deadline(&self) -> Option<u64> {
        Parameter::ALL
            .into_iter()
            .filter(|p| self.is_active(*p))
            .filter_map(|p| self.loops[p.index()].next_deadline())
            .min()
    }

    // ── Command surface ───────────────────────────────────────

    /// Replace a setpoint; effective on the next decision.
    pub fn set_setpoint(
        &mut self,
        parameter: Parameter,
        value: f32,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let value = parameter.validate_setpoint(value)?;
        self.loops[parameter.index()].set_setpoint(value);
        self.mark_settings_dirty();
        info!("{parameter} setpoint -> {value}");
        sink.emit(&AppEvent::SetpointChanged { parameter, value });
        Ok(())
    }

    /// Apply a partial setpoint update; valid fields land even if others fail.
    pub fn apply_setpoints(
        &mut self,
        update: &SetpointUpdate,
        sink: &mut impl EventSink,
    ) -> SetpointReport {
        let report = update.validate();
        for (parameter, value) in report.accepted() {
            // Already range-checked by `validate`.
            if let Err(e) = self.set_setpoint(parameter, value, sink) {
                warn!("setpoint {parameter} rejected: {e}");
            }
        }
        for (parameter, e) in report.rejected() {
            warn!("setpoint {parameter} rejected: {e}");
        }
        report
    }

    /// Enable or disable one loop.
    ///
    /// Disabling halts the loop and drives its relays off before
    /// returning.  Enabling resets loop history and clears any latched
    /// actuator faults for that loop.  Cooldowns survive both.
    pub fn set_enabled(&mut self, parameter: Parameter, enabled: bool, sink: &mut impl EventSink) {
        if !self.loops[parameter.index()].set_enabled(enabled) {
            return;
        }
        self.mark_settings_dirty();
        if enabled {
            self.safety.clear_loop(parameter);
            self.loops[parameter.index()].activate();
        } else {
            self.halt_loop(parameter, sink);
        }
        info!("{parameter} loop {}", if enabled { "enabled" } else { "disabled" });
        sink.emit(&AppEvent::LoopToggled { parameter, enabled });
    }

    /// Global start/stop.
    ///
    /// Stopping aborts every in-flight sequence and writes OFF to all
    /// six relays before returning.
    pub fn set_running(&mut self, running: bool, sink: &mut impl EventSink) {
        if self.running == running {
            return;
        }
        self.running = running;
        if running {
            for l in &mut self.loops {
                l.activate();
            }
        } else {
            for p in Parameter::ALL {
                self.halt_loop(p, sink);
            }
        }
        info!("incubator {}", if running { "running" } else { "stopped" });
        sink.emit(&AppEvent::RunStateChanged { running });
    }

    /// Dispatch a typed command.
    pub fn handle_command(&mut self, cmd: ControlCommand, sink: &mut impl EventSink) -> Result<()> {
        match cmd {
            ControlCommand::SetSetpoint(parameter, value) => {
                self.set_setpoint(parameter, value, sink)?;
            }
            ControlCommand::SetEnabled(parameter, enabled) => {
                self.set_enabled(parameter, enabled, sink);
            }
            ControlCommand::SetRunning(running) => self.set_running(running, sink),
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a fresh, self-consistent snapshot of every loop.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let loops = Parameter::ALL.map(|p| {
            let l = &self.loops[p.index()];
            LoopState {
                parameter: p,
                enabled: l.enabled(),
                setpoint: p.setpoint_range().map(|_| l.setpoint()),
                last_reading: l.last_reading(),
                actuating: p.actuators().iter().any(|a| self.actuator_state[a.index()]),
                cooldown_until_ms: l.cooldown_until(),
                faulted: self.safety.loop_faulted(p),
            }
        });
        TelemetrySnapshot {
            loops,
            chamber_temperature: self.chamber_temperature,
            actuators: self.actuator_state,
            running: self.running,
            actuator_faults: self.safety.faults(),
            taken_at_ms: self.last_now_ms,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn control_loop(&self, parameter: Parameter) -> &ControlLoop {
        &self.loops[parameter.index()]
    }

    pub fn actuator_on(&self, actuator: Actuator) -> bool {
        self.actuator_state[actuator.index()]
    }

    /// Latched actuator fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    pub fn has_faults(&self) -> bool {
        self.safety.has_faults()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn actuator_port(&self) -> &A {
        &self.actuators
    }

    pub fn actuator_port_mut(&mut self) -> &mut A {
        &mut self.actuators
    }

    // ── Settings persistence ──────────────────────────────────

    /// Capture the operator settings.
    pub fn settings(&self) -> ControlSettings {
        let l = |p: Parameter| &self.loops[p.index()];
        ControlSettings {
            temperature_setpoint: l(Parameter::Temperature).setpoint(),
            humidity_setpoint: l(Parameter::Humidity).setpoint(),
            co2_setpoint: l(Parameter::Co2).setpoint(),
            o2_setpoint: l(Parameter::O2).setpoint(),
            temperature_enabled: l(Parameter::Temperature).enabled(),
            humidity_enabled: l(Parameter::Humidity).enabled(),
            co2_enabled: l(Parameter::Co2).enabled(),
            o2_enabled: l(Parameter::O2).enabled(),
            air_pump_enabled: l(Parameter::AirPump).enabled(),
        }
    }

    /// Restore stored settings (boot path, while stopped).
    ///
    /// Out-of-range setpoints are skipped with a warning; the run state
    /// is not part of the settings and stays as it is.
    pub fn restore_settings(&mut self, settings: &ControlSettings) {
        for p in Parameter::ALL {
            let l = &mut self.loops[p.index()];
            if p.setpoint_range().is_some() {
                match p.validate_setpoint(setpoint_of(settings, p)) {
                    Ok(v) => l.set_setpoint(v),
                    Err(e) => warn!("stored {p} setpoint ignored: {e}"),
                }
            }
            l.set_enabled(enabled_of(settings, p));
        }
        info!("settings restored");
    }

    fn mark_settings_dirty(&mut self) {
        if !self.settings_dirty {
            self.settings_dirty = true;
            self.dirty_since_ms = self.last_now_ms;
        }
    }

    /// Save once the debounce has elapsed since the first unsaved change.
    /// Returns `true` if the settings were saved.
    pub fn auto_save_if_needed(&mut self, now_ms: u64, storage: &impl SettingsPort) -> bool {
        if !self.settings_dirty {
            return false;
        }
        if now_ms.saturating_sub(self.dirty_since_ms) < self.save_debounce_ms {
            return false;
        }
        match storage.save(&self.settings()) {
            Ok(()) => {
                self.settings_dirty = false;
                info!("settings auto-saved");
                true
            }
            Err(e) => {
                warn!("settings auto-save failed: {}", e);
                false
            }
        }
    }

    /// Save immediately if dirty (shutdown path).
    pub fn force_save_if_dirty(&mut self, storage: &impl SettingsPort) {
        if !self.settings_dirty {
            return;
        }
        match storage.save(&self.settings()) {
            Ok(()) => {
                self.settings_dirty = false;
                info!("settings force-saved before shutdown");
            }
            Err(e) => warn!("settings force-save failed: {}", e),
        }
    }

    /// Whether settings have unsaved changes.
    pub fn is_settings_dirty(&self) -> bool {
        self.settings_dirty
    }

    // ── Internal ──────────────────────────────────────────────

    fn is_active(&self, parameter: Parameter) -> bool {
        self.running
            && self.loops[parameter.index()].enabled()
            && !self.safety.loop_faulted(parameter)
    }

    fn track_sensor(
        &mut self,
        quantity: Quantity,
        result: core::result::Result<f32, SensorError>,
        sink: &mut impl EventSink,
    ) {
        let was_ok = self.sensor_ok[quantity.index()];
        match result {
            Err(error) if was_ok => {
                warn!("{quantity} sensor unavailable: {error}");
                sink.emit(&AppEvent::SensorLost { quantity, error });
            }
            Ok(_) if !was_ok => {
                info!("{quantity} sensor restored");
                sink.emit(&AppEvent::SensorRestored(quantity));
            }
            _ => {}
        }
        self.sensor_ok[quantity.index()] = result.is_ok();
    }

    fn note_sequence(&self, parameter: Parameter, was: bool, sink: &mut impl EventSink) {
        match (was, self.loops[parameter.index()].in_sequence()) {
            (false, true) => sink.emit(&AppEvent::InjectionStarted(parameter)),
            (true, false) => sink.emit(&AppEvent::InjectionFinished(parameter)),
            _ => {}
        }
    }

    fn apply(&mut self, out: &Commands, sink: &mut impl EventSink) {
        for cmd in out {
            self.write(cmd.actuator, cmd.on, sink);
        }
    }

    /// The single relay write path.
    ///
    /// ON is refused for any relay whose owning loop is faulted, so the
    /// rest of a batch cannot re-energise a loop isolated mid-batch.
    fn write(&mut self, actuator: Actuator, on: bool, sink: &mut impl EventSink) {
        if on && self.safety.loop_faulted(owner_of(actuator)) {
            return;
        }
        match self.actuators.set(actuator, on) {
            Ok(()) => self.actuator_state[actuator.index()] = on,
            Err(error) => {
                self.latch_fault(actuator, error, sink);
                if self.actuators.off(actuator).is_err() {
                    warn!("{actuator} best-effort off failed");
                }
                self.isolate(owner_of(actuator), actuator, sink);
            }
        }
    }

    /// Write OFF; a failure latches the fault but never recurses.
    fn force_off(&mut self, actuator: Actuator, sink: &mut impl EventSink) {
        match self.actuators.off(actuator) {
            Ok(()) => self.actuator_state[actuator.index()] = false,
            Err(error) => self.latch_fault(actuator, error, sink),
        }
    }

    fn latch_fault(&mut self, actuator: Actuator, error: ActuatorError, sink: &mut impl EventSink) {
        let first = !self.safety.has_fault(actuator);
        self.safety.eval_fault(actuator, true);
        // Assume de-energised.
        self.actuator_state[actuator.index()] = false;
        if first {
            sink.emit(&AppEvent::ActuatorFault { actuator, error });
        }
    }

    /// Abort the owning loop's sequence and release its other relays.
    ///
    /// Only reached from [`apply`](Self::apply); the caller reports the
    /// sequence edge.
    fn isolate(&mut self, parameter: Parameter, failed: Actuator, sink: &mut impl EventSink) {
        let mut out = Commands::new();
        self.loops[parameter.index()].halt(&mut out);
        for cmd in &out {
            if cmd.actuator != failed {
                self.force_off(cmd.actuator, sink);
            }
        }
    }

    fn halt_loop(&mut self, parameter: Parameter, sink: &mut impl EventSink) {
        let was_in_sequence = self.loops[parameter.index()].in_sequence();
        let mut out = Commands::new();
        self.loops[parameter.index()].halt(&mut out);
        for cmd in &out {
            self.force_off(cmd.actuator, sink);
        }
        self.note_sequence(parameter, was_in_sequence, sink);
    }
}

fn owner_of(actuator: Actuator) -> Parameter {
    match actuator {
        Actuator::Heater => Parameter::Temperature,
        Actuator::Humidifier => Parameter::Humidity,
        Actuator::AirPump => Parameter::AirPump,
        Actuator::Co2Primary | Actuator::Co2Secondary => Parameter::Co2,
        Actuator::ArgonValve => Parameter::O2,
    }
}

fn setpoint_of(settings: &ControlSettings, parameter: Parameter) -> f32 {
    match parameter {
        Parameter::Temperature => settings.temperature_setpoint,
        Parameter::Humidity => settings.humidity_setpoint,
        Parameter::Co2 => settings.co2_setpoint,
        Parameter::O2 => settings.o2_setpoint,
        Parameter::AirPump => 0.0,
    }
}

fn enabled_of(settings: &ControlSettings, parameter: Parameter) -> bool {
    match parameter {
        Parameter::Temperature => settings.temperature_enabled,
        Parameter::Humidity => settings.humidity_enabled,
        Parameter::Co2 => settings.co2_enabled,
        Parameter::O2 => settings.o2_enabled,
        Parameter::AirPump => settings.air_pump_enabled,
    }
}

//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events
//! through the `log` facade.  Per-tick telemetry goes out at `debug`;
//! the coarser telemetry log row ([`log_telemetry_row`]) goes out at
//! `info` so a default-filtered console stays readable.

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::telemetry::TelemetryFrame;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn nc(v: Option<f32>) -> String {
    v.map_or_else(|| "NC".to_owned(), |v| format!("{v:.1}"))
}

fn flag(on: bool) -> &'static str {
    if on { "ON" } else { "off" }
}

/// One human-readable telemetry row.
pub fn log_telemetry_row(t: &TelemetryFrame) {
    info!(
        "TELEM | run={} | T={}/{}\u{00b0}C (sp {}) | RH={}% (sp {}) | CO2={}ppm (sp {}) | \
         O2={}% (sp {}) | heater={} humid={} vent={} argon={} pump={} | faults=0b{:06b}",
        t.incubator_running,
        nc(t.temperature),
        nc(t.temperature_chamber),
        nc(t.temperature_setpoint),
        nc(t.humidity),
        nc(t.humidity_setpoint),
        nc(t.co2_ppm),
        nc(t.co2_setpoint),
        nc(t.o2),
        nc(t.o2_setpoint),
        flag(t.heater_on),
        flag(t.humidifier_on),
        flag(t.vent_active),
        flag(t.argon_valve_on),
        flag(t.air_pump_on),
        t.actuator_faults,
    );
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(snapshot) => {
                debug!("TICK | t={}ms running={}", snapshot.taken_at_ms, snapshot.running);
            }
            AppEvent::RunStateChanged { running } => {
                info!("RUN | {}", if *running { "running" } else { "stopped" });
            }
            AppEvent::LoopToggled { parameter, enabled } => {
                info!("LOOP | {parameter} enabled={enabled}");
            }
            AppEvent::SetpointChanged { parameter, value } => {
                info!("SETPOINT | {parameter} = {value}");
            }
            AppEvent::SensorLost { quantity, error } => {
                warn!("SENSOR | {quantity} lost: {error}");
            }
            AppEvent::SensorRestored(quantity) => {
                info!("SENSOR | {quantity} restored");
            }
            AppEvent::ActuatorFault { actuator, error } => {
                error!("FAULT | {actuator}: {error}");
            }
            AppEvent::InjectionStarted(parameter) => {
                debug!("PULSE | {parameter} sequence started");
            }
            AppEvent::InjectionFinished(parameter) => {
                debug!("PULSE | {parameter} sequence finished");
            }
        }
    }
}

//! Integration tests: ControlManager driven through mock sensors/relays.
//!
//! Every test runs on the host with simulated time; `tick` stands for
//! a scheduled control cycle and `service` for a deadline wake-up in
//! between.

use incubator::adapters::settings_file::MemorySettings;
use incubator::app::commands::{ControlCommand, SetpointUpdate};
use incubator::app::events::AppEvent;
use incubator::app::ports::{Actuator, Quantity};
use incubator::config::SystemConfig;
use incubator::control::{Parameter, Policy};
use incubator::error::{ControlError, SensorError};

use crate::mock_hw::{LogSink, Manager, make_manager, make_manager_with, make_running};

fn pid_integral(m: &Manager) -> f32 {
    match m.control_loop(Parameter::Temperature).policy() {
        Policy::Temperature(t) => t.pid().integral(),
        _ => unreachable!("temperature loop carries a PID policy"),
    }
}

fn injections(sink: &LogSink, parameter: Parameter) -> (usize, usize) {
    (
        sink.count(|e| matches!(e, AppEvent::InjectionStarted(p) if *p == parameter)),
        sink.count(|e| matches!(e, AppEvent::InjectionFinished(p) if *p == parameter)),
    )
}

// ── Start / stop ──────────────────────────────────────────────

#[test]
fn start_writes_off_to_every_relay() {
    let mut sink = LogSink::new();
    let mut m = incubator::app::service::ControlManager::new(
        &SystemConfig::default(),
        crate::mock_hw::MockSensors::nominal(),
        crate::mock_hw::MockRelays::new(),
    );
    m.start(&mut sink);
    let relays = m.actuator_port();
    for a in Actuator::ALL {
        assert_eq!(relays.writes_to(a, 0), vec![false], "{a}");
    }
    assert!(!m.is_running());
}

#[test]
fn stopped_tick_reads_but_never_actuates() {
    let (mut m, mut sink) = make_manager();
    m.sensors_mut().set(Quantity::LiquidTemperature, 30.0);
    m.sensors_mut().set(Quantity::Co2Raw, 20.0);

    m.tick(0, &mut sink);
    m.tick(1000, &mut sink);

    assert!(m.actuator_port().calls.is_empty());
    let snap = m.snapshot();
    assert_eq!(snap.loop_state(Parameter::Temperature).last_reading, Some(30.0));
    assert_eq!(snap.loop_state(Parameter::Co2).last_reading, Some(200.0));
    assert_eq!(sink.telemetry_count, 2);
}

#[test]
fn stop_forces_all_six_relays_off_synchronously() {
    let (mut m, mut sink) = make_running();
    let s = m.sensors_mut();
    s.set(Quantity::LiquidTemperature, 30.0);
    s.set(Quantity::Humidity, 50.0);
    s.set(Quantity::Co2Raw, 40.0);
    s.set(Quantity::O2, 8.0);

    m.tick(0, &mut sink);
    for a in [
        Actuator::Heater,
        Actuator::Humidifier,
        Actuator::AirPump,
        Actuator::Co2Primary,
        Actuator::ArgonValve,
    ] {
        assert!(m.actuator_on(a), "{a} should be on");
    }

    let mark = m.actuator_port().calls.len();
    m.set_running(false, &mut sink);

    for a in Actuator::ALL {
        assert_eq!(m.actuator_port().writes_to(a, mark), vec![false], "{a}");
        assert!(!m.actuator_on(a));
    }
    assert!(!m.snapshot().running);
    assert_eq!(injections(&sink, Parameter::Co2), (1, 1));

    // The aborted CO2 sequence never resumes.
    let mark = m.actuator_port().calls.len();
    m.service(100, &mut sink);
    m.service(1100, &mut sink);
    m.tick(2000, &mut sink);
    assert_eq!(m.actuator_port().calls.len(), mark);
}

#[test]
fn run_command_round_trip() {
    let (mut m, mut sink) = make_manager();
    m.handle_command(ControlCommand::SetRunning(true), &mut sink).unwrap();
    assert!(m.is_running());
    m.handle_command(ControlCommand::SetRunning(true), &mut sink).unwrap();
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::RunStateChanged { .. })),
        1,
        "repeated start is a no-op"
    );
}

// ── CO2 injection ─────────────────────────────────────────────

#[test]
fn co2_sequence_end_to_end() {
    let (mut m, mut sink) = make_running();
    let update: SetpointUpdate = serde_json::from_str(r#"{"co2": 5000}"#).unwrap();
    let report = m.apply_setpoints(&update, &mut sink);
    assert_eq!(report.co2, Some(Ok(5000.0)));

    // 400 raw = 4000 ppm
    m.sensors_mut().set(Quantity::Co2Raw, 400.0);
    let t0 = 20_000;

    m.tick(t0, &mut sink);
    assert!(m.actuator_on(Actuator::Co2Primary));
    assert!(m.snapshot().vent_active());
    assert_eq!(m.next_deadline(), Some(t0 + 100));

    m.service(t0 + 99, &mut sink);
    assert!(m.actuator_on(Actuator::Co2Primary));

    m.service(t0 + 100, &mut sink);
    assert!(!m.actuator_on(Actuator::Co2Primary));
    assert!(!m.actuator_on(Actuator::Co2Secondary));

    m.service(t0 + 1100, &mut sink);
    assert!(m.actuator_on(Actuator::Co2Secondary));

    m.service(t0 + 1200, &mut sink);
    let snap = m.snapshot();
    assert!(!snap.vent_active());
    assert_eq!(snap.loop_state(Parameter::Co2).cooldown_until_ms, Some(t0 + 15_000));
    assert_eq!(injections(&sink, Parameter::Co2), (1, 1));

    // Still low, but inside the cooldown.
    let mark = m.actuator_port().calls.len();
    m.tick(t0 + 14_999, &mut sink);
    assert!(!m.actuator_port().switched_on(Actuator::Co2Primary, mark));

    m.tick(t0 + 15_000, &mut sink);
    assert!(m.actuator_on(Actuator::Co2Primary));
}

#[test]
fn co2_at_or_above_setpoint_never_injects() {
    let (mut m, mut sink) = make_running();
    // 100 raw = 1000 ppm = default setpoint.
    for t in (0..30_000).step_by(1000) {
        m.tick(t, &mut sink);
    }
    assert!(m.actuator_port().writes_to(Actuator::Co2Primary, 0).is_empty());
    assert_eq!(injections(&sink, Parameter::Co2), (0, 0));
}

#[test]
fn disable_mid_sequence_keeps_cooldown() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().set(Quantity::Co2Raw, 40.0);

    m.tick(0, &mut sink);
    m.service(100, &mut sink);
    // In the pause between pulses.
    m.set_enabled(Parameter::Co2, false, &mut sink);
    assert!(!m.actuator_on(Actuator::Co2Primary));
    assert!(!m.actuator_on(Actuator::Co2Secondary));

    let mark = m.actuator_port().calls.len();
    m.service(1100, &mut sink);
    assert!(m.actuator_port().writes_to(Actuator::Co2Secondary, mark).is_empty());

    m.set_enabled(Parameter::Co2, true, &mut sink);
    m.tick(3000, &mut sink);
    m.tick(14_000, &mut sink);
    assert!(!m.actuator_port().switched_on(Actuator::Co2Primary, mark));
    assert_eq!(
        m.snapshot().loop_state(Parameter::Co2).cooldown_until_ms,
        Some(15_000)
    );

    m.tick(15_000, &mut sink);
    assert!(m.actuator_on(Actuator::Co2Primary));
}

// ── O2 ────────────────────────────────────────────────────────

#[test]
fn o2_pulses_once_per_minute() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().set(Quantity::O2, 9.0);

    m.tick(0, &mut sink);
    assert!(m.actuator_on(Actuator::ArgonValve));
    m.service(100, &mut sink);
    assert!(!m.actuator_on(Actuator::ArgonValve));

    for t in (1000..60_000).step_by(1000) {
        m.tick(t, &mut sink);
    }
    assert_eq!(
        m.actuator_port().writes_to(Actuator::ArgonValve, 0),
        vec![true, false]
    );

    m.tick(60_000, &mut sink);
    assert!(m.actuator_on(Actuator::ArgonValve));
    assert_eq!(injections(&sink, Parameter::O2), (2, 1));
}

// ── Temperature / humidity ────────────────────────────────────

#[test]
fn temperature_drives_heater_until_setpoint() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().set(Quantity::LiquidTemperature, 30.0);
    for t in (0..5000).step_by(1000) {
        m.tick(t, &mut sink);
        assert!(m.actuator_on(Actuator::Heater));
    }
    m.sensors_mut().set(Quantity::LiquidTemperature, 38.0);
    m.tick(5000, &mut sink);
    assert!(!m.actuator_on(Actuator::Heater));
}

#[test]
fn reenable_resets_pid_history() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().set(Quantity::LiquidTemperature, 30.0);
    for t in (0..5000).step_by(1000) {
        m.tick(t, &mut sink);
    }
    assert!(pid_integral(&m) > 0.0);

    m.set_enabled(Parameter::Temperature, false, &mut sink);
    assert!(!m.actuator_on(Actuator::Heater));
    m.set_enabled(Parameter::Temperature, true, &mut sink);
    assert_eq!(pid_integral(&m), 0.0);
}

#[test]
fn humidity_hysteresis_through_manager() {
    let (mut m, mut sink) = make_running();
    let steps = [(57.0, true), (61.0, true), (62.5, false), (59.0, false), (57.5, true)];
    for (i, (rh, expect)) in steps.into_iter().enumerate() {
        m.sensors_mut().set(Quantity::Humidity, rh);
        m.tick(i as u64 * 1000, &mut sink);
        assert_eq!(m.actuator_on(Actuator::Humidifier), expect, "at {rh}%");
    }
}

#[test]
fn disabled_loop_is_forced_off_and_stays_off() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().set(Quantity::Humidity, 50.0);
    m.tick(0, &mut sink);
    assert!(m.actuator_on(Actuator::Humidifier));

    m.set_enabled(Parameter::Humidity, false, &mut sink);
    let last = m.actuator_port().calls.last().copied();
    assert_eq!(last.map(|c| (c.actuator, c.on)), Some((Actuator::Humidifier, false)));

    let mark = m.actuator_port().calls.len();
    m.tick(1000, &mut sink);
    assert!(m.actuator_port().writes_to(Actuator::Humidifier, mark).is_empty());

    let state = *m.snapshot().loop_state(Parameter::Humidity);
    assert!(!state.enabled);
    assert!(!state.actuating);
    assert_eq!(state.last_reading, Some(50.0), "disabled loops still report readings");
    let toggled = sink.count(|e| {
        matches!(
            e,
            AppEvent::LoopToggled { parameter: Parameter::Humidity, enabled: false }
        )
    });
    assert_eq!(toggled, 1);
}

// ── Air pump ──────────────────────────────────────────────────

fn short_cycle() -> SystemConfig {
    SystemConfig {
        air_pump_on_ms: 5000,
        air_pump_off_ms: 10_000,
        ..SystemConfig::default()
    }
}

#[test]
fn air_pump_follows_duty_cycle() {
    let (mut m, mut sink) = make_manager_with(&short_cycle());
    m.set_running(true, &mut sink);
    for t in (0..30_000).step_by(1000) {
        m.tick(t, &mut sink);
        let expected = t % 15_000 < 5000;
        assert_eq!(m.actuator_on(Actuator::AirPump), expected, "at {t} ms");
    }
}

#[test]
fn air_pump_phase_edges_land_between_ticks() {
    let (mut m, mut sink) = make_manager_with(&short_cycle());
    m.set_running(true, &mut sink);
    m.tick(0, &mut sink);
    assert_eq!(m.next_deadline(), Some(5000));
    m.service(5000, &mut sink);
    assert!(!m.actuator_on(Actuator::AirPump));
    assert_eq!(m.next_deadline(), Some(15_000));
}

#[test]
fn air_pump_restarts_cycle_after_reenable() {
    let (mut m, mut sink) = make_manager_with(&short_cycle());
    m.set_running(true, &mut sink);
    m.tick(0, &mut sink);
    m.tick(7000, &mut sink);
    assert!(!m.actuator_on(Actuator::AirPump));

    m.set_enabled(Parameter::AirPump, false, &mut sink);
    m.set_enabled(Parameter::AirPump, true, &mut sink);
    m.tick(8000, &mut sink);
    assert!(m.actuator_on(Actuator::AirPump), "fresh cycle starts ON");
    m.tick(13_000, &mut sink);
    assert!(!m.actuator_on(Actuator::AirPump));
}

// ── Sensor failure ────────────────────────────────────────────

#[test]
fn lost_temperature_sensor_turns_heater_off() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().set(Quantity::LiquidTemperature, 30.0);
    m.tick(0, &mut sink);
    assert!(m.actuator_on(Actuator::Heater));

    m.sensors_mut().fail(Quantity::LiquidTemperature, SensorError::Timeout);
    m.tick(1000, &mut sink);
    m.tick(2000, &mut sink);
    assert!(!m.actuator_on(Actuator::Heater));
    assert_eq!(m.snapshot().loop_state(Parameter::Temperature).last_reading, None);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SensorLost { quantity: Quantity::LiquidTemperature, .. })),
        1,
        "loss is reported once"
    );

    m.sensors_mut().set(Quantity::LiquidTemperature, 30.0);
    m.tick(3000, &mut sink);
    assert!(m.actuator_on(Actuator::Heater));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SensorRestored(Quantity::LiquidTemperature))),
        1
    );
}

#[test]
fn lost_co2_sensor_never_starts_injection() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().fail(Quantity::Co2Raw, SensorError::NotConnected);
    for t in (0..20_000).step_by(1000) {
        m.tick(t, &mut sink);
    }
    assert!(m.actuator_port().writes_to(Actuator::Co2Primary, 0).is_empty());
    assert_eq!(m.snapshot().loop_state(Parameter::Co2).last_reading, None);
}

// ── Actuator faults ───────────────────────────────────────────

#[test]
fn heater_fault_isolates_only_temperature() {
    let (mut m, mut sink) = make_running();
    m.actuator_port_mut().fail(Actuator::Heater);
    m.sensors_mut().set(Quantity::LiquidTemperature, 30.0);
    m.sensors_mut().set(Quantity::Humidity, 50.0);

    m.tick(0, &mut sink);
    assert_eq!(m.fault_flags(), Actuator::Heater.mask());
    assert!(!m.actuator_on(Actuator::Heater));
    assert!(m.actuator_on(Actuator::Humidifier), "humidity keeps running");
    assert!(m.snapshot().loop_state(Parameter::Temperature).faulted);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ActuatorFault { actuator: Actuator::Heater, .. })),
        1
    );

    let mark = m.actuator_port().calls.len();
    m.tick(1000, &mut sink);
    assert!(m.actuator_port().writes_to(Actuator::Heater, mark).is_empty());

    // Operator fixes the relay and toggles the loop.
    m.actuator_port_mut().repair(Actuator::Heater);
    m.set_enabled(Parameter::Temperature, false, &mut sink);
    m.set_enabled(Parameter::Temperature, true, &mut sink);
    assert_eq!(m.fault_flags(), 0);
    m.tick(2000, &mut sink);
    assert!(m.actuator_on(Actuator::Heater));
}

#[test]
fn co2_fault_aborts_sequence_and_closes_other_valve() {
    let (mut m, mut sink) = make_running();
    m.actuator_port_mut().fail(Actuator::Co2Secondary);
    m.sensors_mut().set(Quantity::Co2Raw, 40.0);

    m.tick(0, &mut sink);
    m.service(100, &mut sink);
    m.service(1100, &mut sink);

    assert!(m.fault_flags() & Actuator::Co2Secondary.mask() != 0);
    assert!(!m.snapshot().vent_active());
    assert!(!m.control_loop(Parameter::Co2).in_sequence());
    assert_eq!(injections(&sink, Parameter::Co2), (1, 1));
    assert!(m.actuator_on(Actuator::AirPump), "other loops unaffected");
}

#[test]
fn primary_fault_in_late_batch_never_opens_secondary() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().set(Quantity::Co2Raw, 50.0);

    m.tick(0, &mut sink);
    assert!(m.actuator_on(Actuator::Co2Primary));

    // The late wake-up closes the primary and opens the secondary in one
    // batch; the primary write fails first.
    m.actuator_port_mut().fail(Actuator::Co2Primary);
    let mark = m.actuator_port().calls.len();
    for t in [5_000, 10_000, 30_000, 60_000] {
        m.tick(t, &mut sink);
        m.service(t + 1_500, &mut sink);
    }

    assert!(m.fault_flags() & Actuator::Co2Primary.mask() != 0);
    assert!(m.snapshot().loop_state(Parameter::Co2).faulted);
    assert!(!m.control_loop(Parameter::Co2).in_sequence());
    assert!(!m.actuator_on(Actuator::Co2Secondary));
    assert!(!m.actuator_port().switched_on(Actuator::Co2Secondary, mark));
    assert!(!m.actuator_port().is_on(Actuator::Co2Secondary));
    assert_eq!(injections(&sink, Parameter::Co2), (1, 1));
    assert!(m.has_faults());
}

// ── Setpoints & settings ──────────────────────────────────────

#[test]
fn partial_setpoint_update_applies_valid_fields() {
    let (mut m, mut sink) = make_manager();
    let update: SetpointUpdate =
        serde_json::from_str(r#"{"temperature": 200, "humidity": "55"}"#).unwrap();
    let report = m.apply_setpoints(&update, &mut sink);

    assert!(matches!(report.temperature, Some(Err(ControlError::InvalidSetpoint { .. }))));
    let snap = m.snapshot();
    assert_eq!(snap.loop_state(Parameter::Humidity).setpoint, Some(55.0));
    assert_eq!(snap.loop_state(Parameter::Temperature).setpoint, Some(37.0));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SetpointChanged { .. })), 1);
}

#[test]
fn setpoint_takes_effect_on_next_decision() {
    let (mut m, mut sink) = make_running();
    m.sensors_mut().set(Quantity::Humidity, 66.0);
    m.tick(0, &mut sink);
    assert!(!m.actuator_on(Actuator::Humidifier));

    m.set_setpoint(Parameter::Humidity, 70.0, &mut sink).unwrap();
    assert!(!m.actuator_on(Actuator::Humidifier), "no write until the next tick");
    m.tick(1000, &mut sink);
    assert!(m.actuator_on(Actuator::Humidifier));
}

#[test]
fn settings_save_is_debounced() {
    let (mut m, mut sink) = make_manager();
    let store = MemorySettings::new();
    m.tick(1000, &mut sink);
    m.set_setpoint(Parameter::O2, 4.0, &mut sink).unwrap();
    m.set_setpoint(Parameter::O2, 4.5, &mut sink).unwrap();

    assert!(!m.auto_save_if_needed(5999, &store));
    assert!(m.auto_save_if_needed(6000, &store));
    assert_eq!(store.save_count(), 1);
    assert_eq!(store.stored().map(|s| s.o2_setpoint), Some(4.5));
    assert!(!m.auto_save_if_needed(20_000, &store));
}

#[test]
fn force_save_on_shutdown_path() {
    let (mut m, mut sink) = make_manager();
    let store = MemorySettings::new();
    m.force_save_if_dirty(&store);
    assert_eq!(store.save_count(), 0);

    m.set_enabled(Parameter::AirPump, false, &mut sink);
    m.force_save_if_dirty(&store);
    assert_eq!(store.stored().map(|s| s.air_pump_enabled), Some(false));
    assert!(!m.is_settings_dirty());
}

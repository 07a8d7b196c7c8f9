//! Integration tests: ControlTask driven through a ControlLink.
//!
//! The task runs on its own thread against mock relays and real
//! wall-clock time; the test thread plays the console.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use incubator::adapters::settings_file::{JsonFileSettings, MemorySettings};
use incubator::app::commands::SetpointUpdate;
use incubator::app::ports::{Actuator, Quantity, SettingsPort};
use incubator::app::service::ControlManager;
use incubator::app::telemetry::TelemetrySnapshot;
use incubator::config::{ControlSettings, SystemConfig};
use incubator::control::Parameter;
use incubator::runtime::{self, ControlLink, ControlTask};

use crate::mock_hw::{LogSink, MockRelays, MockSensors};

fn fast_config() -> SystemConfig {
    SystemConfig {
        control_interval_ms: 20,
        telemetry_log_interval_ms: 200,
        settings_save_debounce_ms: 50,
        ..SystemConfig::default()
    }
}

fn settings_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("incubator-{name}-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

/// Poll published telemetry until `pred` holds or 3 s pass.
fn wait_for(link: &ControlLink, pred: impl Fn(&TelemetrySnapshot) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if link.telemetry().is_some_and(|s| pred(&s)) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn task_runs_commands_and_shuts_down_cleanly() {
    let config = fast_config();
    let path = settings_path("task");
    let mut sensors = MockSensors::nominal();
    sensors.set(Quantity::Co2Raw, 40.0);

    let link = Arc::new(ControlLink::new());
    let task = ControlTask::new(
        &config,
        ControlManager::new(&config, sensors, MockRelays::new()),
        JsonFileSettings::new(&path),
        LogSink::new(),
        Arc::clone(&link),
    );
    let handle = thread::spawn(move || runtime::run_blocking(task));

    assert!(wait_for(&link, |s| !s.running), "first snapshot published");

    link.set_running(true);
    assert!(wait_for(&link, |s| s.running && s.actuator_on(Actuator::AirPump)));
    // 400 ppm against a 1000 ppm setpoint.
    assert!(wait_for(&link, |s| {
        s.loop_state(Parameter::Co2).cooldown_until_ms.is_some()
    }));

    link.set_enabled("humidity", false).unwrap();
    let update: SetpointUpdate = serde_json::from_str(r#"{"o2": 4.5}"#).unwrap();
    assert_eq!(link.put_setpoints(&update).o2, Some(Ok(4.5)));
    assert!(wait_for(&link, |s| {
        !s.loop_state(Parameter::Humidity).enabled
            && s.loop_state(Parameter::O2).setpoint == Some(4.5)
    }));

    link.request_shutdown();
    let manager = handle.join().expect("control thread panicked");

    assert!(!manager.is_running());
    for a in Actuator::ALL {
        assert!(!manager.actuator_on(a), "{a} left on");
        assert!(!manager.actuator_port().is_on(a), "{a} last write was ON");
    }
    let co2_writes = manager.actuator_port().writes_to(Actuator::Co2Primary, 0);
    assert!(co2_writes.contains(&true));

    let saved = JsonFileSettings::new(&path).load().expect("settings saved");
    assert!(!saved.humidity_enabled);
    assert_eq!(saved.o2_setpoint, 4.5);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn stop_lands_during_injection_pause() {
    let config = SystemConfig {
        co2_pause_ms: 2000,
        ..fast_config()
    };
    let mut sensors = MockSensors::nominal();
    sensors.set(Quantity::Co2Raw, 40.0);

    let link = Arc::new(ControlLink::new());
    let task = ControlTask::new(
        &config,
        ControlManager::new(&config, sensors, MockRelays::new()),
        MemorySettings::new(),
        LogSink::new(),
        Arc::clone(&link),
    );
    let handle = thread::spawn(move || runtime::run_blocking(task));

    link.set_running(true);
    assert!(wait_for(&link, |s| s.running
        && s.loop_state(Parameter::Co2).cooldown_until_ms.is_some()
        && !s.vent_active()));
    link.set_running(false);
    assert!(wait_for(&link, |s| !s.running));

    // Give the abandoned pause time to expire.
    thread::sleep(Duration::from_millis(2300));
    link.request_shutdown();
    let manager = handle.join().expect("control thread panicked");

    let secondary = manager.actuator_port().writes_to(Actuator::Co2Secondary, 0);
    assert!(!secondary.contains(&true), "secondary pulse fired after stop");
}

#[test]
fn stored_settings_are_restored_at_boot() {
    let config = SystemConfig::default();
    let store = MemorySettings::new();
    store
        .save(&ControlSettings {
            co2_setpoint: 5000.0,
            humidity_enabled: false,
            ..ControlSettings::default()
        })
        .unwrap();

    let task = ControlTask::new(
        &config,
        ControlManager::new(&config, MockSensors::nominal(), MockRelays::new()),
        store,
        LogSink::new(),
        Arc::new(ControlLink::new()),
    );
    let m = task.manager();
    assert_eq!(m.control_loop(Parameter::Co2).setpoint(), 5000.0);
    assert!(!m.control_loop(Parameter::Humidity).enabled());
    assert!(!m.is_running(), "run state is never restored");
    assert!(!m.is_settings_dirty());
}

//! Incubator controller host entry point.
//!
//! Runs the control engine against the simulated chamber, with an
//! operator console on stdin.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedSensors  RelayBank<SimPin>  LogEventSink             │
//! │  (SensorPort)      (ActuatorPort)     (EventSink)              │
//! │  JsonFileSettings  Console (stdin)                             │
//! │  (SettingsPort)    (ControlLink)                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ControlManager (pure logic)                 │    │
//! │  │  5 loops · safety · run state                          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ControlTask: Scheduler · deadlines · LocalExecutor            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use incubator::adapters::console::{self, ConsoleError, ConsoleRequest};
use incubator::adapters::log_sink::LogEventSink;
use incubator::adapters::settings_file::JsonFileSettings;
use incubator::adapters::simulated::simulated_chamber;
use incubator::app::service::ControlManager;
use incubator::config::SystemConfig;
use incubator::runtime::{self, ControlLink, ControlTask};

const DEFAULT_SETTINGS_PATH: &str = "incubator-settings.json";

fn load_config(path: Option<String>) -> Result<SystemConfig> {
    let Some(path) = path else {
        info!("no config file given, using defaults");
        return Ok(SystemConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config: SystemConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
    info!("config loaded from {path}");
    Ok(config)
}

/// Read console lines on a dedicated thread until `quit` or EOF.
fn spawn_console(link: Arc<ControlLink>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!("console read failed: {e}");
                        break;
                    }
                };
                match console::parse_line(&line) {
                    Ok(request) => {
                        let quit = matches!(request, ConsoleRequest::Quit);
                        println!("{}", console::execute(request, &link));
                        if quit {
                            return;
                        }
                    }
                    Err(ConsoleError::Empty) => {}
                    Err(e) => println!("error: {e}"),
                }
            }
            // EOF behaves like quit.
            link.request_shutdown();
        })
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  Incubator controller v{:<13} ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config(std::env::args().nth(1))?;
    config
        .validate()
        .map_err(|e| anyhow!("invalid configuration: {e}"))?;

    // ── 3. Hardware (simulated chamber) ───────────────────────
    let (sensors, relays) = simulated_chamber(config.co2_raw_scale);

    // ── 4. Control task ───────────────────────────────────────
    let settings_path =
        std::env::var("INCUBATOR_SETTINGS").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_owned());
    let link = Arc::new(ControlLink::new());
    let manager = ControlManager::new(&config, sensors, relays);
    let task = ControlTask::new(
        &config,
        manager,
        JsonFileSettings::new(settings_path),
        LogEventSink::new(),
        Arc::clone(&link),
    );

    // ── 5. Operator console ───────────────────────────────────
    spawn_console(Arc::clone(&link)).context("spawning console thread")?;
    info!("console ready: run | stop | status | quit | JSON requests");

    // ── 6. Run until shutdown ─────────────────────────────────
    let manager = runtime::run_blocking(task);
    info!("shutdown complete after {} control ticks", manager.tick_count());
    if manager.has_faults() {
        warn!("relay faults still latched at shutdown: 0b{:06b}", manager.fault_flags());
    }
    Ok(())
}

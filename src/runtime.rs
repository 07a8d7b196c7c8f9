//! Control task and its cross-thread link.
//!
//! The control task is the single owner of the [`ControlManager`] and
//! therefore of every sensor and relay.  Other threads (console, web
//! handlers) talk to it only through a shared [`ControlLink`]:
//!
//! ```text
//! ┌──────────────┐  ControlCommand (Channel)   ┌──────────────────┐
//! │  Any thread  │────────────────────────────▶│                  │
//! │  (console,   │  run / stop (Signal)        │   Control task   │
//! │   web, ...)  │────────────────────────────▶│  (LocalExecutor) │
//! │              │◀────────────────────────────│                  │
//! └──────────────┘  Arc<TelemetrySnapshot>     └──────────────────┘
//! ```
//!
//! Run/stop travels on a [`Signal`] rather than the command channel so
//! a full queue can never swallow a stop.  The task sleeps on a reactor
//! timer until the earliest of: the next scheduled tick, the next pulse
//! deadline, or an incoming message.  No step ever blocks the thread,
//! so a stop lands in the middle of a CO2 pause.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{info, warn};

use crate::adapters::log_sink::log_telemetry_row;
use crate::adapters::time::MonotonicClock;
use crate::app::commands::{ChannelMessage, ControlCommand, SetpointReport, SetpointUpdate};
use crate::app::ports::{ActuatorPort, EventSink, SensorPort, SettingsPort, TickDelegate, TickKind};
use crate::app::service::ControlManager;
use crate::app::telemetry::TelemetrySnapshot;
use crate::config::SystemConfig;
use crate::control::Parameter;
use crate::error::{ControlError, Result};
use crate::scheduler::Scheduler;

/// Channel depth for setpoint / enable commands.
pub const COMMAND_DEPTH: usize = 16;

// ───────────────────────────────────────────────────────────────
// ControlLink
// ───────────────────────────────────────────────────────────────

/// Thread-safe command and telemetry surface of the control task.
pub struct ControlLink {
    commands: Channel<CriticalSectionRawMutex, ControlCommand, COMMAND_DEPTH>,
    run: Signal<CriticalSectionRawMutex, bool>,
    shutdown: Signal<CriticalSectionRawMutex, ()>,
    snapshot: Mutex<CriticalSectionRawMutex, RefCell<Option<Arc<TelemetrySnapshot>>>>,
}

impl Default for ControlLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlLink {
    pub fn new() -> Self {
        Self {
            commands: Channel::new(),
            run: Signal::new(),
            shutdown: Signal::new(),
            snapshot: Mutex::new(RefCell::new(None)),
        }
    }

    /// Validate every present field now and queue the valid ones.
    ///
    /// Invalid fields are reported without touching the task; a field
    /// that cannot be queued reports [`ControlError::CommandQueueFull`].
    pub fn put_setpoints(&self, update: &SetpointUpdate) -> SetpointReport {
        let mut report = update.validate();
        let accepted: heapless::Vec<(Parameter, f32), 4> = report.accepted().collect();
        for (parameter, value) in accepted {
            if let Err(e) = self.send(ControlCommand::SetSetpoint(parameter, value)) {
                report.set(parameter, Err(e));
            }
        }
        report
    }

    /// Enable or disable the loop named `name` (`"temperature"`, `"air_pump"`, ...).
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let parameter: Parameter = name.parse()?;
        self.send(ControlCommand::SetEnabled(parameter, enabled))
    }

    /// Start or stop the incubator.  Never dropped; the latest request wins.
    pub fn set_running(&self, running: bool) {
        self.run.signal(running);
    }

    /// Apply a realtime channel message.
    pub fn handle_message(&self, message: ChannelMessage) {
        match message.into_command() {
            ControlCommand::SetRunning(running) => self.set_running(running),
            other => {
                if let Err(e) = self.send(other) {
                    warn!("channel message dropped: {e}");
                }
            }
        }
    }

    /// Latest published snapshot; `None` before the first tick.
    pub fn telemetry(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.snapshot.lock(|cell| cell.borrow().clone())
    }

    /// Ask the control task to de-energise everything and exit.
    pub fn request_shutdown(&self) {
        self.shutdown.signal(());
    }

    fn send(&self, cmd: ControlCommand) -> Result<()> {
        self.commands
            .try_send(cmd)
            .map_err(|_| ControlError::CommandQueueFull)
    }

    fn publish(&self, snapshot: TelemetrySnapshot) {
        let snapshot = Arc::new(snapshot);
        self.snapshot.lock(|cell| *cell.borrow_mut() = Some(snapshot));
    }
}

// ───────────────────────────────────────────────────────────────
// Control task
// ───────────────────────────────────────────────────────────────

enum Wake {
    Shutdown,
    Run(bool),
    Command(ControlCommand),
    Timer,
}

/// Everything the control task owns.
pub struct ControlTask<S, A, P, E> {
    manager: ControlManager<S, A>,
    scheduler: Scheduler,
    clock: MonotonicClock,
    settings: P,
    sink: E,
    link: Arc<ControlLink>,
    fallback_wait_ms: u64,
}

/// Scheduler delegate borrowing the task's parts for one poll.
struct Cycle<'a, S, A, P, E> {
    manager: &'a mut ControlManager<S, A>,
    settings: &'a P,
    sink: &'a mut E,
}

impl<S, A, P, E> TickDelegate for Cycle<'_, S, A, P, E>
where
    S: SensorPort,
    A: ActuatorPort,
    P: SettingsPort,
    E: EventSink,
{
    fn on_tick(&mut self, kind: TickKind, now_ms: u64) {
        match kind {
            TickKind::Control => self.manager.tick(now_ms, &mut *self.sink),
            TickKind::TelemetryLog => log_telemetry_row(&self.manager.snapshot().to_frame()),
            TickKind::SettingsFlush => {
                self.manager.auto_save_if_needed(now_ms, self.settings);
            }
        }
    }
}

impl<S, A, P, E> ControlTask<S, A, P, E>
where
    S: SensorPort,
    A: ActuatorPort,
    P: SettingsPort,
    E: EventSink,
{
    /// Build the task; stored settings are restored if present.
    pub fn new(
        config: &SystemConfig,
        manager: ControlManager<S, A>,
        settings: P,
        sink: E,
        link: Arc<ControlLink>,
    ) -> Self {
        let mut manager = manager;
        match settings.load() {
            Ok(stored) => manager.restore_settings(&stored),
            Err(e) => info!("no stored settings ({e}), using defaults"),
        }
        Self {
            manager,
            scheduler: Scheduler::from_config(config),
            clock: MonotonicClock::new(),
            settings,
            sink,
            link,
            fallback_wait_ms: u64::from(config.control_interval_ms),
        }
    }

    pub fn manager(&self) -> &ControlManager<S, A> {
        &self.manager
    }

    /// Run until [`ControlLink::request_shutdown`].
    pub async fn run(mut self) -> ControlManager<S, A> {
        self.manager.start(&mut self.sink);
        info!("control task started");

        loop {
            let now = self.clock.uptime_ms();
            self.manager.service(now, &mut self.sink);
            let mut cycle = Cycle {
                manager: &mut self.manager,
                settings: &self.settings,
                sink: &mut self.sink,
            };
            self.scheduler.poll(now, &mut cycle);
            self.link.publish(self.manager.snapshot());

            let wake_at = [self.scheduler.next_due(now), self.manager.next_deadline()]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(now + self.fallback_wait_ms);

            match self.wait(wake_at).await {
                Wake::Shutdown => break,
                Wake::Run(running) => self.manager.set_running(running, &mut self.sink),
                Wake::Command(cmd) => {
                    if let Err(e) = self.manager.handle_command(cmd, &mut self.sink) {
                        warn!("command {:?} rejected: {}", cmd, e);
                    }
                }
                Wake::Timer => {}
            }
        }

        self.manager.set_running(false, &mut self.sink);
        self.manager.force_all_off(&mut self.sink);
        self.manager.force_save_if_dirty(&self.settings);
        self.link.publish(self.manager.snapshot());
        info!("control task stopped, all relays off");
        self.manager
    }

    /// Sleep until `wake_at_ms` or the first message, stop/shutdown first.
    async fn wait(&self, wake_at_ms: u64) -> Wake {
        let link = &*self.link;
        let deadline = self.clock.instant_at(wake_at_ms);
        future::or(
            async {
                link.shutdown.wait().await;
                Wake::Shutdown
            },
            future::or(
                async { Wake::Run(link.run.wait().await) },
                future::or(async { Wake::Command(link.commands.receive().await) }, async {
                    async_io_mini::Timer::at(deadline).await;
                    Wake::Timer
                }),
            ),
        )
        .await
    }
}

/// Drive a control task to completion on the current thread.
pub fn run_blocking<S, A, P, E>(task: ControlTask<S, A, P, E>) -> ControlManager<S, A>
where
    S: SensorPort,
    A: ActuatorPort,
    P: SettingsPort,
    E: EventSink,
{
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    future::block_on(executor.run(task.run()))
}

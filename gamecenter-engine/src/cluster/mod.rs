//! The cluster aggregate.
//!
//! A [`Cluster`] owns the roster of managed processes, the supervisory phase
//! and the tick counter. Each call to [`Cluster::tick`] runs exactly one of
//! the startup sequencer, the health monitor or the shutdown sequencer,
//! selected by phase. Readiness lines are applied between ticks through
//! [`Cluster::handle_line`]. All mutation happens through `&mut self`, so
//! the tick procedures and the decoder never interleave.

mod monitor;
mod shutdown;
mod startup;

use crate::config::{ClusterConfig, ConfigError, LaunchMode};
use crate::error::{LaunchError, SupervisorError};
use crate::events::{ClusterEvent, EventKind};
use crate::launcher::{Launcher, OutputSender};
use crate::process::ManagedProcess;
use crate::protocol::{self, Readiness};
use crate::regen::ConfigRegenerator;
use crate::roles::{ClusterPhase, ClusterSnapshot, LifecycleState, RoleKey};
use crate::sink::EventSink;
use chrono::{Days, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tick-denominated timing derived from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSettings {
    pub tick_interval: Duration,
    /// Grace period after a quit request, in ticks.
    pub stop_timeout_ticks: u64,
    /// Pause before the core engine is stopped, in ticks.
    pub drain_ticks: u64,
    pub launch_mode: LaunchMode,
}

impl ClusterSettings {
    /// Derive settings from a configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid launch time.
    pub fn from_config(config: &ClusterConfig) -> Result<Self, ConfigError> {
        let engine = &config.engine;
        Ok(Self {
            tick_interval: engine.tick_interval(),
            stop_timeout_ticks: engine.ticks_for_secs(engine.stop_timeout_secs),
            drain_ticks: engine.ticks_for_secs(engine.drain_delay_secs),
            launch_mode: config.launch.mode()?,
        })
    }
}

/// When the login gates may be launched during the current start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchGate {
    Open,
    /// Open once the tick counter reaches this value.
    AfterTick(u64),
    /// Open once local time reaches this instant.
    At(NaiveDateTime),
}

impl LaunchGate {
    /// Resolve a launch mode at cluster start.
    ///
    /// A scheduled time already past today means the same time tomorrow.
    #[must_use]
    pub fn resolve(
        mode: LaunchMode,
        start_tick: u64,
        now: NaiveDateTime,
        tick_interval: Duration,
    ) -> Self {
        match mode {
            LaunchMode::Immediate => Self::Open,
            LaunchMode::Delayed(delay) => {
                let interval = tick_interval.as_millis().max(1);
                let ticks = delay.as_millis().div_ceil(interval);
                Self::AfterTick(start_tick.saturating_add(u64::try_from(ticks).unwrap_or(u64::MAX)))
            }
            LaunchMode::Scheduled(time) => {
                let today = now.date().and_time(time);
                if today < now {
                    Self::At(today.checked_add_days(Days::new(1)).unwrap_or(today))
                } else {
                    Self::At(today)
                }
            }
        }
    }

    #[must_use]
    pub fn is_open(&self, tick: u64, now: NaiveDateTime) -> bool {
        match *self {
            Self::Open => true,
            Self::AfterTick(at) => tick >= at,
            Self::At(at) => now >= at,
        }
    }
}

impl std::fmt::Display for LaunchGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "now"),
            Self::AfterTick(tick) => write!(f, "tick {tick}"),
            Self::At(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M")),
        }
    }
}

/// Progress of the drain pause in the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainState {
    Pending,
    Waiting { until: u64 },
    Done,
}

/// The supervised cluster.
pub struct Cluster {
    config: ClusterConfig,
    settings: ClusterSettings,
    processes: Vec<ManagedProcess>,
    phase: ClusterPhase,
    tick: u64,
    launch_gate: LaunchGate,
    gate_notice_sent: bool,
    drain: DrainState,
    launcher: Arc<dyn Launcher>,
    regenerator: Box<dyn ConfigRegenerator>,
    sink: Box<dyn EventSink>,
    output: OutputSender,
}

impl Cluster {
    /// Build an idle cluster from a configuration.
    ///
    /// `output` is the sender every launched process's stdout lines go to;
    /// the receiving end must be fed back through [`Cluster::handle_line`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration.
    pub fn new(
        config: ClusterConfig,
        launcher: Arc<dyn Launcher>,
        regenerator: Box<dyn ConfigRegenerator>,
        sink: Box<dyn EventSink>,
        output: OutputSender,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let settings = ClusterSettings::from_config(&config)?;
        let processes = config.roster();

        Ok(Self {
            config,
            settings,
            processes,
            phase: ClusterPhase::Idle,
            tick: 0,
            launch_gate: LaunchGate::Open,
            gate_notice_sent: false,
            drain: DrainState::Pending,
            launcher,
            regenerator,
            sink,
            output,
        })
    }

    #[must_use]
    pub fn phase(&self) -> ClusterPhase {
        self.phase
    }

    /// Ticks elapsed since the cluster was created.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    #[must_use]
    pub fn process(&self, key: RoleKey) -> Option<&ManagedProcess> {
        self.processes.iter().find(|p| p.key() == key)
    }

    /// Records in startup order.
    #[must_use]
    pub fn processes(&self) -> &[ManagedProcess] {
        &self.processes
    }

    #[must_use]
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            phase: self.phase,
            tick: self.tick,
            processes: self.processes.iter().map(ManagedProcess::info).collect(),
        }
    }

    /// Begin a cluster start.
    ///
    /// Launch parameters and enabled flags are re-applied from the
    /// configuration, faults and restart counters are cleared, and the launch
    /// gate is resolved against `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidPhase`] unless the cluster is idle or
    /// stopped.
    pub fn start(&mut self, now: NaiveDateTime) -> Result<(), SupervisorError> {
        self.require(self.phase.can_start(), "start")?;

        for process in &mut self.processes {
            let key = process.key();
            process.apply(
                self.config.launch_spec(key),
                self.config.is_enabled(key),
                self.config.restart_on_exit(key.role),
            );
            process.reset_for_run();
        }

        self.launch_gate = LaunchGate::resolve(
            self.settings.launch_mode,
            self.tick,
            now,
            self.settings.tick_interval,
        );
        self.gate_notice_sent = false;
        self.drain = DrainState::Pending;
        self.set_phase(ClusterPhase::Starting);
        Ok(())
    }

    /// Halt startup without stopping launched processes.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidPhase`] unless the cluster is starting.
    pub fn cancel_start(&mut self) -> Result<(), SupervisorError> {
        self.require(self.phase == ClusterPhase::Starting, "cancel start")?;
        self.set_phase(ClusterPhase::StartInterrupted);
        Ok(())
    }

    /// Continue an interrupted or halted startup.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidPhase`] unless startup was
    /// interrupted or halted on a fault.
    pub fn resume_start(&mut self) -> Result<(), SupervisorError> {
        self.require(
            matches!(
                self.phase,
                ClusterPhase::StartInterrupted | ClusterPhase::Error
            ),
            "resume start",
        )?;
        self.set_phase(ClusterPhase::Starting);
        Ok(())
    }

    /// Begin an orderly shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidPhase`] if nothing is running.
    pub fn stop(&mut self) -> Result<(), SupervisorError> {
        self.require(self.phase.can_stop(), "stop")?;
        self.drain = DrainState::Pending;
        self.set_phase(ClusterPhase::Stopping);
        Ok(())
    }

    /// Abandon a shutdown and return to monitoring.
    ///
    /// Processes that already received a quit request or exited are not
    /// relaunched; use [`Cluster::restart`] for them.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidPhase`] unless the cluster is stopping.
    pub fn cancel_stop(&mut self) -> Result<(), SupervisorError> {
        self.require(self.phase == ClusterPhase::Stopping, "cancel stop")?;
        self.set_phase(ClusterPhase::Running);
        Ok(())
    }

    /// Launch a stopped process while the cluster is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster is not running, the process is
    /// unknown, disabled or not stopped, or the launch fails.
    pub fn restart(&mut self, key: RoleKey) -> Result<(), SupervisorError> {
        self.require(self.phase == ClusterPhase::Running, "restart")?;
        let idx = self.index_of(key).ok_or(SupervisorError::UnknownProcess(key))?;

        let process = &self.processes[idx];
        if !process.enabled() {
            return Err(SupervisorError::Disabled { key });
        }
        if process.state() != LifecycleState::Stopped {
            return Err(SupervisorError::InvalidState {
                operation: "restart",
                key,
                state: process.state(),
            });
        }

        self.launch(idx)?;
        Ok(())
    }

    /// Clear a spawn fault so the process can be started again.
    ///
    /// # Errors
    ///
    /// Returns an error if the process is unknown or not faulted.
    pub fn reset_faulted(&mut self, key: RoleKey) -> Result<(), SupervisorError> {
        let idx = self.index_of(key).ok_or(SupervisorError::UnknownProcess(key))?;
        let process = &mut self.processes[idx];
        if !process.reset_fault() {
            return Err(SupervisorError::InvalidState {
                operation: "reset",
                key,
                state: process.state(),
            });
        }
        debug!(process = %key, "Fault cleared");
        Ok(())
    }

    /// Replace the configuration and rebuild the roster.
    ///
    /// Only allowed while idle or stopped with no process still attached.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidPhase`] while processes are live, or
    /// a configuration error.
    pub fn reconfigure(&mut self, config: ClusterConfig) -> Result<(), SupervisorError> {
        let quiet = self.processes.iter().all(|p| !p.state().is_live());
        self.require(self.phase.can_start() && quiet, "reconfigure")?;

        config.validate()?;
        self.settings = ClusterSettings::from_config(&config)?;
        self.processes = config.roster();
        self.regenerator.reconfigure(&config);
        self.config = config;
        Ok(())
    }

    /// Advance one tick and run the procedure of the current phase.
    pub fn tick(&mut self, now: NaiveDateTime) {
        self.tick += 1;
        match self.phase {
            ClusterPhase::Starting => startup::step(self, now),
            ClusterPhase::Running => monitor::step(self),
            ClusterPhase::Stopping => shutdown::step(self),
            ClusterPhase::Idle
            | ClusterPhase::StartInterrupted
            | ClusterPhase::Stopped
            | ClusterPhase::Error => {}
        }
    }

    /// Apply one line of process output.
    pub fn handle_line(&mut self, line: &str) -> Readiness {
        let outcome = protocol::decode(&mut self.processes, line);
        match outcome {
            Readiness::Registered(key) => {
                self.emit(EventKind::Registered, Some(key), format!("launching {key}..."));
            }
            Readiness::Confirmed(key) => {
                self.emit(EventKind::Ready, Some(key), format!("{key} is running"));
            }
            Readiness::Ignored => {}
        }
        outcome
    }

    fn require(&self, allowed: bool, operation: &'static str) -> Result<(), SupervisorError> {
        if allowed {
            Ok(())
        } else {
            Err(SupervisorError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn index_of(&self, key: RoleKey) -> Option<usize> {
        self.processes.iter().position(|p| p.key() == key)
    }

    fn set_phase(&mut self, phase: ClusterPhase) {
        if self.phase == phase {
            return;
        }
        let event = ClusterEvent::phase(self.tick, self.phase, phase);
        self.phase = phase;
        self.sink.emit(&event);
    }

    fn emit(&self, kind: EventKind, key: Option<RoleKey>, message: String) {
        let mut event = ClusterEvent::new(kind, self.tick).with_message(message);
        event.key = key;
        self.sink.emit(&event);
    }

    /// Rewrite the instance configuration of a gate before it is launched.
    ///
    /// A failure is reported and the launch goes ahead with the old file.
    fn regenerate(&self, key: RoleKey) {
        if !key.role.is_multi_instance() {
            return;
        }
        if let Err(e) = self.regenerator.regenerate(key) {
            self.emit(EventKind::RegenFailed, Some(key), e.to_string());
        }
    }

    fn launch(&mut self, idx: usize) -> Result<(), LaunchError> {
        let key = self.processes[idx].key();
        self.regenerate(key);

        let result = self.processes[idx].start(self.launcher.as_ref(), self.output.clone());
        match &result {
            Ok(()) => {
                let pid = self.processes[idx]
                    .pid()
                    .map(|pid| format!(" (pid {pid})"))
                    .unwrap_or_default();
                self.emit(EventKind::Launched, Some(key), format!("starting {key}{pid}"));
            }
            Err(e) => self.emit(EventKind::SpawnFailed, Some(key), e.to_string()),
        }
        result
    }

    fn relaunch(&mut self, idx: usize) {
        let key = self.processes[idx].key();
        self.regenerate(key);

        match self.processes[idx].restart(self.launcher.as_ref(), self.output.clone()) {
            Ok(()) => {
                let count = self.processes[idx].restart_count();
                self.emit(
                    EventKind::Restarted,
                    Some(key),
                    format!("{key} restarted after crash (restart #{count})"),
                );
            }
            Err(e) => self.emit(EventKind::SpawnFailed, Some(key), e.to_string()),
        }
    }

    /// Indices of the records of `role`, in instance order.
    fn indices_of(&self, role: crate::roles::Role) -> Vec<usize> {
        self.processes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.key().role == role)
            .map(|(idx, _)| idx)
            .collect()
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("phase", &self.phase)
            .field("tick", &self.tick)
            .field("processes", &self.processes)
            .field("launch_gate", &self.launch_gate)
            .field("drain", &self.drain)
            .finish_non_exhaustive()
    }
}

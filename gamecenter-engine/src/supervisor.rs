//! The supervisor loop.
//!
//! A [`Supervisor`] owns the [`Cluster`] and drives it from a single tokio
//! task: operator commands, process output lines and timer ticks are
//! multiplexed with `select!`, so every mutation of the cluster is
//! serialized. A cloneable [`SupervisorHandle`] sends commands, watches the
//! phase and subscribes to events.
//!
//! Cancelling the supervisor stops the loop but leaves managed processes
//! running.

use crate::cluster::Cluster;
use crate::config::{ClusterConfig, ConfigError};
use crate::error::SupervisorError;
use crate::events::ClusterEvent;
use crate::launcher::Launcher;
use crate::regen::ConfigRegenerator;
use crate::roles::{ClusterPhase, ClusterSnapshot, RoleKey};
use crate::sink::{BroadcastSink, EventSink, EventSinks};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Capacity of the operator command queue.
const COMMAND_BUFFER: usize = 32;

/// Events buffered per lagging subscriber.
const EVENT_BUFFER: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, SupervisorError>>;

enum Command {
    Start(Reply<()>),
    CancelStart(Reply<()>),
    ResumeStart(Reply<()>),
    Stop(Reply<()>),
    CancelStop(Reply<()>),
    Restart(RoleKey, Reply<()>),
    ResetFaulted(RoleKey, Reply<()>),
    Reconfigure(Box<ClusterConfig>, Reply<()>),
    Snapshot(Reply<ClusterSnapshot>),
}

/// Drives a cluster on one task.
pub struct Supervisor {
    cluster: Cluster,
    commands: mpsc::Receiver<Command>,
    output: mpsc::UnboundedReceiver<String>,
    phase: watch::Sender<ClusterPhase>,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Build a supervisor and its handle.
    ///
    /// Events go to `sink` and to the handle's subscribers.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration does not validate.
    pub fn new(
        config: ClusterConfig,
        launcher: Arc<dyn Launcher>,
        regenerator: Box<dyn ConfigRegenerator>,
        sink: Box<dyn EventSink>,
    ) -> Result<(Self, SupervisorHandle), ConfigError> {
        let events = BroadcastSink::new(EVENT_BUFFER);
        let mut sinks = EventSinks::new();
        sinks.push(sink);
        sinks.push(Box::new(events.clone()));

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let cluster = Cluster::new(config, launcher, regenerator, Box::new(sinks), output_tx)?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (phase_tx, phase_rx) = watch::channel(cluster.phase());
        let cancel = CancellationToken::new();

        let supervisor = Self {
            cluster,
            commands: command_rx,
            output: output_rx,
            phase: phase_tx,
            cancel: cancel.clone(),
        };
        let handle = SupervisorHandle {
            commands: command_tx,
            phase: phase_rx,
            events,
            cancel,
        };
        Ok((supervisor, handle))
    }

    /// Run until [`SupervisorHandle::shutdown`] is called.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.cluster.settings().tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = millis(self.cluster.settings().tick_interval),
            "Supervisor started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    info!("Supervisor stopping; managed processes are left running");
                    break;
                }
                Some(command) = self.commands.recv() => {
                    self.handle_command(command);
                }
                Some(line) = self.output.recv() => {
                    self.cluster.handle_line(&line);
                }
                _ = ticker.tick() => {
                    self.cluster.tick(Local::now().naive_local());
                }
            }

            self.publish_phase();
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.cluster.start(Local::now().naive_local()));
            }
            Command::CancelStart(reply) => {
                let _ = reply.send(self.cluster.cancel_start());
            }
            Command::ResumeStart(reply) => {
                let _ = reply.send(self.cluster.resume_start());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.cluster.stop());
            }
            Command::CancelStop(reply) => {
                let _ = reply.send(self.cluster.cancel_stop());
            }
            Command::Restart(key, reply) => {
                let _ = reply.send(self.cluster.restart(key));
            }
            Command::ResetFaulted(key, reply) => {
                let _ = reply.send(self.cluster.reset_faulted(key));
            }
            Command::Reconfigure(config, reply) => {
                let _ = reply.send(self.cluster.reconfigure(*config));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(Ok(self.cluster.snapshot()));
            }
        }
    }

    fn publish_phase(&self) {
        let phase = self.cluster.phase();
        self.phase.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                debug!(%phase, "Phase published");
                *current = phase;
                true
            }
        });
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Cloneable control handle for a running [`Supervisor`].
#[derive(Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    phase: watch::Receiver<ClusterPhase>,
    events: BroadcastSink,
    cancel: CancellationToken,
}

impl SupervisorHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SupervisorError::ChannelClosed)?;
        rx.await.map_err(|_| SupervisorError::ChannelClosed)?
    }

    /// Start the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster is not idle or stopped, or the
    /// supervisor is gone.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        self.request(Command::Start).await
    }

    /// Interrupt startup, leaving launched processes running.
    ///
    /// # Errors
    ///
    /// Returns an error unless the cluster is starting.
    pub async fn cancel_start(&self) -> Result<(), SupervisorError> {
        self.request(Command::CancelStart).await
    }

    /// Continue an interrupted or faulted startup.
    ///
    /// # Errors
    ///
    /// Returns an error unless startup was interrupted or halted.
    pub async fn resume_start(&self) -> Result<(), SupervisorError> {
        self.request(Command::ResumeStart).await
    }

    /// Begin an orderly shutdown of the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to stop.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        self.request(Command::Stop).await
    }

    /// Abandon a shutdown in progress.
    ///
    /// # Errors
    ///
    /// Returns an error unless the cluster is stopping.
    pub async fn cancel_stop(&self) -> Result<(), SupervisorError> {
        self.request(Command::CancelStop).await
    }

    /// Launch a stopped process while the cluster is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be restarted now.
    pub async fn restart(&self, key: RoleKey) -> Result<(), SupervisorError> {
        self.request(|reply| Command::Restart(key, reply)).await
    }

    /// Clear a spawn fault.
    ///
    /// # Errors
    ///
    /// Returns an error if the process is not faulted.
    pub async fn reset_faulted(&self, key: RoleKey) -> Result<(), SupervisorError> {
        self.request(|reply| Command::ResetFaulted(key, reply)).await
    }

    /// Replace the configuration while the cluster is idle or stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if processes are live or the configuration is invalid.
    pub async fn reconfigure(&self, config: ClusterConfig) -> Result<(), SupervisorError> {
        self.request(|reply| Command::Reconfigure(Box::new(config), reply))
            .await
    }

    /// Current state of every managed process.
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor is gone.
    pub async fn snapshot(&self) -> Result<ClusterSnapshot, SupervisorError> {
        self.request(Command::Snapshot).await
    }

    /// Last published phase.
    #[must_use]
    pub fn phase(&self) -> ClusterPhase {
        *self.phase.borrow()
    }

    /// Wait until the cluster reaches `phase`.
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor stops first.
    pub async fn wait_for_phase(&self, phase: ClusterPhase) -> Result<(), SupervisorError> {
        let mut rx = self.phase.clone();
        rx.wait_for(|current| *current == phase)
            .await
            .map(|_| ())
            .map_err(|_| SupervisorError::ChannelClosed)
    }

    /// Receive events emitted from now on.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClusterEvent> {
        self.events.subscribe()
    }

    /// Stop the supervisor loop. Managed processes keep running.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("phase", &self.phase())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

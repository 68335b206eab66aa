//! One supervised process: its launch parameters, lifecycle state, readiness
//! token and OS handle.

use crate::error::LaunchError;
use crate::launcher::{LaunchSpec, Launcher, OutputSender, ProcessHandle};
use crate::roles::{LifecycleState, ProcessInfo, RoleKey};
use tracing::{debug, warn};

/// A managed process record.
///
/// The state machine is:
///
/// ```text
/// Stopped -> Launching -> AwaitingReady -> Running -> Stopping -> Stopped
///               |                                        ^
///               +--> Faulted (spawn failed)              | (exit observed
///                                                        |  or force kill)
/// ```
pub struct ManagedProcess {
    spec: LaunchSpec,
    enabled: bool,
    restart_on_exit: bool,
    state: LifecycleState,
    token: Option<String>,
    previous_token: Option<String>,
    handle: Option<Box<dyn ProcessHandle>>,
    quit_tick: Option<u64>,
    early_exit_seen: bool,
    restart_count: u32,
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("key", &self.spec.key)
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .field("token", &self.token)
            .field("pid", &self.pid())
            .field("quit_tick", &self.quit_tick)
            .field("restart_count", &self.restart_count)
            .finish_non_exhaustive()
    }
}

impl ManagedProcess {
    /// Create a stopped record.
    #[must_use]
    pub fn new(spec: LaunchSpec, enabled: bool, restart_on_exit: bool) -> Self {
        Self {
            spec,
            enabled,
            restart_on_exit,
            state: LifecycleState::Stopped,
            token: None,
            previous_token: None,
            handle: None,
            quit_tick: None,
            early_exit_seen: false,
            restart_count: 0,
        }
    }

    #[must_use]
    pub fn key(&self) -> RoleKey {
        self.spec.key
    }

    #[must_use]
    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn restart_on_exit(&self) -> bool {
        self.restart_on_exit
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Token recorded from the first readiness line of this launch.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Token of the previous launch. Lines carrying it are stale.
    #[must_use]
    pub fn previous_token(&self) -> Option<&str> {
        self.previous_token.as_deref()
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.pid())
    }

    #[must_use]
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Launch the process.
    ///
    /// Only a stopped record can be started. On a spawn failure the record
    /// becomes `Faulted` and stays there until reset.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::InvalidState`] if the record is not stopped, or
    /// the launcher's error.
    pub fn start(
        &mut self,
        launcher: &dyn Launcher,
        output: OutputSender,
    ) -> Result<(), LaunchError> {
        if self.state != LifecycleState::Stopped {
            return Err(LaunchError::InvalidState {
                key: self.spec.key,
                state: self.state,
            });
        }

        self.state = LifecycleState::Launching;
        if let Some(token) = self.token.take() {
            self.previous_token = Some(token);
        }
        self.quit_tick = None;
        self.early_exit_seen = false;

        match launcher.launch(&self.spec, output) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = LifecycleState::AwaitingReady;
                Ok(())
            }
            Err(e) => {
                self.handle = None;
                self.state = LifecycleState::Faulted;
                Err(e)
            }
        }
    }

    /// Non-blocking liveness probe. A record without a handle is dead.
    pub fn is_alive(&mut self) -> bool {
        self.handle.as_mut().is_some_and(|h| h.is_alive())
    }

    /// Whether the process died before confirming readiness, reported once
    /// per launch.
    pub fn take_early_exit(&mut self) -> bool {
        if self.early_exit_seen || !self.state.is_pending() || self.is_alive() {
            return false;
        }
        self.early_exit_seen = true;
        true
    }

    /// Record the token of the first readiness line.
    pub fn register(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    /// Mark the process confirmed ready.
    pub fn confirm(&mut self) {
        self.state = LifecycleState::Running;
    }

    /// Ask the process to quit and start its grace period at `tick`.
    ///
    /// The record moves to `Stopping` even if delivery fails, so the grace
    /// timeout still applies.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of a failed delivery.
    pub fn request_stop(&mut self, tick: u64) -> std::io::Result<()> {
        self.state = LifecycleState::Stopping;
        self.quit_tick = Some(tick);
        match self.handle.as_mut() {
            Some(handle) => handle.request_quit(),
            None => Ok(()),
        }
    }

    /// Whether more than `timeout` ticks have passed since the quit request.
    #[must_use]
    pub fn grace_elapsed(&self, tick: u64, timeout: u64) -> bool {
        self.quit_tick
            .is_some_and(|quit| tick.saturating_sub(quit) > timeout)
    }

    /// Kill the process and mark it stopped.
    pub fn force_kill(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.kill() {
                warn!(process = %self.spec.key, "Failed to kill process: {e}");
            }
        }
        self.mark_stopped();
    }

    /// Mark the record stopped and release the handle.
    pub fn mark_stopped(&mut self) {
        self.handle = None;
        self.quit_tick = None;
        self.state = LifecycleState::Stopped;
    }

    /// Relaunch after an observed crash.
    ///
    /// # Errors
    ///
    /// Returns the launch error; the record is then `Faulted`.
    pub fn restart(
        &mut self,
        launcher: &dyn Launcher,
        output: OutputSender,
    ) -> Result<(), LaunchError> {
        self.mark_stopped();
        self.restart_count += 1;
        self.start(launcher, output)
    }

    /// Clear a spawn fault so the record can be started again.
    ///
    /// Returns whether the record was faulted.
    pub fn reset_fault(&mut self) -> bool {
        if self.state == LifecycleState::Faulted {
            debug!(process = %self.spec.key, "Clearing fault");
            self.state = LifecycleState::Stopped;
            true
        } else {
            false
        }
    }

    /// Clear per-run counters at a cluster start.
    pub fn reset_for_run(&mut self) {
        self.reset_fault();
        self.restart_count = 0;
    }

    /// Replace the launch parameters and flags. Takes effect on next start.
    pub fn apply(&mut self, spec: LaunchSpec, enabled: bool, restart_on_exit: bool) {
        self.spec = spec;
        self.enabled = enabled;
        self.restart_on_exit = restart_on_exit;
    }

    /// Point-in-time view of this record.
    #[must_use]
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            key: self.spec.key,
            enabled: self.enabled,
            state: self.state,
            pid: self.pid(),
            registered: self.token.is_some(),
            restart_count: self.restart_count,
        }
    }
}

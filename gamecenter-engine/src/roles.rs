//! Role keys, lifecycle states and snapshot types.
//!
//! These types describe the per-process state model shared by the startup
//! sequencer, the health monitor and the shutdown sequencer.

use serde::{Deserialize, Serialize};

pub use gamecenter_client::Role;

/// Identifies one supervised process: a role plus an instance index.
///
/// Single-instance roles always use index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleKey {
    /// The role this process plays.
    pub role: Role,
    /// Zero-based instance index within the role.
    pub index: usize,
}

impl RoleKey {
    /// Key for a role instance.
    #[must_use]
    pub const fn new(role: Role, index: usize) -> Self {
        Self { role, index }
    }

    /// Key for a single-instance role.
    #[must_use]
    pub const fn single(role: Role) -> Self {
        Self { role, index: 0 }
    }
}

impl std::fmt::Display for RoleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.role.is_multi_instance() {
            write!(f, "{}[{}]", self.role, self.index + 1)
        } else {
            write!(f, "{}", self.role)
        }
    }
}

/// The lifecycle state of one managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not running; ready to be started.
    Stopped,
    /// Spawn in progress.
    Launching,
    /// Spawned; waiting for the readiness confirmation.
    AwaitingReady,
    /// Confirmed ready.
    Running,
    /// Quit requested; waiting for exit or the grace timeout.
    Stopping,
    /// Spawn failed; needs operator action before it is started again.
    Faulted,
}

impl LifecycleState {
    /// Whether the process has been launched but not yet confirmed.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Launching | Self::AwaitingReady)
    }

    /// Whether the process is in a state where it is expected to be alive.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Self::Launching | Self::AwaitingReady | Self::Running | Self::Stopping
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Launching => write!(f, "Launching"),
            Self::AwaitingReady => write!(f, "AwaitingReady"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Faulted => write!(f, "Faulted"),
        }
    }
}

/// The supervisory phase of the whole cluster.
///
/// Exactly one of the startup sequencer, the health monitor and the
/// shutdown sequencer is driven per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterPhase {
    /// Never started.
    Idle,
    /// Startup sequencer active.
    Starting,
    /// Startup cancelled by the operator; launched processes keep running.
    StartInterrupted,
    /// Health monitor active.
    Running,
    /// Shutdown sequencer active.
    Stopping,
    /// Every process stopped.
    Stopped,
    /// Startup halted on a faulted role.
    Error,
}

impl ClusterPhase {
    /// Whether a new start may be issued from this phase.
    #[must_use]
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    /// Whether a stop may be issued from this phase.
    #[must_use]
    pub fn can_stop(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::StartInterrupted | Self::Running | Self::Error
        )
    }
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Starting => write!(f, "Starting"),
            Self::StartInterrupted => write!(f, "StartInterrupted"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Point-in-time view of one managed process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Which process this is.
    pub key: RoleKey,

    /// Whether the role takes part in the current run.
    pub enabled: bool,

    /// Current lifecycle state.
    pub state: LifecycleState,

    /// Process ID while a process is attached.
    pub pid: Option<u32>,

    /// Whether the first readiness line of this launch has arrived.
    pub registered: bool,

    /// Crash restarts performed by the health monitor since the cluster start.
    pub restart_count: u32,
}

impl ProcessInfo {
    /// Check if this process is confirmed running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }
}

/// Point-in-time view of the whole cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Current phase.
    pub phase: ClusterPhase,
    /// Current tick counter.
    pub tick: u64,
    /// Every managed process in startup order.
    pub processes: Vec<ProcessInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_key_display() {
        assert_eq!(RoleKey::single(Role::Database).to_string(), "database server");
        assert_eq!(RoleKey::new(Role::RelayGate, 0).to_string(), "relay gate[1]");
        assert_eq!(RoleKey::new(Role::LoginGate, 1).to_string(), "login gate[2]");
    }

    #[test]
    fn test_lifecycle_predicates() {
        assert!(LifecycleState::Launching.is_pending());
        assert!(LifecycleState::AwaitingReady.is_pending());
        assert!(!LifecycleState::Running.is_pending());

        assert!(LifecycleState::Stopping.is_live());
        assert!(!LifecycleState::Stopped.is_live());
        assert!(!LifecycleState::Faulted.is_live());
    }

    #[test]
    fn test_phase_transitions_allowed() {
        assert!(ClusterPhase::Idle.can_start());
        assert!(ClusterPhase::Stopped.can_start());
        assert!(!ClusterPhase::Running.can_start());

        assert!(ClusterPhase::StartInterrupted.can_stop());
        assert!(ClusterPhase::Error.can_stop());
        assert!(!ClusterPhase::Stopping.can_stop());
        assert!(!ClusterPhase::Idle.can_stop());
    }
}

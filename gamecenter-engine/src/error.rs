//! Error types for the gamecenter supervisor.

use crate::roles::{ClusterPhase, LifecycleState, RoleKey};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised when a managed process cannot be launched.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Executable directory for {key} does not exist: {}", path.display())]
    MissingDirectory { key: RoleKey, path: PathBuf },

    #[error("Failed to spawn {key} ({}): {source}", program.display())]
    Spawn {
        key: RoleKey,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot start {key} while it is {state}")]
    InvalidState { key: RoleKey, state: LifecycleState },
}

/// Errors raised while regenerating a per-instance configuration file.
#[derive(Debug, Error)]
pub enum RegenError {
    #[error("I/O error writing configuration for {key}: {source}")]
    Io {
        key: RoleKey,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration for {key}: {source}")]
    Serialize {
        key: RoleKey,
        #[source]
        source: toml::ser::Error,
    },

    #[error("No {setting} configured for {key}")]
    MissingSetting { key: RoleKey, setting: &'static str },

    #[error("{0} has no instance configuration")]
    NotAGate(RoleKey),
}

/// Errors returned by operator commands.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Cannot {operation} while the cluster is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: ClusterPhase,
    },

    #[error("Unknown process: {0}")]
    UnknownProcess(RoleKey),

    #[error("{key} is disabled")]
    Disabled { key: RoleKey },

    #[error("Cannot {operation} {key} while it is {state}")]
    InvalidState {
        operation: &'static str,
        key: RoleKey,
        state: LifecycleState,
    },

    #[error("Failed to launch: {0}")]
    Launch(#[from] LaunchError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Supervisor is no longer running")]
    ChannelClosed,
}

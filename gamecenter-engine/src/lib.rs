//! Game Center Engine - supervisor for a local game-server cluster.
//!
//! The engine launches the cluster's server programs in dependency order,
//! waits for each one to announce readiness on stdout, restarts processes
//! that crash and shuts everything down in reverse order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Supervisor task                           │
//! │   commands ──┐                                                   │
//! │   stdout  ───┼──▶ Cluster ──▶ startup │ monitor │ shutdown       │
//! │   ticker  ───┘       │                                           │
//! │                      ├──▶ Launcher (spawn, quit, kill)           │
//! │                      ├──▶ ConfigRegenerator (gate.toml)          │
//! │                      └──▶ EventSink (tracing, JSON log, watchers)│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Launch order: database, auth, logging, core engine, relay gates,
//! selector gates, login gates, plugin.

pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod launcher;
pub mod process;
pub mod protocol;
pub mod regen;
pub mod roles;
pub mod sink;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use cluster::{Cluster, ClusterSettings, LaunchGate};
pub use config::{ClusterConfig, ConfigError, LaunchMode};
pub use error::{LaunchError, RegenError, SupervisorError};
pub use events::{ClusterEvent, EventKind, EventLevel};
pub use launcher::{LaunchSpec, Launcher, ProcessHandle, QuitSignal, TokioLauncher};
pub use regen::{ConfigRegenerator, NoopRegenerator, TomlInstanceWriter};
pub use roles::{ClusterPhase, ClusterSnapshot, LifecycleState, ProcessInfo, Role, RoleKey};
pub use sink::{BroadcastSink, EventSink, EventSinks, JsonEventLog, TracingSink};
pub use supervisor::{Supervisor, SupervisorHandle};

//! Observational events emitted by the supervisor.
//!
//! Every state transition and failure becomes one [`ClusterEvent`] carrying a
//! short human-readable message. Presentation is left to the sinks.

use crate::roles::{ClusterPhase, RoleKey};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PhaseChanged,
    Launched,
    Registered,
    Ready,
    Restarted,
    Exited,
    ExitedBeforeReady,
    QuitSent,
    QuitFailed,
    Stopped,
    ForcedStop,
    DrainStarted,
    LaunchGateWaiting,
    SpawnFailed,
    RegenFailed,
}

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventKind {
    /// Severity implied by the kind.
    #[must_use]
    pub fn level(self) -> EventLevel {
        match self {
            Self::SpawnFailed | Self::RegenFailed => EventLevel::Error,
            Self::ForcedStop | Self::QuitFailed | Self::Exited | Self::ExitedBeforeReady => {
                EventLevel::Warn
            }
            _ => EventLevel::Info,
        }
    }
}

/// One observational event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEvent {
    /// Tick at which the event happened.
    pub tick: u64,

    /// Wall-clock time (Unix ms).
    pub timestamp_ms: u64,

    pub level: EventLevel,

    pub kind: EventKind,

    /// Process the event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<RoleKey>,

    /// Human-readable line.
    pub message: String,
}

impl ClusterEvent {
    /// Create an event with an explicit timestamp.
    ///
    /// This is a pure function suitable for testing.
    #[must_use]
    pub fn new_with_timestamp(kind: EventKind, tick: u64, timestamp_ms: u64) -> Self {
        Self {
            tick,
            timestamp_ms,
            level: kind.level(),
            kind,
            key: None,
            message: String::new(),
        }
    }

    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind, tick: u64) -> Self {
        Self::new_with_timestamp(kind, tick, current_timestamp_ms())
    }

    /// Attach the process this event concerns.
    #[must_use]
    pub fn for_process(mut self, key: RoleKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Set the message line.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Phase change notice.
    #[must_use]
    pub fn phase(tick: u64, from: ClusterPhase, to: ClusterPhase) -> Self {
        Self::new(EventKind::PhaseChanged, tick).with_message(format!("cluster {from} -> {to}"))
    }

    /// Whether the operator must be notified explicitly, beyond logging.
    #[must_use]
    pub fn is_escalated(&self) -> bool {
        matches!(self.kind, EventKind::SpawnFailed | EventKind::RegenFailed)
    }
}

impl std::fmt::Display for ClusterEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.tick, self.message)
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

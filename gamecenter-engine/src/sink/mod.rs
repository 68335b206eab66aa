//! Event sinks.
//!
//! The supervisor hands every [`ClusterEvent`] to one [`EventSink`]. Three
//! sinks are provided:
//! - [`TracingSink`] logs events through `tracing`
//! - [`JsonEventLog`] appends events to a JSON-lines file per day
//! - [`BroadcastSink`] forwards events to live subscribers

pub mod json_log;

pub use json_log::JsonEventLog;

use crate::events::{ClusterEvent, EventLevel};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Event sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Receives observational events.
///
/// Emitting never fails the caller; sinks log their own errors.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ClusterEvent);
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&self, event: &ClusterEvent) {
        (**self).emit(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn emit(&self, event: &ClusterEvent) {
        (**self).emit(event);
    }
}

/// Logs events through `tracing` at the level of the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ClusterEvent) {
        let process = event.key.map(|k| k.to_string()).unwrap_or_default();
        match event.level {
            EventLevel::Info => info!(tick = event.tick, kind = ?event.kind, %process, "{}", event.message),
            EventLevel::Warn => warn!(tick = event.tick, kind = ?event.kind, %process, "{}", event.message),
            EventLevel::Error => error!(tick = event.tick, kind = ?event.kind, %process, "{}", event.message),
        }
    }
}

/// Forwards events to `tokio::sync::broadcast` subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ClusterEvent>,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` events per lagging subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: &ClusterEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
    }
}

/// Fans each event out to several sinks in order.
#[derive(Default)]
pub struct EventSinks {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventSinks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for EventSinks {
    fn emit(&self, event: &ClusterEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

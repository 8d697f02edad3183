//! Lifecycle events emitted by the resilience components.
//!
//! # Responsibilities
//! - Define the event names and payload shared by breaker and retry
//! - Provide the sink capability components are constructed with
//!
//! # Design Decisions
//! - Fire-and-forget: `emit` never blocks and never fails the caller
//! - Sinks are injected as `Arc<dyn EventSink>`, not a global bus
//! - Payload carries counters and error text only, never secrets

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Named lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "circuit.open")]
    CircuitOpen,
    #[serde(rename = "circuit.half-open")]
    CircuitHalfOpen,
    #[serde(rename = "circuit.close")]
    CircuitClose,
    #[serde(rename = "retry.success")]
    RetrySuccess,
    #[serde(rename = "retry.failure")]
    RetryFailure,
}

impl EventKind {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::CircuitOpen => "circuit.open",
            EventKind::CircuitHalfOpen => "circuit.half-open",
            EventKind::CircuitClose => "circuit.close",
            EventKind::RetrySuccess => "retry.success",
            EventKind::RetryFailure => "retry.failure",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload delivered to an [`EventSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    /// Breaker name or retry label that produced the event.
    pub source: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, source: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            kind,
            source: source.into(),
            timestamp_ms,
            failure_count: None,
            attempts: None,
            error: None,
        }
    }

    pub fn with_failure_count(mut self, count: u32) -> Self {
        self.failure_count = Some(count);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Receiver of lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: LifecycleEvent) {}
}

/// Writes each event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LifecycleEvent) {
        tracing::info!(
            event = %event.kind,
            source = %event.source,
            failure_count = ?event.failure_count,
            attempts = ?event.attempts,
            error = ?event.error,
            "Lifecycle event"
        );
    }
}

/// Forwards events into an unbounded tokio channel.
///
/// A closed receiver silently drops events.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event);
    }
}

/// Delivers each event to several sinks in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: LifecycleEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

/// Drain every event currently buffered in a channel receiver.
///
/// Convenience for tests and for batch forwarding.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(EventKind::CircuitOpen.name(), "circuit.open");
        assert_eq!(EventKind::CircuitHalfOpen.name(), "circuit.half-open");
        assert_eq!(EventKind::RetryFailure.to_string(), "retry.failure");
    }

    #[test]
    fn test_event_serializes_with_wire_name() {
        let event = LifecycleEvent::new(EventKind::CircuitOpen, "license-api").with_failure_count(3);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "circuit.open");
        assert_eq!(json["failure_count"], 3);
        assert!(json.get("attempts").is_none());
        assert!(event.timestamp_ms > 0);
    }

    #[test]
    fn test_fanout_delivers_to_every_sink() {
        let (a, mut rx_a) = ChannelSink::new();
        let (b, mut rx_b) = ChannelSink::new();
        let fanout = FanoutSink::new(vec![Arc::new(a), Arc::new(b)]);

        fanout.emit(LifecycleEvent::new(EventKind::RetrySuccess, "op").with_attempts(2));

        assert_eq!(drain(&mut rx_a).len(), 1);
        let events = drain(&mut rx_b);
        assert_eq!(events[0].attempts, Some(2));
    }

    #[test]
    fn test_channel_sink_tolerates_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(LifecycleEvent::new(EventKind::CircuitClose, "x"));
    }
}

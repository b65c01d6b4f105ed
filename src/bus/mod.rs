//! The `bus` module is the in-process publish/subscribe seam between event
//! producers (alert creation, radar ingestion, the AI scan loop) and the
//! delivery fan-out engine.
//!
//! Producers call [`EventBus::publish`] without knowing who, if anyone, is
//! listening; exactly one consumer (the fan-out engine) drains the matching
//! [`EventReceiver`]. The channel is unbounded so a slow delivery pass never
//! blocks a producer, and events from a single producer reach the consumer
//! in publication order. No cross-producer ordering is guaranteed.

pub mod event;

use tokio::sync::mpsc;
use tracing::warn;

use event::Event;

/// Cloneable publishing handle. Every producer holds one.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<Event>,
}

/// The consuming end, owned by the fan-out engine.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

impl EventBus {
    /// Create a bus and its single consumer end.
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Fire-and-forget publish. Never blocks; if the consumer is gone the
    /// event is dropped and logged, never surfaced to the producer.
    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            warn!("event bus consumer gone, dropping event");
        }
    }
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hub::registry::ConnectionId;

/// Type discriminator carried in the outbound envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Hello,
    NewAlert,
    AlertUpdated,
    RadarDetection,
    AiInsight,
    ThreatDetected,
    AnomalyDetected,
    ThreatUpdate,
    SystemStatus,
    MapViewUpdated,
}

/// Which connections an event is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Members of a single room.
    Room(String),
    /// Union of several rooms' members.
    Rooms(Vec<String>),
    /// Every registered connection.
    All,
}

/// Target of an event: a scope plus an exclusion set.
///
/// The exclusion set is part of the target, not something the fan-out engine
/// infers; producers of echo-prone events (a connection updating its own map
/// view) exclude the originating connection here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scope: Scope,
    pub exclude: HashSet<ConnectionId>,
}

impl Target {
    pub fn room(name: impl Into<String>) -> Self {
        Self {
            scope: Scope::Room(name.into()),
            exclude: HashSet::new(),
        }
    }

    pub fn rooms<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope: Scope::Rooms(names.into_iter().map(Into::into).collect()),
            exclude: HashSet::new(),
        }
    }

    pub fn all() -> Self {
        Self {
            scope: Scope::All,
            exclude: HashSet::new(),
        }
    }

    /// Add a connection to the exclusion set (echo-loop avoidance).
    pub fn excluding(mut self, id: ConnectionId) -> Self {
        self.exclude.insert(id);
        self
    }
}

/// An immutable, timestamped, typed message. Produced once, delivered
/// at-most-once per connection; a disconnected observer misses events raised
/// while absent (no persistence, no replay).
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: i64,
    pub target: Target,
}

impl Event {
    pub fn new(kind: EventKind, payload: Value, target: Target) -> Self {
        Self {
            kind,
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
            target,
        }
    }

    /// The wire form sent to every recipient of this event.
    pub fn envelope(&self) -> Envelope {
        Envelope {
            kind: self.kind,
            data: self.payload.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Outbound message envelope: `{type, data, timestamp}` for all delivered
/// events. Serialization is lossless for strings, numbers, nested objects
/// and timestamps, so a client deserializing the envelope recovers exactly
/// what was published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: i64,
}

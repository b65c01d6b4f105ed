use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

pub type ConnectionId = String;

/// Role claim carried by a connection's identity. Determines which rooms the
/// connection is placed in at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Operator,
    User,
}

/// Identity claims obtained once at handshake from the external
/// authentication collaborator. Never re-validated and never mutated for the
/// lifetime of the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// One accepted transport-level session.
///
/// `rooms` mirrors the router's member sets; the two are kept consistent by
/// the hub, which is the only writer of either. The liveness flag defaults
/// to true, is cleared when a probe goes out and set again by any liveness
/// response.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    pub rooms: HashSet<String>,
    pub last_seen: i64,
    pub alive: bool,
    pub sender: UnboundedSender<WsMessage>,
    pub alert_filters: Option<Value>,
    pub threat_filters: Option<Value>,
    pub map_view: Value,
}

impl Connection {
    pub fn new(identity: Identity, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("conn-{}", Uuid::new_v4()),
            identity,
            rooms: HashSet::new(),
            last_seen: chrono::Utc::now().timestamp_millis(),
            alive: true,
            sender,
            alert_filters: None,
            threat_filters: None,
            map_view: default_map_view(),
        }
    }
}

/// Initial map viewport for every map observer.
pub fn default_map_view() -> Value {
    json!({
        "center": {"lat": 40.7128, "lng": -74.0060},
        "zoom": 13,
        "layers": {
            "radar": true,
            "cameras": true,
            "sensors": true,
            "threats": true,
            "zones": true,
        },
    })
}

/// Tracks every live connection. All mutation happens under the hub's lock;
/// operations on an already-removed connection ID are silently ignored since
/// cleanup races are expected under concurrent disconnects.
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a new live connection; it is immediately visible to the
    /// liveness and delivery subsystems.
    pub fn register(&mut self, connection: Connection) -> ConnectionId {
        let id = connection.id.clone();
        self.connections.insert(id.clone(), connection);
        id
    }

    pub fn get(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    /// Idempotent removal. The first of {transport close, liveness eviction,
    /// send-failure handler} to observe a dead connection wins; later
    /// observers see `None` and skip duplicate cleanup.
    pub fn remove(&mut self, id: &str) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn mark_alive(&mut self, id: &str) {
        if let Some(conn) = self.connections.get_mut(id) {
            conn.alive = true;
            conn.last_seen = chrono::Utc::now().timestamp_millis();
        }
    }

    pub fn mark_pending(&mut self, id: &str) {
        if let Some(conn) = self.connections.get_mut(id) {
            conn.alive = false;
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }
}

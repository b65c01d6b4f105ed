//! The `hub` module owns the only shared mutable state in the system: the
//! connection registry and the room router. One `Hub` instance is constructed
//! explicitly at startup and handed (as `Arc<Mutex<Hub>>`) to the transport,
//! the liveness monitor and the fan-out engine; there are no module-level
//! singletons, so tests build independent instances freely.
//!
//! The hub's lock is held only for map mutation and channel sends (which
//! never block); actual socket I/O lives in per-connection send tasks.

pub mod liveness;
pub mod registry;
pub mod rooms;

use serde::Serialize;
use tracing::{debug, info};
use tungstenite::protocol::Message as WsMessage;

use crate::bus::event::{Envelope, Scope, Target};
use registry::{Connection, ConnectionId, Registry};
use rooms::RoomRouter;

/// Result of a single delivery attempt to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// The connection raced a disconnect between snapshot and send; skipped
    /// silently.
    Absent,
    /// The transport-side channel is closed; the caller should treat this as
    /// an immediate disconnect signal and evict.
    Failed,
}

#[derive(Debug)]
pub struct Hub {
    pub registry: Registry,
    pub router: RoomRouter,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            router: RoomRouter::new(),
        }
    }

    /// Register an accepted connection and return its ID.
    pub fn register(&mut self, connection: Connection) -> ConnectionId {
        let user = connection.identity.name.clone();
        let id = self.registry.register(connection);
        info!("connection registered: {user} ({id})");
        id
    }

    /// Place a connection in its role-derived default rooms. Called once,
    /// right after registration.
    pub fn join_default_rooms(&mut self, id: &ConnectionId) {
        let role = match self.registry.get(id) {
            Some(conn) => conn.identity.role,
            None => return,
        };
        for room in rooms::default_rooms(role) {
            self.join(id, room);
        }
    }

    /// Idempotent join: updates the router's member set and the connection's
    /// own room set together. A join for an unknown connection is ignored.
    pub fn join(&mut self, id: &ConnectionId, room: &str) {
        let Some(conn) = self.registry.get_mut(id) else {
            return;
        };
        conn.rooms.insert(room.to_string());
        self.router.join(id, room);
        debug!("{id} joined room {room}");
    }

    /// Idempotent leave; the mirrored sets stay consistent.
    pub fn leave(&mut self, id: &str, room: &str) {
        if let Some(conn) = self.registry.get_mut(id) {
            conn.rooms.remove(room);
        }
        self.router.leave(id, room);
        debug!("{id} left room {room}");
    }

    /// Remove a connection from every room it joined. Processed before the
    /// registry record is discarded so no room retains a stale member.
    pub fn leave_all(&mut self, id: &str) {
        let joined: Vec<String> = match self.registry.get(id) {
            Some(conn) => conn.rooms.iter().cloned().collect(),
            None => return,
        };
        for room in joined {
            self.leave(id, &room);
        }
    }

    /// Full teardown: rooms first, then the registry record. Idempotent; the
    /// first observer of a dead connection wins and later callers are no-ops.
    pub fn evict(&mut self, id: &str) -> bool {
        self.leave_all(id);
        match self.registry.remove(id) {
            Some(conn) => {
                info!("connection removed: {} ({id})", conn.identity.name);
                true
            }
            None => false,
        }
    }

    pub fn mark_alive(&mut self, id: &str) {
        self.registry.mark_alive(id);
    }

    pub fn mark_pending(&mut self, id: &str) {
        self.registry.mark_pending(id);
    }

    pub fn rooms_of(&self, id: &str) -> Vec<String> {
        self.registry
            .get(id)
            .map(|c| c.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolve a target to the concrete connection set, honoring the
    /// exclusion set. The result is a snapshot and may be stale by use.
    pub fn resolve_target(&self, target: &Target) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = match &target.scope {
            Scope::Room(room) => self.router.members_of(room).into_iter().collect(),
            Scope::Rooms(names) => {
                let mut set = std::collections::HashSet::new();
                for room in names {
                    set.extend(self.router.members_of(room));
                }
                set.into_iter().collect()
            }
            Scope::All => self.registry.ids(),
        };
        ids.retain(|id| !target.exclude.contains(id));
        ids
    }

    /// Push one already-serialized frame to one connection. Never blocks:
    /// the frame goes onto the connection's outbound channel and the socket
    /// write happens in that connection's send task.
    pub fn send_frame(&self, id: &str, frame: &WsMessage) -> SendOutcome {
        match self.registry.get(id) {
            Some(conn) => {
                if conn.sender.send(frame.clone()).is_ok() {
                    SendOutcome::Sent
                } else {
                    SendOutcome::Failed
                }
            }
            None => SendOutcome::Absent,
        }
    }

    /// Serialize and send a single envelope to one connection, for direct
    /// replies (welcome, pong, acks) outside the fan-out path.
    pub fn send_envelope(&self, id: &str, envelope: &Envelope) -> SendOutcome {
        match serde_json::to_string(envelope) {
            Ok(text) => self.send_frame(id, &WsMessage::text(text)),
            Err(_) => SendOutcome::Failed,
        }
    }

    /// Diagnostic snapshot of connections and rooms.
    pub fn stats(&self) -> HubStats {
        let mut rooms = self.router.names();
        rooms.sort();
        let mut connections: Vec<ConnectionStats> = self
            .registry
            .iter()
            .map(|conn| {
                let mut rooms: Vec<String> = conn.rooms.iter().cloned().collect();
                rooms.sort();
                ConnectionStats {
                    id: conn.id.clone(),
                    user: conn.identity.name.clone(),
                    role: conn.identity.role,
                    rooms,
                    alive: conn.alive,
                }
            })
            .collect();
        connections.sort_by(|a, b| a.id.cmp(&b.id));
        HubStats {
            connection_count: self.registry.len(),
            room_count: rooms.len(),
            rooms,
            connections,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HubStats {
    pub connection_count: usize,
    pub room_count: usize,
    pub rooms: Vec<String>,
    pub connections: Vec<ConnectionStats>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStats {
    pub id: ConnectionId,
    pub user: String,
    pub role: registry::Role,
    pub rooms: Vec<String>,
    pub alive: bool,
}

use std::collections::{HashMap, HashSet};

use super::registry::{ConnectionId, Role};

pub const GENERAL: &str = "general";
pub const ALERTS: &str = "alerts";
pub const ADMIN: &str = "admin";
pub const OPERATORS: &str = "operators";
pub const USERS: &str = "users";
pub const TACTICAL_MAPS: &str = "tactical_maps";
pub const THREAT_ALERTS: &str = "threat_alerts";
pub const RADAR_STREAM: &str = "radar_stream";

/// Fixed system rooms. These exist from startup and persist when empty;
/// every other room is created on first join and deleted on last leave.
pub const SYSTEM_ROOMS: [&str; 8] = [
    GENERAL,
    ALERTS,
    ADMIN,
    OPERATORS,
    USERS,
    TACTICAL_MAPS,
    THREAT_ALERTS,
    RADAR_STREAM,
];

/// Rooms a connection is placed in at connect time, as a pure function of
/// its role claim. Applied exactly once per connection.
pub fn default_rooms(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => &[GENERAL, ADMIN, ALERTS],
        Role::Operator => &[GENERAL, OPERATORS, ALERTS],
        Role::User => &[GENERAL, USERS],
    }
}

/// A named broadcast group. Member order carries no meaning.
#[derive(Debug, Default)]
pub struct Room {
    pub name: String,
    pub members: HashSet<ConnectionId>,
}

impl Room {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: HashSet::new(),
        }
    }
}

/// Maps room names to member sets. Join and leave are idempotent; the final
/// membership state of any (connection, room) pair depends only on the last
/// operation applied.
#[derive(Debug)]
pub struct RoomRouter {
    rooms: HashMap<String, Room>,
}

impl Default for RoomRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRouter {
    pub fn new() -> Self {
        let mut rooms = HashMap::new();
        for name in SYSTEM_ROOMS {
            rooms.insert(name.to_string(), Room::new(name));
        }
        Self { rooms }
    }

    pub fn is_system_room(name: &str) -> bool {
        SYSTEM_ROOMS.contains(&name)
    }

    /// Add a member, creating the room on first join.
    pub fn join(&mut self, id: &ConnectionId, room: &str) {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| Room::new(room))
            .members
            .insert(id.clone());
    }

    /// Remove a member; a dynamic room that just lost its last member is
    /// deleted immediately.
    pub fn leave(&mut self, id: &str, room: &str) {
        if let Some(r) = self.rooms.get_mut(room) {
            r.members.remove(id);
            if r.members.is_empty() && !Self::is_system_room(room) {
                self.rooms.remove(room);
            }
        }
    }

    /// Membership snapshot. May be stale by the time it is used; delivery
    /// tolerates a member having disconnected between snapshot and send.
    pub fn members_of(&self, room: &str) -> HashSet<ConnectionId> {
        self.rooms
            .get(room)
            .map(|r| r.members.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }
}

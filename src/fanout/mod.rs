//! Delivery fan-out engine: the single consumer of the event bus.
//!
//! For every event it resolves the target connection set through the room
//! router, serializes the envelope exactly once, and pushes the frame to
//! each target connection. A member that disconnected between snapshot and
//! send is skipped silently; a send failure is treated as an immediate
//! disconnect signal and evicts only that connection. One bad connection
//! never aborts delivery to the rest of the batch.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::bus::EventReceiver;
use crate::bus::event::{Event, EventKind, Scope};
use crate::hub::rooms::{ADMIN, OPERATORS};
use crate::hub::{Hub, SendOutcome};

/// Outcome of one fan-out pass, mostly of interest to tests and logs.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempts: usize,
    pub delivered: usize,
    pub evicted: usize,
}

/// Drain the bus until every producer handle is dropped.
pub async fn run(mut events: EventReceiver, hub: Arc<Mutex<Hub>>) {
    while let Some(event) = events.recv().await {
        deliver(&hub, &event);
    }
    debug!("event bus closed, fan-out engine stopping");
}

/// Fan one event out to its resolved target set.
pub fn deliver(hub: &Arc<Mutex<Hub>>, event: &Event) -> DeliveryReport {
    let text = match serde_json::to_string(&event.envelope()) {
        Ok(text) => text,
        Err(e) => {
            warn!("failed to serialize event {:?}: {e}", event.kind);
            return DeliveryReport::default();
        }
    };
    let frame = WsMessage::text(text);

    let mut target = event.target.clone();
    if let Some(extra) = supplementary_rooms(event) {
        target.scope = match target.scope {
            Scope::Room(room) => {
                let mut rooms = vec![room];
                rooms.extend(extra.iter().map(|r| r.to_string()));
                Scope::Rooms(rooms)
            }
            Scope::Rooms(mut rooms) => {
                rooms.extend(extra.iter().map(|r| r.to_string()));
                Scope::Rooms(rooms)
            }
            // Already reaching everyone.
            Scope::All => Scope::All,
        };
    }

    let mut report = DeliveryReport::default();
    let mut hub = hub.lock().unwrap();
    for id in hub.resolve_target(&target) {
        report.attempts += 1;
        match hub.send_frame(&id, &frame) {
            SendOutcome::Sent => report.delivered += 1,
            SendOutcome::Absent => {}
            SendOutcome::Failed => {
                warn!("send to {id} failed, evicting");
                hub.evict(&id);
                report.evicted += 1;
            }
        }
    }
    report
}

/// Severity-based additional routing: alert events above a severity
/// threshold are also pushed to the privileged-role rooms. A pure mapping
/// from payload severity to extra rooms, evaluated once per event.
fn supplementary_rooms(event: &Event) -> Option<&'static [&'static str]> {
    if !matches!(event.kind, EventKind::NewAlert | EventKind::AlertUpdated) {
        return None;
    }
    match event.payload.get("severity").and_then(|s| s.as_str()) {
        Some("CRITICAL") => Some(&[ADMIN, OPERATORS]),
        Some("HIGH") => Some(&[OPERATORS]),
        _ => None,
    }
}

#[cfg(test)]
mod tests;

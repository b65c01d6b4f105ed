//! Liveness monitor: a single sweep task that probes every connection at a
//! fixed interval and evicts the ones that never answered the previous
//! probe.
//!
//! State machine per connection: ALIVE -> (probe sent) -> AWAITING_PONG ->
//! (pong received) -> ALIVE, or AWAITING_PONG -> (next tick, no pong) ->
//! evicted. Exactly one missed cycle triggers eviction; the interval is
//! configurable. This catches half-open transports that would otherwise
//! leak registry and room memory indefinitely.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;
use tungstenite::protocol::Message as WsMessage;

use super::Hub;
use super::registry::ConnectionId;

pub async fn run(hub: Arc<Mutex<Hub>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The immediate first tick would probe connections that just arrived.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        sweep(&hub);
    }
}

/// One monitor tick: evict connections still awaiting a pong, then mark the
/// rest pending and send a probe. Split out so tests can drive ticks
/// directly.
pub fn sweep(hub: &Arc<Mutex<Hub>>) {
    let mut hub = hub.lock().unwrap();

    let stale: Vec<ConnectionId> = hub
        .registry
        .iter()
        .filter(|conn| !conn.alive)
        .map(|conn| conn.id.clone())
        .collect();
    for id in stale {
        warn!("connection {id} missed liveness probe, evicting");
        hub.evict(&id);
    }

    let remaining = hub.registry.ids();
    let mut dead = Vec::new();
    for id in &remaining {
        hub.mark_pending(id);
        if let Some(conn) = hub.registry.get(id)
            && conn.sender.send(WsMessage::Ping(Vec::new().into())).is_err()
        {
            dead.push(id.clone());
        }
    }
    // A probe that cannot even be queued means the send task is gone.
    for id in dead {
        hub.evict(&id);
    }
}

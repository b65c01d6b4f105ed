//! WebSocket transport
//!
//! Accepts observer connections, authenticates them during the handshake
//! (an unauthenticated connection is refused before it ever enters the
//! registry), and translates protocol JSON messages into hub operations.
//! Each connection gets a dedicated send task fed by an unbounded channel,
//! so the fan-out engine never blocks on a slow socket; a failed socket
//! write tears down only that connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message as WsMessage;

use crate::bus::EventBus;
use crate::bus::event::{Event, EventKind, Target};
use crate::hub::Hub;
use crate::hub::registry::{Connection, ConnectionId, Identity};
use crate::hub::rooms::{ALERTS, TACTICAL_MAPS, THREAT_ALERTS};
use crate::transport::auth::Authenticator;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::HubError;

pub async fn start_websocket_server(
    addr: String,
    hub: Arc<Mutex<Hub>>,
    auth: Arc<dyn Authenticator>,
    bus: EventBus,
) -> Result<(), HubError> {
    let listener = TcpListener::bind(&addr).await.map_err(|source| HubError::Bind {
        addr: addr.clone(),
        source,
    })?;

    info!("WebSocket server listening on ws://{addr}");

    while let Ok((stream, _)) = listener.accept().await {
        let hub = hub.clone();
        let auth = auth.clone();
        let bus = bus.clone();
        tokio::spawn(handle_connection(stream, hub, auth, bus));
    }
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    hub: Arc<Mutex<Hub>>,
    auth: Arc<dyn Authenticator>,
    bus: EventBus,
) {
    // The identity is extracted during the handshake callback; a missing or
    // invalid token refuses the upgrade outright.
    let mut identity: Option<Identity> = None;
    let callback = |req: &Request, resp: Response| {
        let token = query_param(req.uri().query(), "token");
        match token.and_then(|t| auth.authenticate(t)) {
            Some(found) => {
                identity = Some(found);
                Ok(resp)
            }
            None => {
                warn!("WebSocket connection rejected: no valid token");
                let mut reject = ErrorResponse::new(Some("unauthorized".to_string()));
                *reject.status_mut() = StatusCode::UNAUTHORIZED;
                Err(reject)
            }
        }
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("WebSocket handshake error: {e}");
            return;
        }
    };
    let Some(identity) = identity else {
        return;
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let conn_id = {
        let mut hub = hub.lock().unwrap();
        let id = hub.register(Connection::new(identity.clone(), tx));
        hub.join_default_rooms(&id);
        reply(
            &hub,
            &id,
            &ServerMessage::Welcome {
                connection_id: id.clone(),
                identity,
            },
        );
        id
    };

    let cleanup_called = Arc::new(AtomicBool::new(false));
    let do_cleanup = {
        let hub = hub.clone();
        let conn_id = conn_id.clone();
        let cleanup_called = cleanup_called.clone();

        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                let mut hub = hub.lock().unwrap();
                hub.evict(&conn_id);
            }
        }
    };

    {
        let conn_id = conn_id.clone();
        let do_cleanup = do_cleanup.clone();

        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    debug!("failed to send message to {conn_id}: {e}");
                    break;
                }
            }

            // Eviction drops the channel; shut the socket down so the peer
            // and the read loop observe the close instead of hanging.
            if let Err(e) = ws_sender.close().await {
                debug!("failed to close socket for {conn_id}: {e}");
            }

            do_cleanup();
            debug!("send loop closed for {conn_id}");
        });
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            WsMessage::Text(text) => handle_client_message(&hub, &bus, &conn_id, &text),
            // Any liveness response flips the connection back to ALIVE.
            WsMessage::Pong(_) => hub.lock().unwrap().mark_alive(&conn_id),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    do_cleanup();
}

/// Dispatch one inbound control message. Malformed input is logged and
/// ignored; the connection remains open and usable.
pub(crate) fn handle_client_message(
    hub: &Arc<Mutex<Hub>>,
    bus: &EventBus,
    conn_id: &ConnectionId,
    text: &str,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::JoinRoom { room }) => {
            let mut hub = hub.lock().unwrap();
            hub.join(conn_id, &room);
            reply(&hub, conn_id, &ServerMessage::RoomJoined { room });
        }
        Ok(ClientMessage::LeaveRoom { room }) => {
            let mut hub = hub.lock().unwrap();
            hub.leave(conn_id, &room);
            reply(&hub, conn_id, &ServerMessage::RoomLeft { room });
        }
        Ok(ClientMessage::Ping) => {
            let mut hub = hub.lock().unwrap();
            hub.mark_alive(conn_id);
            reply(
                &hub,
                conn_id,
                &ServerMessage::Pong {
                    timestamp: chrono::Utc::now().timestamp_millis(),
                },
            );
        }
        Ok(ClientMessage::SubscribeAlerts { filters }) => {
            let mut hub = hub.lock().unwrap();
            if let Some(conn) = hub.registry.get_mut(conn_id) {
                conn.alert_filters = filters.clone();
            }
            hub.join(conn_id, ALERTS);
            reply(
                &hub,
                conn_id,
                &ServerMessage::AlertsSubscribed {
                    filters: filters.unwrap_or_else(|| json!({})),
                },
            );
        }
        Ok(ClientMessage::UnsubscribeAlerts) => {
            let mut hub = hub.lock().unwrap();
            if let Some(conn) = hub.registry.get_mut(conn_id) {
                conn.alert_filters = None;
            }
            hub.leave(conn_id, ALERTS);
            reply(&hub, conn_id, &ServerMessage::AlertsUnsubscribed);
        }
        Ok(ClientMessage::ThreatSubscribe { filters }) => {
            let mut hub = hub.lock().unwrap();
            if let Some(conn) = hub.registry.get_mut(conn_id) {
                conn.threat_filters = filters.clone();
            }
            hub.join(conn_id, THREAT_ALERTS);
            reply(
                &hub,
                conn_id,
                &ServerMessage::ThreatSubscribed {
                    filters: filters.unwrap_or_else(|| json!({})),
                },
            );
        }
        Ok(ClientMessage::ThreatUnsubscribe) => {
            let mut hub = hub.lock().unwrap();
            if let Some(conn) = hub.registry.get_mut(conn_id) {
                conn.threat_filters = None;
            }
            hub.leave(conn_id, THREAT_ALERTS);
            reply(&hub, conn_id, &ServerMessage::ThreatUnsubscribed);
        }
        Ok(ClientMessage::MapViewUpdate { view }) => {
            {
                let mut hub = hub.lock().unwrap();
                match hub.registry.get_mut(conn_id) {
                    Some(conn) => merge_view(&mut conn.map_view, &view),
                    None => return,
                }
            }
            // Echo the change to the rest of the map room; the originator is
            // excluded as part of the event's target.
            bus.publish(Event::new(
                EventKind::MapViewUpdated,
                json!({"clientId": conn_id, "view": view}),
                Target::room(TACTICAL_MAPS).excluding(conn_id.clone()),
            ));
        }
        Err(err) => {
            warn!(
                "invalid client message from {conn_id}: {err} | {}",
                &text.chars().take(100).collect::<String>()
            );
        }
    }
}

fn reply(hub: &Hub, conn_id: &str, msg: &ServerMessage) {
    if let Ok(text) = serde_json::to_string(msg) {
        let _ = hub.send_frame(conn_id, &WsMessage::text(text));
    }
}

/// Shallow merge of a view update into the stored map view, matching the
/// client's partial-update semantics.
fn merge_view(current: &mut serde_json::Value, update: &serde_json::Value) {
    if let (Some(current), Some(update)) = (current.as_object_mut(), update.as_object()) {
        for (key, value) in update {
            current.insert(key.clone(), value.clone());
        }
    }
}

fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

//! Secondary simplex radar stream listener.
//!
//! Server-to-client only, no join/leave protocol: every accepted connection
//! is parked in the fixed radar room, receives a `hello` event immediately,
//! and then gets every published radar-topic event until it disconnects.
//! Inbound frames are ignored except for liveness responses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info};
use tungstenite::protocol::Message as WsMessage;

use crate::bus::event::{Envelope, EventKind};
use crate::hub::Hub;
use crate::hub::registry::{Connection, Identity, Role};
use crate::hub::rooms::RADAR_STREAM;
use crate::utils::error::HubError;

pub async fn start_radar_stream_server(addr: String, hub: Arc<Mutex<Hub>>) -> Result<(), HubError> {
    let listener = TcpListener::bind(&addr).await.map_err(|source| HubError::Bind {
        addr: addr.clone(),
        source,
    })?;

    info!("radar stream listening on ws://{addr}");

    while let Ok((stream, _)) = listener.accept().await {
        let hub = hub.clone();
        tokio::spawn(handle_connection(stream, hub));
    }
    Ok(())
}

async fn handle_connection(stream: TcpStream, hub: Arc<Mutex<Hub>>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("radar stream handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let identity = Identity {
        id: "radar-stream".to_string(),
        name: "radar stream observer".to_string(),
        role: Role::User,
    };

    let conn_id = {
        let mut hub = hub.lock().unwrap();
        let id = hub.register(Connection::new(identity, tx));
        hub.join(&id, RADAR_STREAM);
        hub.send_envelope(
            &id,
            &Envelope {
                kind: EventKind::Hello,
                data: json!({}),
                timestamp: chrono::Utc::now().timestamp_millis(),
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
                    debug!("failed to send to radar stream {conn_id}: {e}");
                    break;
                }
            }
            if let Err(e) = ws_sender.close().await {
                debug!("failed to close radar stream {conn_id}: {e}");
            }
            do_cleanup();
        });
    }

    // Drain inbound frames only to notice pongs and the close.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            WsMessage::Pong(_) => hub.lock().unwrap().mark_alive(&conn_id),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    do_cleanup();
}

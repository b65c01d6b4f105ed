use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tungstenite::protocol::Message as WsMessage;

use crate::bus::EventBus;
use crate::bus::event::{EventKind, Scope};
use crate::hub::Hub;
use crate::hub::registry::{Connection, Identity, Role};
use crate::hub::rooms;
use crate::transport::message::ClientMessage;
use crate::transport::websocket::handle_client_message;

fn connect(hub: &Arc<Mutex<Hub>>) -> (String, UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let identity = Identity {
        id: "user-1".to_string(),
        name: "alice".to_string(),
        role: Role::Operator,
    };
    let id = hub.lock().unwrap().register(Connection::new(identity, tx));
    (id, rx)
}

fn recv_json(rx: &mut UnboundedReceiver<WsMessage>) -> serde_json::Value {
    match rx.try_recv().expect("expected an outbound frame") {
        WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[test]
fn parses_control_protocol_variants() {
    let join: ClientMessage =
        serde_json::from_str(r#"{"type":"join_room","room":"tactical_maps"}"#).unwrap();
    assert!(matches!(join, ClientMessage::JoinRoom { room } if room == "tactical_maps"));

    let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert!(matches!(ping, ClientMessage::Ping));

    // Filters are optional on subscription messages.
    let sub: ClientMessage = serde_json::from_str(r#"{"type":"subscribe_alerts"}"#).unwrap();
    assert!(matches!(sub, ClientMessage::SubscribeAlerts { filters: None }));

    let sub: ClientMessage = serde_json::from_str(
        r#"{"type":"threat_subscribe","filters":{"severity":"HIGH"}}"#,
    )
    .unwrap();
    match sub {
        ClientMessage::ThreatSubscribe { filters } => {
            assert_eq!(filters.unwrap()["severity"], "HIGH");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn join_and_leave_room_with_acks() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (bus, _events) = EventBus::channel();
    let (id, mut rx) = connect(&hub);

    handle_client_message(&hub, &bus, &id, r#"{"type":"join_room","room":"sector-7"}"#);
    assert!(hub.lock().unwrap().router.members_of("sector-7").contains(&id));
    let ack = recv_json(&mut rx);
    assert_eq!(ack["type"], "room_joined");
    assert_eq!(ack["room"], "sector-7");

    handle_client_message(&hub, &bus, &id, r#"{"type":"leave_room","room":"sector-7"}"#);
    assert!(!hub.lock().unwrap().router.contains("sector-7"));
    let ack = recv_json(&mut rx);
    assert_eq!(ack["type"], "room_left");
}

#[test]
fn protocol_ping_answers_pong_and_marks_alive() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (bus, _events) = EventBus::channel();
    let (id, mut rx) = connect(&hub);
    hub.lock().unwrap().mark_pending(&id);

    handle_client_message(&hub, &bus, &id, r#"{"type":"ping"}"#);

    assert!(hub.lock().unwrap().registry.get(&id).unwrap().alive);
    let pong = recv_json(&mut rx);
    assert_eq!(pong["type"], "pong");
    assert!(pong["timestamp"].as_i64().unwrap() > 0);
}

#[test]
fn alert_subscription_stores_filters_and_joins_room() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (bus, _events) = EventBus::channel();
    let (id, mut rx) = connect(&hub);

    handle_client_message(
        &hub,
        &bus,
        &id,
        r#"{"type":"subscribe_alerts","filters":{"severity":"CRITICAL"}}"#,
    );
    {
        let hub = hub.lock().unwrap();
        let conn = hub.registry.get(&id).unwrap();
        assert_eq!(conn.alert_filters.as_ref().unwrap()["severity"], "CRITICAL");
        assert!(hub.router.members_of(rooms::ALERTS).contains(&id));
    }
    let ack = recv_json(&mut rx);
    assert_eq!(ack["type"], "alerts_subscribed");
    assert_eq!(ack["filters"]["severity"], "CRITICAL");

    handle_client_message(&hub, &bus, &id, r#"{"type":"unsubscribe_alerts"}"#);
    {
        let hub = hub.lock().unwrap();
        assert!(hub.registry.get(&id).unwrap().alert_filters.is_none());
        assert!(!hub.router.members_of(rooms::ALERTS).contains(&id));
    }
    assert_eq!(recv_json(&mut rx)["type"], "alerts_unsubscribed");
}

#[test]
fn threat_subscription_joins_threat_room() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (bus, _events) = EventBus::channel();
    let (id, mut rx) = connect(&hub);

    handle_client_message(&hub, &bus, &id, r#"{"type":"threat_subscribe"}"#);
    assert!(
        hub.lock()
            .unwrap()
            .router
            .members_of(rooms::THREAT_ALERTS)
            .contains(&id)
    );
    assert_eq!(recv_json(&mut rx)["type"], "threat_subscribed");

    handle_client_message(&hub, &bus, &id, r#"{"type":"threat_unsubscribe"}"#);
    assert!(
        !hub.lock()
            .unwrap()
            .router
            .members_of(rooms::THREAT_ALERTS)
            .contains(&id)
    );
    assert_eq!(recv_json(&mut rx)["type"], "threat_unsubscribed");
}

#[tokio::test]
async fn map_view_update_merges_state_and_publishes_excluding_origin() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (bus, mut events) = EventBus::channel();
    let (id, _rx) = connect(&hub);

    handle_client_message(
        &hub,
        &bus,
        &id,
        r#"{"type":"map_view_update","view":{"zoom":9,"center":{"lat":41.0,"lng":-73.5}}}"#,
    );

    {
        let hub = hub.lock().unwrap();
        let view = &hub.registry.get(&id).unwrap().map_view;
        assert_eq!(view["zoom"], 9);
        assert_eq!(view["center"]["lat"], 41.0);
        // Untouched keys survive the shallow merge.
        assert_eq!(view["layers"]["radar"], true);
    }

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::MapViewUpdated);
    assert_eq!(event.payload["clientId"], json!(id));
    assert_eq!(event.payload["view"]["zoom"], 9);
    assert_eq!(
        event.target.scope,
        Scope::Room(rooms::TACTICAL_MAPS.to_string())
    );
    assert!(event.target.exclude.contains(&id));
}

#[test]
fn malformed_message_is_ignored_and_connection_stays_usable() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (bus, _events) = EventBus::channel();
    let (id, mut rx) = connect(&hub);

    handle_client_message(&hub, &bus, &id, "this is not json");
    handle_client_message(&hub, &bus, &id, r#"{"type":"warp_drive"}"#);
    assert!(rx.try_recv().is_err());
    assert!(hub.lock().unwrap().registry.get(&id).is_some());

    // Still responsive afterwards.
    handle_client_message(&hub, &bus, &id, r#"{"type":"ping"}"#);
    assert_eq!(recv_json(&mut rx)["type"], "pong");
}

#[test]
fn message_for_unknown_connection_is_a_no_op() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (bus, _events) = EventBus::channel();
    handle_client_message(&hub, &bus, &"ghost".to_string(), r#"{"type":"ping"}"#);
    assert_eq!(hub.lock().unwrap().registry.len(), 0);
}

use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tungstenite::protocol::Message as WsMessage;

use super::deliver;
use crate::bus::EventBus;
use crate::bus::event::{Envelope, Event, EventKind, Target};
use crate::hub::Hub;
use crate::hub::registry::{Connection, Identity, Role};
use crate::hub::rooms;

fn connect(hub: &Arc<Mutex<Hub>>, name: &str, role: Role) -> (String, UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let identity = Identity {
        id: format!("user-{name}"),
        name: name.to_string(),
        role,
    };
    let id = hub.lock().unwrap().register(Connection::new(identity, tx));
    (id, rx)
}

fn recv_envelope(rx: &mut UnboundedReceiver<WsMessage>) -> Envelope {
    match rx.try_recv().expect("expected a delivered frame") {
        WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[test]
fn delivers_to_every_room_member() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (a, mut rx_a) = connect(&hub, "a", Role::User);
    let (b, mut rx_b) = connect(&hub, "b", Role::User);
    let (_c, mut rx_c) = connect(&hub, "c", Role::User);
    {
        let mut hub = hub.lock().unwrap();
        hub.join(&a, rooms::THREAT_ALERTS);
        hub.join(&b, rooms::THREAT_ALERTS);
    }

    let event = Event::new(
        EventKind::ThreatUpdate,
        json!({"threat": "UAV", "confidence": 91}),
        Target::room(rooms::THREAT_ALERTS),
    );
    let report = deliver(&hub, &event);

    assert_eq!(report.attempts, 2);
    assert_eq!(report.delivered, 2);
    assert_eq!(recv_envelope(&mut rx_a).data["threat"], "UAV");
    assert_eq!(recv_envelope(&mut rx_b).data["threat"], "UAV");
    assert!(rx_c.try_recv().is_err());
}

#[test]
fn one_failed_member_does_not_block_the_rest() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (a, rx_a) = connect(&hub, "a", Role::User);
    let (b, mut rx_b) = connect(&hub, "b", Role::User);
    {
        let mut hub = hub.lock().unwrap();
        hub.join(&a, rooms::THREAT_ALERTS);
        hub.join(&b, rooms::THREAT_ALERTS);
    }
    // a's send task is gone; its channel is closed.
    drop(rx_a);

    let event = Event::new(
        EventKind::ThreatUpdate,
        json!({"threat": "UAV"}),
        Target::room(rooms::THREAT_ALERTS),
    );
    let report = deliver(&hub, &event);

    assert_eq!(report.attempts, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.evicted, 1);
    assert_eq!(recv_envelope(&mut rx_b).data["threat"], "UAV");

    // The failed connection was fully torn down, rooms included.
    let hub = hub.lock().unwrap();
    assert!(hub.registry.get(&a).is_none());
    assert!(!hub.router.members_of(rooms::THREAT_ALERTS).contains(&a));
}

#[test]
fn member_absent_from_registry_is_skipped_silently() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (a, mut rx_a) = connect(&hub, "a", Role::User);
    {
        let mut hub = hub.lock().unwrap();
        hub.join(&a, rooms::THREAT_ALERTS);
        // Simulate a raced disconnect: membership outlives the record.
        hub.router.join(&"ghost".to_string(), rooms::THREAT_ALERTS);
    }

    let event = Event::new(
        EventKind::ThreatUpdate,
        json!({}),
        Target::room(rooms::THREAT_ALERTS),
    );
    let report = deliver(&hub, &event);

    assert_eq!(report.attempts, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.evicted, 0);
    assert!(rx_a.try_recv().is_ok());
}

#[test]
fn critical_alert_reaches_privileged_rooms_but_not_general() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (a, mut rx_a) = connect(&hub, "a", Role::Operator);
    let (b, mut rx_b) = connect(&hub, "b", Role::Operator);
    let (admin, mut rx_admin) = connect(&hub, "admin", Role::Admin);
    let (bystander, mut rx_bystander) = connect(&hub, "bystander", Role::User);
    {
        let mut hub = hub.lock().unwrap();
        hub.join(&a, rooms::ALERTS);
        hub.join(&b, rooms::ALERTS);
        hub.join(&admin, rooms::ADMIN);
        hub.join(&bystander, rooms::GENERAL);
    }

    let event = Event::new(
        EventKind::NewAlert,
        json!({"title": "Perimeter breach", "severity": "CRITICAL"}),
        Target::room(rooms::ALERTS),
    );
    deliver(&hub, &event);

    assert_eq!(recv_envelope(&mut rx_a).kind, EventKind::NewAlert);
    assert_eq!(recv_envelope(&mut rx_b).kind, EventKind::NewAlert);
    assert_eq!(recv_envelope(&mut rx_admin).kind, EventKind::NewAlert);
    assert!(rx_bystander.try_recv().is_err());
}

#[test]
fn high_alert_adds_operators_room_only() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (op, mut rx_op) = connect(&hub, "op", Role::Operator);
    let (admin, mut rx_admin) = connect(&hub, "admin", Role::Admin);
    {
        let mut hub = hub.lock().unwrap();
        hub.join(&op, rooms::OPERATORS);
        hub.join(&admin, rooms::ADMIN);
    }

    let event = Event::new(
        EventKind::NewAlert,
        json!({"severity": "HIGH"}),
        Target::room(rooms::ALERTS),
    );
    deliver(&hub, &event);

    assert!(rx_op.try_recv().is_ok());
    assert!(rx_admin.try_recv().is_err());
}

#[test]
fn member_in_both_base_and_supplementary_rooms_gets_one_copy() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (op, mut rx_op) = connect(&hub, "op", Role::Operator);
    {
        let mut hub = hub.lock().unwrap();
        hub.join(&op, rooms::ALERTS);
        hub.join(&op, rooms::OPERATORS);
    }

    let event = Event::new(
        EventKind::NewAlert,
        json!({"severity": "CRITICAL"}),
        Target::room(rooms::ALERTS),
    );
    let report = deliver(&hub, &event);

    // At-most-once per connection per event.
    assert_eq!(report.attempts, 1);
    assert!(rx_op.try_recv().is_ok());
    assert!(rx_op.try_recv().is_err());
}

#[test]
fn originator_exclusion_skips_the_echoing_connection() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (origin, mut rx_origin) = connect(&hub, "origin", Role::User);
    let (other, mut rx_other) = connect(&hub, "other", Role::User);
    {
        let mut hub = hub.lock().unwrap();
        hub.join(&origin, rooms::TACTICAL_MAPS);
        hub.join(&other, rooms::TACTICAL_MAPS);
    }

    let event = Event::new(
        EventKind::MapViewUpdated,
        json!({"clientId": origin, "view": {"zoom": 9}}),
        Target::room(rooms::TACTICAL_MAPS).excluding(origin.clone()),
    );
    let report = deliver(&hub, &event);

    assert_eq!(report.attempts, 1);
    assert!(rx_origin.try_recv().is_err());
    assert_eq!(recv_envelope(&mut rx_other).data["view"]["zoom"], 9);
}

#[test]
fn broadcast_to_all_reaches_every_connection() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (_a, mut rx_a) = connect(&hub, "a", Role::User);
    let (_b, mut rx_b) = connect(&hub, "b", Role::Admin);

    let event = Event::new(
        EventKind::SystemStatus,
        json!({"status": "DEGRADED", "message": "sensor grid offline"}),
        Target::all(),
    );
    let report = deliver(&hub, &event);

    assert_eq!(report.attempts, 2);
    assert_eq!(recv_envelope(&mut rx_a).data["status"], "DEGRADED");
    assert_eq!(recv_envelope(&mut rx_b).data["status"], "DEGRADED");
}

#[test]
fn delivered_envelope_round_trips_published_triple() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (a, mut rx_a) = connect(&hub, "a", Role::User);
    hub.lock().unwrap().join(&a, rooms::TACTICAL_MAPS);

    let event = Event::new(
        EventKind::RadarDetection,
        json!({
            "radarId": "R-7",
            "velocityMps": 312.5,
            "nested": {"tags": ["high-speed"], "score": 0.9},
        }),
        Target::room(rooms::TACTICAL_MAPS),
    );
    deliver(&hub, &event);

    let envelope = recv_envelope(&mut rx_a);
    assert_eq!(envelope, event.envelope());
    assert_eq!(envelope.timestamp, event.timestamp);
}

#[tokio::test]
async fn engine_drains_bus_in_publication_order() {
    let hub = Arc::new(Mutex::new(Hub::new()));
    let (a, mut rx_a) = connect(&hub, "a", Role::User);
    hub.lock().unwrap().join(&a, rooms::ALERTS);

    let (bus, events) = EventBus::channel();
    let engine = tokio::spawn(super::run(events, hub.clone()));

    for seq in 0..3 {
        bus.publish(Event::new(
            EventKind::NewAlert,
            json!({"seq": seq}),
            Target::room(rooms::ALERTS),
        ));
    }
    drop(bus);
    engine.await.unwrap();

    for seq in 0..3 {
        assert_eq!(recv_envelope(&mut rx_a).data["seq"], seq);
    }
}

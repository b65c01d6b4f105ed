use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hub::registry::{ConnectionId, Identity};

/// Inbound control protocol. A message that fails to parse is logged and
/// ignored; the connection stays open.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join_room")]
    JoinRoom { room: String },

    #[serde(rename = "leave_room")]
    LeaveRoom { room: String },

    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "subscribe_alerts")]
    SubscribeAlerts {
        #[serde(default)]
        filters: Option<Value>,
    },

    #[serde(rename = "unsubscribe_alerts")]
    UnsubscribeAlerts,

    #[serde(rename = "threat_subscribe")]
    ThreatSubscribe {
        #[serde(default)]
        filters: Option<Value>,
    },

    #[serde(rename = "threat_unsubscribe")]
    ThreatUnsubscribe,

    #[serde(rename = "map_view_update")]
    MapViewUpdate { view: Value },
}

/// Direct server-to-client replies outside the event fan-out path.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")]
    Welcome {
        connection_id: ConnectionId,
        identity: Identity,
    },

    #[serde(rename = "pong")]
    Pong { timestamp: i64 },

    #[serde(rename = "room_joined")]
    RoomJoined { room: String },

    #[serde(rename = "room_left")]
    RoomLeft { room: String },

    #[serde(rename = "alerts_subscribed")]
    AlertsSubscribed { filters: Value },

    #[serde(rename = "alerts_unsubscribed")]
    AlertsUnsubscribed,

    #[serde(rename = "threat_subscribed")]
    ThreatSubscribed { filters: Value },

    #[serde(rename = "threat_unsubscribed")]
    ThreatUnsubscribed,
}

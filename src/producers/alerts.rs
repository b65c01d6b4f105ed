use serde_json::Value;

use crate::bus::EventBus;
use crate::bus::event::{Event, EventKind, Target};
use crate::hub::rooms::ALERTS;

/// Publishes alert lifecycle events. The external CRUD collaborator persists
/// the record and hands the result here; this adapter only announces it.
///
/// Events target the "alerts" room; routing CRITICAL/HIGH alerts to the
/// privileged-role rooms on top of that is the fan-out engine's severity
/// mapping, not this producer's concern.
#[derive(Debug, Clone)]
pub struct AlertProducer {
    bus: EventBus,
}

impl AlertProducer {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn alert_created(&self, alert: Value) {
        self.bus
            .publish(Event::new(EventKind::NewAlert, alert, Target::room(ALERTS)));
    }

    pub fn alert_updated(&self, alert: Value) {
        self.bus.publish(Event::new(
            EventKind::AlertUpdated,
            alert,
            Target::room(ALERTS),
        ));
    }
}

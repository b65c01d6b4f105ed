use serde::{Deserialize, Serialize};
use serde_json::json;

use super::Severity;
use crate::bus::EventBus;
use crate::bus::event::{Event, EventKind, Target};
use crate::hub::rooms::{RADAR_STREAM, TACTICAL_MAPS, THREAT_ALERTS};

/// A radar detection record, as persisted by the external ingestion
/// endpoint. Field names match the ingestion wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub detection_id: String,
    pub radar_id: String,
    pub velocity_mps: f64,
    pub rcs: f64,
    pub range_meters: f64,
    pub confidence: f64,
    pub lat: f64,
    pub lng: f64,
}

/// Bounded [0, 1] anomaly score from three independent indicator checks:
/// very high velocity, a large radar cross-section at short range, and low
/// detection confidence. Deterministic and monotonic in each indicator.
pub fn anomaly_score(d: &Detection) -> f64 {
    let mut score: f64 = 0.0;
    if d.velocity_mps > 250.0 {
        score += 0.5;
    }
    if d.rcs > 20.0 && d.range_meters < 1000.0 {
        score += 0.4;
    }
    if d.confidence < 0.3 {
        score += 0.2;
    }
    score.min(1.0)
}

/// Qualitative level from the anomaly score. Comparisons are strictly
/// greater-than: a score landing exactly on a cut-point classifies at the
/// lower level.
pub fn classify(score: f64) -> Severity {
    if score > 0.7 {
        Severity::Critical
    } else if score > 0.4 {
        Severity::High
    } else if score > 0.2 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Indicator tags attached to the insight message.
pub fn indicator_tags(d: &Detection) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if d.velocity_mps > 200.0 {
        tags.push("high-speed");
    }
    if d.rcs > 25.0 {
        tags.push("large-rcs");
    }
    if d.range_meters < 500.0 {
        tags.push("close-range");
    }
    tags
}

/// Re-derives a qualitative insight from a detection's anomaly score and
/// publishes it as a chained `ai_insight` event on the same bus.
#[derive(Debug, Clone)]
pub struct AnomalyClassifier {
    bus: EventBus,
}

impl AnomalyClassifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn analyze(&self, detection: &Detection, score: f64) {
        let level = classify(score);
        let tags = indicator_tags(detection);
        let summary = if tags.is_empty() {
            "nominal".to_string()
        } else {
            tags.join(", ")
        };
        let payload = json!({
            "level": level,
            "message": format!("Anomaly {}%: {summary}", (score * 100.0).round() as i64),
            "detectionId": detection.detection_id,
            "radarId": detection.radar_id,
        });
        self.bus.publish(Event::new(
            EventKind::AiInsight,
            payload,
            Target::rooms([RADAR_STREAM, THREAT_ALERTS]),
        ));
    }
}

/// Ingests persisted detections: publishes the scored `radar_detection`
/// event, then hands the same score to the classifier for the chained
/// insight.
#[derive(Debug, Clone)]
pub struct RadarProducer {
    bus: EventBus,
    classifier: AnomalyClassifier,
}

impl RadarProducer {
    pub fn new(bus: EventBus) -> Self {
        let classifier = AnomalyClassifier::new(bus.clone());
        Self { bus, classifier }
    }

    pub fn ingest(&self, detection: Detection) {
        let score = anomaly_score(&detection);
        let payload = json!({
            "detection": detection,
            "anomaly": score,
        });
        self.bus.publish(Event::new(
            EventKind::RadarDetection,
            payload,
            Target::rooms([RADAR_STREAM, TACTICAL_MAPS]),
        ));
        self.classifier.analyze(&detection, score);
    }
}

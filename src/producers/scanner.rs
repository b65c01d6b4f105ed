//! Periodic simulated sensor scan and pattern analysis.
//!
//! The scan loop pulls candidate observations from an injectable
//! [`SensorSuite`], promotes the ones above the probability threshold to
//! `threat_detected` events, and keeps a decaying in-memory threat record.
//! A slower analysis loop looks for two anomaly conditions over the
//! accumulated patterns: unusual frequency inside a rolling window, and
//! spatial clustering measured by pairwise great-circle distance. The random
//! generator is a placeholder; a real detector substitutes its own
//! `SensorSuite` without touching the distribution subsystem.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::Severity;
use crate::bus::EventBus;
use crate::bus::event::{Event, EventKind, Target};
use crate::hub::rooms::THREAT_ALERTS;

/// Sensor modality an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Radar,
    Camera,
    Motion,
    Network,
}

impl Modality {
    pub fn threat_type(&self) -> &'static str {
        match self {
            Modality::Radar => "AIRCRAFT_THREAT",
            Modality::Camera => "VEHICLE_THREAT",
            Modality::Motion => "PERSON_THREAT",
            Modality::Network => "CYBER_THREAT",
        }
    }
}

/// One candidate threat observation from a sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub modality: Modality,
    pub label: String,
    pub probability: f64,
    pub lat: f64,
    pub lng: f64,
}

/// Source of candidate observations, swapped out in tests and by real
/// detectors.
pub trait SensorSuite: Send {
    fn collect(&mut self) -> Vec<Observation>;
}

/// Placeholder generator: per modality, a fixed chance of producing one
/// observation near the monitored site with a random probability.
#[derive(Debug, Default)]
pub struct SimulatedSensors;

impl SimulatedSensors {
    const SITE_LAT: f64 = 40.7128;
    const SITE_LNG: f64 = -74.0060;

    fn synthesize(rng: &mut impl Rng, modality: Modality, chance: f64, label: &str) -> Option<Observation> {
        if rng.random::<f64>() >= chance {
            return None;
        }
        Some(Observation {
            modality,
            label: label.to_string(),
            probability: rng.random::<f64>(),
            lat: Self::SITE_LAT + (rng.random::<f64>() - 0.5) * 0.01,
            lng: Self::SITE_LNG + (rng.random::<f64>() - 0.5) * 0.01,
        })
    }
}

impl SensorSuite for SimulatedSensors {
    fn collect(&mut self) -> Vec<Observation> {
        let mut rng = rand::rng();
        [
            (Modality::Radar, 0.3, "aircraft"),
            (Modality::Camera, 0.2, "vehicle"),
            (Modality::Motion, 0.15, "movement"),
            (Modality::Network, 0.25, "intrusion"),
        ]
        .into_iter()
        .filter_map(|(modality, chance, label)| Self::synthesize(&mut rng, modality, chance, label))
        .collect()
    }
}

/// A promoted threat observation. Confidence is a percentage that decays
/// once the record ages past the pattern window.
#[derive(Debug, Clone, Serialize)]
pub struct ThreatRecord {
    pub id: String,
    pub threat_type: &'static str,
    pub severity: Severity,
    pub confidence: f64,
    pub lat: f64,
    pub lng: f64,
    pub source: Modality,
    pub description: String,
    pub timestamp: i64,
}

#[derive(Debug, Default)]
pub struct PatternStats {
    pub count: usize,
    pub last_seen: i64,
    pub locations: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub scan_interval: Duration,
    pub analysis_interval: Duration,
    /// Observations must exceed this probability to become threats.
    pub threat_threshold: f64,
    /// Pattern occurrences above this count within the window flag a
    /// frequency anomaly.
    pub frequency_threshold: usize,
    pub pattern_window: Duration,
    /// Clustering coefficient above this flags a spatial anomaly.
    pub clustering_threshold: f64,
    /// Multiplied into confidence once a record ages past the window.
    pub confidence_decay: f64,
    /// Records below this confidence are pruned.
    pub min_confidence: f64,
    /// Population cap; oldest records are pruned beyond it.
    pub max_threats: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(5),
            analysis_interval: Duration::from_secs(60),
            threat_threshold: 0.7,
            frequency_threshold: 10,
            pattern_window: Duration::from_secs(300),
            clustering_threshold: 0.8,
            confidence_decay: 0.95,
            min_confidence: 30.0,
            max_threats: 1000,
        }
    }
}

/// Severity from threat probability.
pub fn severity_for(probability: f64) -> Severity {
    if probability >= 0.9 {
        Severity::Critical
    } else if probability >= 0.7 {
        Severity::High
    } else if probability >= 0.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Great-circle distance in kilometers.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.0 - a.0).to_radians();
    let d_lng = (b.1 - a.1).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.0.to_radians().cos() * b.0.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Clustering coefficient in [0, 1]: mean pairwise distance normalized
/// against 1 km, inverted. Fewer than three points never cluster.
pub fn clustering_coefficient(locations: &[(f64, f64)]) -> f64 {
    if locations.len() < 3 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..locations.len() {
        for j in (i + 1)..locations.len() {
            total += haversine_km(locations[i], locations[j]);
            pairs += 1;
        }
    }
    let avg = total / pairs as f64;
    (1.0 - avg).max(0.0)
}

pub struct ThreatScanner {
    bus: EventBus,
    suite: Box<dyn SensorSuite>,
    config: ScannerConfig,
    pub threats: HashMap<String, ThreatRecord>,
    pub patterns: HashMap<String, PatternStats>,
}

impl ThreatScanner {
    pub fn new(bus: EventBus, suite: Box<dyn SensorSuite>, config: ScannerConfig) -> Self {
        Self {
            bus,
            suite,
            config,
            threats: HashMap::new(),
            patterns: HashMap::new(),
        }
    }

    /// One scan tick: promote observations above the threshold to threat
    /// events, then age the accumulated records. Returns the number of
    /// threats raised this tick.
    pub fn scan(&mut self) -> usize {
        let observations = self.suite.collect();
        let mut raised = 0;
        for obs in observations {
            if obs.probability <= self.config.threat_threshold {
                continue;
            }
            let record = self.promote(&obs);
            self.bus.publish(Event::new(
                EventKind::ThreatDetected,
                serde_json::to_value(&record).unwrap_or_default(),
                Target::room(THREAT_ALERTS),
            ));
            self.record_pattern(&record);
            self.threats.insert(record.id.clone(), record);
            raised += 1;
        }
        self.decay_and_prune();
        debug!("scan complete: {raised} threats raised, {} tracked", self.threats.len());
        raised
    }

    fn promote(&self, obs: &Observation) -> ThreatRecord {
        let threat_type = obs.modality.threat_type();
        let confidence = (obs.probability * 100.0).round();
        ThreatRecord {
            id: format!("threat-{}", Uuid::new_v4()),
            threat_type,
            severity: severity_for(obs.probability),
            confidence,
            lat: obs.lat,
            lng: obs.lng,
            source: obs.modality,
            description: format!("Detected {} with {confidence}% confidence", obs.label),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn record_pattern(&mut self, record: &ThreatRecord) {
        let key = format!("{}_{:?}", record.threat_type, record.source);
        let pattern = self.patterns.entry(key).or_default();
        pattern.count += 1;
        pattern.last_seen = record.timestamp;
        pattern.locations.push((record.lat, record.lng));
        // Cap remembered locations so long-running patterns stay bounded.
        if pattern.locations.len() > 100 {
            let keep = pattern.locations.split_off(pattern.locations.len() - 50);
            pattern.locations = keep;
        }
    }

    /// One analysis tick: flag frequency and clustering anomalies as
    /// system-level events. Returns the anomalies raised.
    pub fn analyze_patterns(&mut self) -> usize {
        let now = chrono::Utc::now().timestamp_millis();
        let window_ms = self.config.pattern_window.as_millis() as i64;
        let mut raised = 0;

        for (key, pattern) in &self.patterns {
            if pattern.count > self.config.frequency_threshold && now - pattern.last_seen < window_ms {
                self.bus.publish(Event::new(
                    EventKind::AnomalyDetected,
                    json!({
                        "anomaly": "HIGH_FREQUENCY",
                        "pattern": key,
                        "count": pattern.count,
                        "severity": Severity::Medium,
                    }),
                    Target::all(),
                ));
                raised += 1;
            }

            let clustering = clustering_coefficient(&pattern.locations);
            if pattern.locations.len() > 5 && clustering > self.config.clustering_threshold {
                self.bus.publish(Event::new(
                    EventKind::AnomalyDetected,
                    json!({
                        "anomaly": "CLUSTERING",
                        "pattern": key,
                        "clustering": clustering,
                        "severity": Severity::High,
                    }),
                    Target::all(),
                ));
                raised += 1;
            }
        }
        if raised > 0 {
            info!("pattern analysis flagged {raised} anomalies");
        }
        raised
    }

    /// Decay confidence of records older than the window, drop the ones that
    /// fell below the floor, and enforce the population cap (oldest first).
    pub fn decay_and_prune(&mut self) {
        let now = chrono::Utc::now().timestamp_millis();
        let window_ms = self.config.pattern_window.as_millis() as i64;
        let decay = self.config.confidence_decay;
        let floor = self.config.min_confidence;

        for threat in self.threats.values_mut() {
            if now - threat.timestamp > window_ms {
                threat.confidence *= decay;
            }
        }
        self.threats.retain(|_, t| t.confidence >= floor);

        if self.threats.len() > self.config.max_threats {
            let mut by_age: Vec<(String, i64)> = self
                .threats
                .iter()
                .map(|(id, t)| (id.clone(), t.timestamp))
                .collect();
            by_age.sort_by_key(|(_, ts)| *ts);
            let excess = self.threats.len() - self.config.max_threats;
            for (id, _) in by_age.into_iter().take(excess) {
                self.threats.remove(&id);
            }
        }
    }

    /// Run the scan and analysis loops until the task is aborted.
    pub async fn run(mut self) {
        let mut scan = tokio::time::interval(self.config.scan_interval);
        let mut analyze = tokio::time::interval(self.config.analysis_interval);
        // Consume the immediate first ticks.
        scan.tick().await;
        analyze.tick().await;
        info!("threat scanner started");
        loop {
            tokio::select! {
                _ = scan.tick() => {
                    self.scan();
                }
                _ = analyze.tick() => {
                    self.analyze_patterns();
                }
            }
        }
    }
}

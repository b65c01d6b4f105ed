//! Event producers. Each adapter is a pure event source: it publishes typed
//! events onto the bus with no knowledge of who is subscribed or how
//! delivery happens.
//!
//! - `alerts`: create/update notifications handed over by the CRUD layer.
//! - `radar`: detection ingestion, anomaly scoring and the chained
//!   AI-insight classifier.
//! - `scanner`: the periodic simulated sensor scan and pattern analysis.

pub mod alerts;
pub mod radar;
pub mod scanner;

use serde::{Deserialize, Serialize};

/// Qualitative severity level shared by alerts, radar insights and scanner
/// threats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

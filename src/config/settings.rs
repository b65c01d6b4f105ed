use serde::Deserialize;

use crate::producers::scanner::ScannerConfig;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub liveness: LivenessSettings,
    pub scanner: ScannerSettings,
}

/// Bind addresses for the duplex observer endpoint and the simplex radar
/// stream.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub radar_port: u16,
}

/// Shared secret for handshake token verification.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
}

/// Liveness monitor tuning. One missed probe cycle evicts, so the interval
/// is also the eviction timeout.
#[derive(Debug, Deserialize, Clone)]
pub struct LivenessSettings {
    pub interval_secs: u64,
}

/// Simulated sensor scan and pattern analysis tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct ScannerSettings {
    pub scan_interval_secs: u64,
    pub analysis_interval_secs: u64,
    pub threat_threshold: f64,
    pub frequency_threshold: usize,
    pub pattern_window_secs: u64,
    pub clustering_threshold: f64,
    pub confidence_decay: f64,
    pub min_confidence: f64,
    pub max_threats: usize,
}

impl ScannerSettings {
    pub fn to_config(&self) -> ScannerConfig {
        ScannerConfig {
            scan_interval: std::time::Duration::from_secs(self.scan_interval_secs),
            analysis_interval: std::time::Duration::from_secs(self.analysis_interval_secs),
            threat_threshold: self.threat_threshold,
            frequency_threshold: self.frequency_threshold,
            pattern_window: std::time::Duration::from_secs(self.pattern_window_secs),
            clustering_threshold: self.clustering_threshold,
            confidence_decay: self.confidence_decay,
            min_confidence: self.min_confidence,
            max_threats: self.max_threats,
        }
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub liveness: Option<PartialLivenessSettings>,
    pub scanner: Option<PartialScannerSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub radar_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialAuthSettings {
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLivenessSettings {
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialScannerSettings {
    pub scan_interval_secs: Option<u64>,
    pub analysis_interval_secs: Option<u64>,
    pub threat_threshold: Option<f64>,
    pub frequency_threshold: Option<usize>,
    pub pattern_window_secs: Option<u64>,
    pub clustering_threshold: Option<f64>,
    pub confidence_decay: Option<f64>,
    pub min_confidence: Option<f64>,
    pub max_threats: Option<usize>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                radar_port: 8081,
            },
            auth: AuthSettings {
                jwt_secret: "change-me".to_string(),
            },
            liveness: LivenessSettings { interval_secs: 30 },
            scanner: ScannerSettings {
                scan_interval_secs: 5,
                analysis_interval_secs: 60,
                threat_threshold: 0.7,
                frequency_threshold: 10,
                pattern_window_secs: 300,
                clustering_threshold: 0.8,
                confidence_decay: 0.95,
                min_confidence: 30.0,
                max_threats: 1000,
            },
        }
    }
}

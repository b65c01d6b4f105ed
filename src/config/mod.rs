mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AuthSettings, LivenessSettings, ScannerSettings, ServerSettings, Settings,
};

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing all sections
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    let server = partial.server.as_ref();
    let auth = partial.auth.as_ref();
    let liveness = partial.liveness.as_ref();
    let scanner = partial.scanner.as_ref();

    Ok(Settings {
        server: ServerSettings {
            host: server
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server.and_then(|s| s.port).unwrap_or(default.server.port),
            radar_port: server
                .and_then(|s| s.radar_port)
                .unwrap_or(default.server.radar_port),
        },
        auth: AuthSettings {
            jwt_secret: auth
                .and_then(|a| a.jwt_secret.clone())
                .unwrap_or(default.auth.jwt_secret),
        },
        liveness: LivenessSettings {
            interval_secs: liveness
                .and_then(|l| l.interval_secs)
                .unwrap_or(default.liveness.interval_secs),
        },
        scanner: ScannerSettings {
            scan_interval_secs: scanner
                .and_then(|s| s.scan_interval_secs)
                .unwrap_or(default.scanner.scan_interval_secs),
            analysis_interval_secs: scanner
                .and_then(|s| s.analysis_interval_secs)
                .unwrap_or(default.scanner.analysis_interval_secs),
            threat_threshold: scanner
                .and_then(|s| s.threat_threshold)
                .unwrap_or(default.scanner.threat_threshold),
            frequency_threshold: scanner
                .and_then(|s| s.frequency_threshold)
                .unwrap_or(default.scanner.frequency_threshold),
            pattern_window_secs: scanner
                .and_then(|s| s.pattern_window_secs)
                .unwrap_or(default.scanner.pattern_window_secs),
            clustering_threshold: scanner
                .and_then(|s| s.clustering_threshold)
                .unwrap_or(default.scanner.clustering_threshold),
            confidence_decay: scanner
                .and_then(|s| s.confidence_decay)
                .unwrap_or(default.scanner.confidence_decay),
            min_confidence: scanner
                .and_then(|s| s.min_confidence)
                .unwrap_or(default.scanner.min_confidence),
            max_threats: scanner
                .and_then(|s| s.max_threats)
                .unwrap_or(default.scanner.max_threats),
        },
    })
}

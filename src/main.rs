//! CLI for the Aegis event hub.
//!
//! Subcommands:
//! - `server`: run the WebSocket hub with all background tasks

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use aegis_hub::bus::EventBus;
use aegis_hub::config::load_config;
use aegis_hub::fanout;
use aegis_hub::hub::{Hub, liveness};
use aegis_hub::producers::scanner::{SimulatedSensors, ThreatScanner};
use aegis_hub::transport::auth::{Authenticator, JwtAuthenticator};
use aegis_hub::transport::radar_stream::start_radar_stream_server;
use aegis_hub::transport::websocket::start_websocket_server;
use aegis_hub::utils;
use aegis_hub::utils::error::HubError;

#[derive(Parser)]
#[command(name = "aegis-hub")]
enum Command {
    /// Start the event hub server
    Server,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    utils::logging::init("info");

    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {e}");
            }
        }
    }
}

async fn run_server() -> Result<(), HubError> {
    let config = load_config()?;
    let hub = Arc::new(Mutex::new(Hub::new()));
    let auth: Arc<dyn Authenticator> = Arc::new(JwtAuthenticator::new(config.auth.jwt_secret.clone()));
    let (bus, events) = EventBus::channel();

    tokio::spawn(fanout::run(events, hub.clone()));
    tokio::spawn(liveness::run(
        hub.clone(),
        Duration::from_secs(config.liveness.interval_secs),
    ));

    let scanner = ThreatScanner::new(
        bus.clone(),
        Box::new(SimulatedSensors),
        config.scanner.to_config(),
    );
    tokio::spawn(scanner.run());

    let radar_addr = format!("{}:{}", config.server.host, config.server.radar_port);
    tokio::spawn(start_radar_stream_server(radar_addr, hub.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tokio::select! {
        result = start_websocket_server(addr, hub, auth, bus) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

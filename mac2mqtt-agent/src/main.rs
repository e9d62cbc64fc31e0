//! mac2mqtt-agent - bridges a Mac's local state to an MQTT broker
//!
//! The agent announces Home Assistant discovery metadata for the host's
//! volume, mute, battery and power controls, routes inbound command
//! messages to the OS, and publishes fresh host state both periodically
//! and after every command.

mod commands;
mod config;
mod discovery;
mod host;
mod identity;
mod mqtt;
mod scheduler;
mod session;
mod state;
#[cfg(test)]
mod test_support;
mod topics;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::{CommandRouter, SETTLE_DELAY};
use config::BridgeConfig;
use discovery::DiscoveryPublisher;
use host::{HostControls, MacControls};
use identity::{BridgeContext, HostIdentity};
use mqtt::{MessageSink, MqttSink};
use session::{Session, Supervisor};
use state::StatePublisher;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("mac2mqtt-agent {} starting", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = BridgeConfig::load(config_path.as_deref())
        .await
        .context("failed to load configuration")?;

    let identity = HostIdentity::discover()
        .await
        .context("failed to derive host identity")?;
    info!("host identity: {} (model {})", identity.id(), identity.model());
    let ctx = Arc::new(BridgeContext::new(identity));

    let client_id = format!("mac2mqtt-{}", ctx.identity.id());
    let session = Session::connect(&config, &client_id)
        .await
        .context("initial broker connection failed")?;
    info!("connected to {}:{}", config.mqtt_ip, config.mqtt_port);

    let sink: Arc<dyn MessageSink> = Arc::new(MqttSink::new(session.client()));
    let host: Arc<dyn HostControls> = Arc::new(MacControls);
    let publisher = Arc::new(StatePublisher::new(
        Arc::clone(&sink),
        Arc::clone(&host),
        Arc::clone(&ctx),
    ));
    let router = Arc::new(CommandRouter::new(
        Arc::clone(&host),
        Arc::clone(&publisher),
        SETTLE_DELAY,
    ));
    let discovery = DiscoveryPublisher::new(Arc::clone(&sink), Arc::clone(&ctx));

    let (supervisor, link) = Supervisor::new(session, sink, discovery, router, Arc::clone(&ctx));
    tokio::spawn(scheduler::run(publisher, link));

    tokio::select! {
        () = supervisor.run() => {}
        _ = tokio::signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
    }

    Ok(())
}

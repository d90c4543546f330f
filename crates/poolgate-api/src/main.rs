//! `poolgate` binary entrypoint.
//!
//! Loads configuration from environment variables, wires the stores, the
//! MQTT link, and the decision engine together, and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use poolgate_api::config::Config;
use poolgate_api::mqtt;
use poolgate_api::mqtt::MqttPublisher;
use poolgate_api::server::{AppState, Server};
use poolgate_core::decision::DecisionEngine;
use poolgate_core::observability::{LogFormat, init_logging};
use poolgate_core::occupancy::OccupancyState;
use poolgate_core::store::{MemoryStore, OccupancyStore};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(choose_log_format(&config));

    // The durable stores are external collaborators behind the store traits;
    // this binary ships with the in-memory backend wired in.
    tracing::warn!("using in-memory stores; occupancy and audit data will not survive a restart");
    let store = Arc::new(MemoryStore::new());

    let occupancy_store: Arc<dyn OccupancyStore> = store.clone();
    let occupancy = Arc::new(OccupancyState::new(Arc::clone(&occupancy_store)));
    occupancy.seed().await;

    let (link, event_loop) = mqtt::connect(&config.mqtt);
    tokio::spawn(mqtt::run(
        link.clone(),
        event_loop,
        Arc::clone(&occupancy),
        config.telemetry_topic.clone(),
    ));
    tracing::info!(
        host = %config.mqtt.host,
        port = config.mqtt.port,
        telemetry_topic = %config.telemetry_topic,
        command_topic_base = %config.command_topic_base,
        "mqtt link starting"
    );

    let publisher = Arc::new(MqttPublisher::new(
        link,
        config.command_topic_base.clone(),
        Duration::from_secs(config.mqtt.publish_timeout_secs),
    ));
    let engine = Arc::new(DecisionEngine::new(store.clone(), occupancy));

    let state = AppState::new(config, engine, publisher, occupancy_store, store);
    Server::new(state).serve().await?;
    Ok(())
}

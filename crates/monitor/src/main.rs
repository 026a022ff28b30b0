//! Heart-rate monitor - telemetry anomaly detection agent
//!
//! Polls a remote telemetry channel for heart-rate readings and classifies
//! each new reading against clinical thresholds and recent history.

use anyhow::{Context, Result};
use monitor_lib::{
    api,
    feed::ThingSpeakClient,
    health::{components, HealthRegistry},
    monitor::MonitorLoopBuilder,
    observability::{MonitorMetrics, StructuredLogger},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting hr-monitor");

    let config = config::MonitorConfig::load()?;
    info!(
        channel = %config.channel_id,
        poll_interval_secs = config.poll_interval_secs,
        "Monitor configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::FEED).await;
    health_registry
        .detector_progress(0, config.min_samples)
        .await;

    let metrics = MonitorMetrics::new();

    let logger = StructuredLogger::new(&config.channel_id);
    logger.log_startup(MONITOR_VERSION, config.window_size);

    let client = ThingSpeakClient::new(config.feed_config())
        .context("Failed to create feed client")?;

    let monitor = MonitorLoopBuilder::new()
        .source(Arc::new(client))
        .detector_config(config.detector_config())
        .health(health_registry.clone())
        .interval(config.poll_interval())
        .field(config.field.clone())
        .build()?;

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server failed");
        }
    });

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    // Receiver may already be gone if the loop exited
    let _ = shutdown_tx.send(());
    monitor_handle.await.context("Polling loop panicked")?;

    info!("Shutting down");
    Ok(())
}

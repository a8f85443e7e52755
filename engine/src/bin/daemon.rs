//! Engine supervisor daemon
//!
//! Loads the engine document named by `XRAY_CONFIG_FILE`, starts the engine
//! with an empty user directory and keeps it supervised until interrupted.

#[path = "daemon/config.rs"]
mod config;

use anyhow::{anyhow, Context};
use config::DaemonConfig;
use gate_engine::domain::XrayConfig;
use gate_engine::{Backend, XrayBackend};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config.validate().map_err(|e| anyhow!(e))?;

    let config_file = config
        .config_file
        .clone()
        .context("XRAY_CONFIG_FILE is required")?;
    let document = tokio::fs::read(&config_file)
        .await
        .with_context(|| format!("Failed to read {}", config_file.display()))?;
    let xray_config = XrayConfig::from_json(&document, &config.exclude_inbounds)
        .context("Invalid engine configuration")?;

    info!(
        executable = %config.executable_path.display(),
        config_file = %config_file.display(),
        excluded = ?config.exclude_inbounds,
        debug = config.debug,
        "Starting engine supervisor"
    );

    let backend = XrayBackend::start(xray_config, &[], config.backend_settings())
        .await
        .context("Failed to start engine")?;
    info!(version = %backend.version(), "Engine supervisor running");

    shutdown_signal().await;
    info!("Shutting down engine supervisor");
    backend.shutdown().await;

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

//! Startup readiness check driven by the engine's own log output

use crate::domain::value_objects::{LogLine, Severity};
use crate::domain::{DomainError, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

const FAILURE_MARKER: &str = "Failed to start";

/// What a single output line says about startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupSignal {
    Started,
    Failed(String),
    Pending,
}

/// Classify one line of engine output against the expected version
pub fn startup_signal(line: &str, version: &str) -> StartupSignal {
    if line.contains("core:") && line.contains(&format!("Xray {}", version)) && line.contains("started")
    {
        return StartupSignal::Started;
    }

    match LogLine::parse(line) {
        Some(parsed) if parsed.severity == Severity::Error || parsed.message.contains(FAILURE_MARKER) => {
            StartupSignal::Failed(parsed.message.to_string())
        }
        Some(_) => StartupSignal::Pending,
        None if line.contains(FAILURE_MARKER) => StartupSignal::Failed(line.to_string()),
        None => StartupSignal::Pending,
    }
}

/// Consume engine output until it reports a successful start or a failure.
///
/// Fails with `StartupTimeout` when neither marker shows up within `limit`.
pub async fn wait_for_startup(
    logs: &mut mpsc::Receiver<String>,
    version: &str,
    limit: Duration,
) -> Result<()> {
    let watch = async {
        while let Some(line) = logs.recv().await {
            match startup_signal(&line, version) {
                StartupSignal::Started => {
                    debug!(version = %version, "Engine reported started");
                    return Ok(());
                }
                StartupSignal::Failed(reason) => return Err(DomainError::StartupFailed(reason)),
                StartupSignal::Pending => {}
            }
        }
        Err(DomainError::StartupFailed("engine output closed".to_string()))
    };

    timeout(limit, watch)
        .await
        .map_err(|_| DomainError::StartupTimeout)?
}

//! Domain-level errors

use thiserror::Error;

/// One inbound whose live update failed during a single-user sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundSyncFailure {
    pub tag: String,
    pub reason: String,
}

#[derive(Debug, Error, Clone)]
pub enum DomainError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Log config is empty")]
    MissingLogConfig,

    // Process control errors
    #[error("Failed to spawn engine: {0}")]
    SpawnFailed(String),

    #[error("Could not parse engine version: {0}")]
    VersionUnparsable(String),

    #[error("Engine is started already")]
    AlreadyStarted,

    #[error("Engine is already restarting")]
    AlreadyRestarting,

    #[error("Failed to start engine: {0}")]
    StartupFailed(String),

    #[error("Failed to start engine: timed out waiting for startup")]
    StartupTimeout,

    #[error("Failed to terminate process {pid}: {reason}")]
    TerminationFailed { pid: u32, reason: String },

    // Control API errors
    #[error("Engine API error: {0}")]
    Api(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid account for '{email}': {reason}")]
    InvalidAccount { email: String, reason: String },

    #[error("Failed to sync user on {}", format_failures(.0))]
    UserSyncFailed(Vec<InboundSyncFailure>),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DomainError {
    /// Lookup failures that the controller layer reports as "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(_))
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}

fn format_failures(failures: &[InboundSyncFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("inbound '{}': {}", f.tag, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, DomainError>;

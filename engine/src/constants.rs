//! Application-wide constants and default values
//!
//! Centralizes magic numbers and default configurations for better maintainability

/// Engine process lifecycle defaults
pub mod process {
    /// Grace period between SIGTERM and a forced tree kill (seconds)
    pub const STOP_GRACE_PERIOD_SEC: u64 = 5;

    /// Number of liveness polls after a forced kill
    pub const KILL_VERIFY_ATTEMPTS: u32 = 10;

    /// Delay between liveness polls (milliseconds)
    pub const KILL_VERIFY_INTERVAL_MS: u64 = 100;

    /// Environment variable carrying the asset bundle directory
    pub const ASSET_LOCATION_ENV: &str = "XRAY_LOCATION_ASSET";

    /// File name of the pretty-printed config dump written in debug mode
    pub const GENERATED_CONFIG_FILE: &str = "xray.json";

    /// Default capacity of the live log tail
    pub const DEFAULT_LOG_BUFFER_SIZE: usize = 1000;
}

/// Startup readiness defaults
pub mod startup {
    /// Maximum time to wait for the "started" marker (seconds)
    pub const READY_TIMEOUT_SEC: u64 = 10;

    /// Delay before the health loop takes its first check (seconds)
    pub const HEALTH_START_DELAY_SEC: u64 = 1;
}

/// Health check defaults
pub mod health_check {
    /// Interval between checks (seconds)
    pub const DEFAULT_INTERVAL: u64 = 5;

    /// Timeout for a single system-stats check (seconds)
    pub const DEFAULT_TIMEOUT: u64 = 3;

    /// Consecutive failures that trigger a restart
    pub const DEFAULT_MAX_FAILURES: u32 = 3;
}

/// Administrative API wiring inside the engine configuration
pub mod api {
    /// Tag of the loopback administrative inbound
    pub const INBOUND_TAG: &str = "API_INBOUND";

    /// Tag of the administrative outbound / api block
    pub const OUTBOUND_TAG: &str = "API";

    /// Loopback address the administrative inbound binds to
    pub const LISTEN_ADDR: &str = "127.0.0.1";

    /// Services enabled on the administrative API
    pub const SERVICES: [&str; 3] = ["HandlerService", "LoggerService", "StatsService"];
}

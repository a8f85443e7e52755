//! Daemon configuration from environment variables
//!
//! All configuration is read from environment variables with defaults,
//! so the daemon needs no command-line parsing.

use gate_engine::constants::process::DEFAULT_LOG_BUFFER_SIZE;
use gate_engine::infrastructure::CoreSettings;
use gate_engine::BackendSettings;
use std::env;
use std::path::PathBuf;

const DEFAULT_EXECUTABLE_PATH: &str = "/usr/local/bin/xray";
const DEFAULT_ASSETS_PATH: &str = "/usr/local/share/xray";
const DEFAULT_GENERATED_CONFIG_PATH: &str = "/var/lib/gate/generated/";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Daemon configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Engine executable
    pub executable_path: PathBuf,

    /// Asset bundle directory handed to the engine
    pub assets_path: PathBuf,

    /// Where the generated config is dumped in debug mode
    pub generated_config_path: PathBuf,

    /// Engine JSON document to supervise
    pub config_file: Option<PathBuf>,

    /// Inbound tags never touched by user sync
    pub exclude_inbounds: Vec<String>,

    /// Administrative API port; 0 picks a free one
    pub api_port: u16,

    /// Live log tail capacity
    pub log_buffer_size: usize,

    pub debug: bool,

    pub log_level: String,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            executable_path: Self::parse_path("XRAY_EXECUTABLE_PATH", DEFAULT_EXECUTABLE_PATH),
            assets_path: Self::parse_path("XRAY_ASSETS_PATH", DEFAULT_ASSETS_PATH),
            generated_config_path: Self::parse_path(
                "GENERATED_CONFIG_PATH",
                DEFAULT_GENERATED_CONFIG_PATH,
            ),
            config_file: env::var("XRAY_CONFIG_FILE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            exclude_inbounds: Self::parse_list("XRAY_EXCLUDE_INBOUNDS"),
            api_port: env::var("XRAY_API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            log_buffer_size: env::var("LOG_BUFFER_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LOG_BUFFER_SIZE),
            debug: Self::parse_bool("DEBUG", false),
            log_level: Self::parse_log_level(),
        }
    }

    fn parse_path(var_name: &str, default: &str) -> PathBuf {
        env::var(var_name)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string())
            .into()
    }

    fn parse_list(var_name: &str) -> Vec<String> {
        env::var(var_name)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse_bool(var_name: &str, default: bool) -> bool {
        env::var(var_name)
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }

    fn parse_log_level() -> String {
        // Priority: GATE_LOG_LEVEL > RUST_LOG > default
        env::var("GATE_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.config_file.is_none() {
            return Err("XRAY_CONFIG_FILE is required".to_string());
        }
        if self.log_buffer_size == 0 {
            return Err("LOG_BUFFER_SIZE must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn backend_settings(&self) -> BackendSettings {
        let core = CoreSettings::new(
            &self.executable_path,
            &self.assets_path,
            &self.generated_config_path,
        )
        .with_log_buffer_size(self.log_buffer_size);

        BackendSettings::new(core)
            .with_api_port(self.api_port)
            .with_debug(self.debug)
    }
}

//! Shared fixtures for backend integration tests
//!
//! The engine binary is replaced by a shell script that answers `version`,
//! stores the document it receives on stdin next to itself and then idles.

#![allow(dead_code)]

use async_trait::async_trait;
use gate_engine::domain::entities::Account;
use gate_engine::domain::ports::EngineApi;
use gate_engine::domain::value_objects::{OnlineIpList, OnlineStat, RawStat, SysStats};
use gate_engine::domain::{DomainError, Result, XrayConfig};
use gate_engine::infrastructure::{default_process_control, CoreSettings};
use gate_engine::application::{BackendPorts, BackendSettings};
use gate_engine::domain::HealthPolicy;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const VERSION: &str = "1.8.24";
pub const RECEIVED_CONFIG: &str = "received.json";
pub const VLESS_ID: &str = "5a2f7a4e-8e3b-4c7d-9f10-2b6c1d3e4f50";

/// How the fake engine behaves after reading its configuration
#[derive(Debug, Clone, Copy)]
pub enum FakeEngine {
    /// Reports a successful start and keeps running
    Healthy,
    /// Reports a startup error and exits
    Failing,
    /// Never reports anything
    Silent,
}

impl FakeEngine {
    fn after_config(self) -> String {
        match self {
            FakeEngine::Healthy => format!(
                "echo \"$(date '+%Y/%m/%d %H:%M:%S') [Warning] core: Xray {} started\"\nexec sleep 60",
                VERSION
            ),
            FakeEngine::Failing => "echo \"$(date '+%Y/%m/%d %H:%M:%S') [Error] Failed to start: listen tcp :443: bind: address already in use\"\nexit 1".to_string(),
            FakeEngine::Silent => "exec sleep 60".to_string(),
        }
    }
}

/// Write the fake engine script into `dir` and return its path
pub fn write_fake_engine(dir: &Path, behavior: FakeEngine) -> PathBuf {
    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"version\" ]; then\n\
         echo \"Xray {version} (Xray, Penetrates Everything.) 6baad79 (go1.22.5 linux/amd64)\"\n\
         exit 0\n\
         fi\n\
         cat > \"$(dirname \"$0\")/{received}\"\n\
         {after}\n",
        version = VERSION,
        received = RECEIVED_CONFIG,
        after = behavior.after_config(),
    );

    let path = dir.join("xray");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Engine document with two managed inbounds and one excluded inbound
pub fn engine_config(log_dir: &Path) -> XrayConfig {
    let document = serde_json::json!({
        "log": {
            "loglevel": "warning",
            "access": log_dir.join("access.log"),
            "error": log_dir.join("error.log"),
        },
        "inbounds": [
            {
                "tag": "VLESS",
                "protocol": "vless",
                "port": 443,
                "settings": {"clients": [], "decryption": "none"},
                "streamSettings": {"network": "tcp", "security": "reality"}
            },
            {
                "tag": "TROJAN",
                "protocol": "trojan",
                "port": 8443,
                "settings": {"clients": []}
            },
            {
                "tag": "MANUAL",
                "protocol": "vmess",
                "port": 8080,
                "settings": {"clients": [{"id": VLESS_ID, "email": "manual@local"}]}
            }
        ],
        "outbounds": [{"protocol": "freedom", "tag": "DIRECT"}]
    });
    XrayConfig::from_json(document.to_string().as_bytes(), &["MANUAL"]).unwrap()
}

/// Settings pointing at the fake engine inside `dir`, with fast timings
pub fn backend_settings(dir: &TempDir, executable: PathBuf) -> BackendSettings {
    let core = CoreSettings::new(executable, dir.path().join("assets"), dir.path().join("generated"));
    BackendSettings::new(core)
        .with_startup_timeout(Duration::from_secs(5))
        .with_health(HealthPolicy::default().with_start_delay(Duration::from_secs(60)))
}

pub fn ports(api: Arc<RecordingApi>) -> BackendPorts {
    BackendPorts {
        process_control: default_process_control(),
        api: Some(api),
    }
}

/// Read the document the fake engine received, waiting for it to appear
pub async fn received_config(dir: &Path) -> serde_json::Value {
    let path = dir.join(RECEIVED_CONFIG);
    for _ in 0..50 {
        if let Ok(bytes) = std::fs::read(&path) {
            if let Ok(value) = serde_json::from_slice(&bytes) {
                return value;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("engine never received a configuration");
}

/// Emails of the clients rendered for inbound `tag`
pub fn rendered_emails(document: &serde_json::Value, tag: &str) -> Vec<String> {
    document["inbounds"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["tag"] == tag)
        .and_then(|i| i["settings"]["clients"].as_array())
        .map(|clients| {
            clients
                .iter()
                .filter_map(|c| c["email"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Engine API double recording live operations
#[derive(Default)]
pub struct RecordingApi {
    pub calls: Mutex<Vec<String>>,
    pub unhealthy: AtomicBool,
}

impl RecordingApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EngineApi for RecordingApi {
    async fn add_inbound_user(&self, tag: &str, account: &Account) -> Result<()> {
        self.record(format!("add {} {}", tag, account.email()));
        Ok(())
    }

    async fn remove_inbound_user(&self, tag: &str, email: &str) -> Result<()> {
        self.record(format!("remove {} {}", tag, email));
        Ok(())
    }

    async fn add_outbound_user(&self, _tag: &str, _account: &Account) -> Result<()> {
        Ok(())
    }

    async fn remove_outbound_user(&self, _tag: &str, _email: &str) -> Result<()> {
        Ok(())
    }

    async fn sys_stats(&self) -> Result<SysStats> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(DomainError::Api("connection refused".to_string()));
        }
        Ok(SysStats::default())
    }

    async fn query_stats(&self, _pattern: &str, _reset: bool) -> Result<Vec<RawStat>> {
        Ok(Vec::new())
    }

    async fn stats_online(&self, name: &str) -> Result<OnlineStat> {
        Err(DomainError::NotFound(name.to_string()))
    }

    async fn stats_online_ip_list(&self, name: &str) -> Result<OnlineIpList> {
        Err(DomainError::NotFound(name.to_string()))
    }
}

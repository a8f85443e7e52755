//! In-memory model of the engine's declarative configuration
//!
//! Only the blocks the agent reasons about are typed (log, routing, policy,
//! api, inbounds). Every other top-level block and every unknown field inside
//! the typed ones is carried through untouched so that serialization is
//! lossless.

use crate::constants::api;
use crate::domain::entities::inbound::{ClientList, Inbound, InboundDocument};
use crate::domain::{DomainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLockReadGuard;

/// Log levels too quiet for the startup check to observe
const QUIET_LOG_LEVELS: [&str; 2] = ["none", "error"];
const STARTUP_LOG_LEVEL: &str = "warning";
const DISABLED_LOG_PATH: &str = "none";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loglevel: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub rules: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelPolicy {
    #[serde(rename = "statsUserUplink", default, skip_serializing_if = "Option::is_none")]
    pub stats_user_uplink: Option<bool>,
    #[serde(rename = "statsUserDownlink", default, skip_serializing_if = "Option::is_none")]
    pub stats_user_downlink: Option<bool>,
    #[serde(rename = "statsUserOnline", default, skip_serializing_if = "Option::is_none")]
    pub stats_user_online: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemPolicy {
    #[serde(rename = "statsInboundUplink", default, skip_serializing_if = "Option::is_none")]
    pub stats_inbound_uplink: Option<bool>,
    #[serde(rename = "statsInboundDownlink", default, skip_serializing_if = "Option::is_none")]
    pub stats_inbound_downlink: Option<bool>,
    #[serde(rename = "statsOutboundUplink", default, skip_serializing_if = "Option::is_none")]
    pub stats_outbound_uplink: Option<bool>,
    #[serde(rename = "statsOutboundDownlink", default, skip_serializing_if = "Option::is_none")]
    pub stats_outbound_downlink: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub levels: BTreeMap<String, LevelPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPolicy>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PolicyConfig {
    /// Enable per-user and outbound traffic accounting, leaving other flags as declared
    fn enable_accounting(&mut self) {
        let level = self.levels.entry("0".to_string()).or_default();
        level.stats_user_uplink = Some(true);
        level.stats_user_downlink = Some(true);

        let system = self.system.get_or_insert_with(|| SystemPolicy {
            stats_inbound_uplink: Some(false),
            stats_inbound_downlink: Some(false),
            ..Default::default()
        });
        system.stats_outbound_uplink = Some(true);
        system.stats_outbound_downlink = Some(true);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire form of the whole document
#[derive(Debug, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log: Option<LogConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api: Option<ApiConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    routing: Option<RoutingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    policy: Option<PolicyConfig>,
    #[serde(default)]
    inbounds: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stats: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// File destinations of captured engine output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFiles {
    pub access: Option<PathBuf>,
    pub error: Option<PathBuf>,
}

/// Document ready to be piped into the engine, plus where its logs should go
#[derive(Debug, Clone)]
pub struct EngineDocument {
    pub bytes: Vec<u8>,
    pub log_files: LogFiles,
}

#[derive(Debug)]
pub struct XrayConfig {
    pub log: Option<LogConfig>,
    pub api: Option<ApiConfig>,
    pub routing: Option<RoutingConfig>,
    pub policy: Option<PolicyConfig>,
    pub stats: Option<Value>,
    inbounds: Vec<Inbound>,
    extra: Map<String, Value>,
}

impl XrayConfig {
    /// Parse an engine configuration, flagging inbounds whose tag is in `excluded`
    pub fn from_json<S: AsRef<str>>(document: &[u8], excluded: &[S]) -> Result<Self> {
        let doc: ConfigDocument = serde_json::from_slice(document)
            .map_err(|e| DomainError::InvalidConfiguration(e.to_string()))?;

        let excluded: HashSet<&str> = excluded.iter().map(AsRef::as_ref).collect();
        let inbounds = doc
            .inbounds
            .into_iter()
            .map(|raw| {
                let inbound: InboundDocument = serde_json::from_value(raw)
                    .map_err(|e| DomainError::InvalidConfiguration(format!("inbound: {}", e)))?;
                let is_excluded = excluded.contains(inbound.tag.as_str());
                Ok(Inbound::from_document(inbound, is_excluded))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            log: doc.log,
            api: doc.api,
            routing: doc.routing,
            policy: doc.policy,
            stats: doc.stats,
            inbounds,
            extra: doc.extra,
        })
    }

    pub fn inbounds(&self) -> &[Inbound] {
        &self.inbounds
    }

    pub fn inbound(&self, tag: &str) -> Option<&Inbound> {
        self.inbounds.iter().find(|i| i.tag() == tag)
    }

    /// Install the loopback administrative listener and its routing rule.
    ///
    /// Any previous administrative inbound and any rule targeting the
    /// administrative outbound are dropped first, so repeated calls converge.
    pub fn apply_api(&mut self, port: u16) {
        self.inbounds.retain(|i| i.tag() != api::INBOUND_TAG);

        self.api = Some(ApiConfig {
            tag: api::OUTBOUND_TAG.to_string(),
            services: api::SERVICES.iter().map(|s| s.to_string()).collect(),
            extra: self.api.take().map(|a| a.extra).unwrap_or_default(),
        });

        let routing = self.routing.get_or_insert_with(RoutingConfig::default);
        routing.rules.retain(|rule| !is_admin_rule(rule));
        routing.rules.insert(
            0,
            json!({
                "inboundTag": [api::INBOUND_TAG],
                "source": [api::LISTEN_ADDR],
                "outboundTag": api::OUTBOUND_TAG,
                "type": "field",
            }),
        );

        self.policy
            .get_or_insert_with(PolicyConfig::default)
            .enable_accounting();

        self.inbounds.insert(0, Inbound::admin(port));

        if self.stats.is_none() {
            self.stats = Some(json!({}));
        }
    }

    /// Full lossless document including the current client lists.
    ///
    /// Every inbound's list is read-locked for the whole render so the
    /// result is a consistent snapshot.
    pub fn to_value(&self) -> Result<Value> {
        let guards: Vec<RwLockReadGuard<'_, ClientList>> =
            self.inbounds.iter().map(Inbound::read_clients).collect();

        let inbounds = self
            .inbounds
            .iter()
            .zip(guards.iter())
            .map(|(inbound, clients)| inbound.to_value_with(clients))
            .collect::<Result<Vec<_>>>()?;
        drop(guards);

        let doc = ConfigDocument {
            log: self.log.clone(),
            api: self.api.clone(),
            routing: self.routing.clone(),
            policy: self.policy.clone(),
            inbounds,
            stats: self.stats.clone(),
            extra: self.extra.clone(),
        };
        serde_json::to_value(doc).map_err(|e| DomainError::InvalidConfiguration(e.to_string()))
    }

    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.to_value()?)
            .map_err(|e| DomainError::InvalidConfiguration(e.to_string()))
    }

    /// Log destinations declared in the log block
    pub fn log_files(&self) -> LogFiles {
        let to_path = |p: &Option<String>| {
            p.as_deref()
                .filter(|p| !p.is_empty() && *p != DISABLED_LOG_PATH)
                .map(PathBuf::from)
        };
        match &self.log {
            Some(log) => LogFiles {
                access: to_path(&log.access),
                error: to_path(&log.error),
            },
            None => LogFiles::default(),
        }
    }

    /// Render the document the engine is started with.
    ///
    /// The engine's own file logging is disabled and quiet levels are raised to
    /// warning, since readiness is detected from its output. The model itself
    /// is not modified.
    pub fn engine_document(&self) -> Result<EngineDocument> {
        if self.log.is_none() {
            return Err(DomainError::MissingLogConfig);
        }
        let log_files = self.log_files();

        let mut value = self.to_value()?;
        if let Some(log) = value.get_mut("log").and_then(Value::as_object_mut) {
            log.insert("access".to_string(), json!(""));
            log.insert("error".to_string(), json!(""));
            let quiet = log
                .get("loglevel")
                .and_then(Value::as_str)
                .map(|level| QUIET_LOG_LEVELS.contains(&level))
                .unwrap_or(false);
            if quiet {
                log.insert("loglevel".to_string(), json!(STARTUP_LOG_LEVEL));
            }
        }

        let bytes = serde_json::to_vec(&value)
            .map_err(|e| DomainError::InvalidConfiguration(e.to_string()))?;
        Ok(EngineDocument { bytes, log_files })
    }
}

fn is_admin_rule(rule: &Value) -> bool {
    rule.get("outboundTag").and_then(Value::as_str) == Some(api::OUTBOUND_TAG)
}

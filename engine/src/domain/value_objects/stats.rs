//! Traffic counter and runtime statistics value objects
//!
//! The engine names its counters with a `>>>` delimited convention:
//! - aggregate queries return `category>>>name>>>link>>>metric`
//! - name-scoped queries return `category>>>name>>>metric>>>link`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const COUNTER_DELIMITER: &str = ">>>";

/// What a stats request is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatType {
    Outbounds,
    Outbound,
    Inbounds,
    Inbound,
    UsersStat,
    UserStat,
}

impl StatType {
    pub fn category(self) -> &'static str {
        match self {
            StatType::Outbounds | StatType::Outbound => "outbound",
            StatType::Inbounds | StatType::Inbound => "inbound",
            StatType::UsersStat | StatType::UserStat => "user",
        }
    }

    /// Whether the request targets a single named counter group
    pub fn is_named(self) -> bool {
        matches!(
            self,
            StatType::Outbound | StatType::Inbound | StatType::UserStat
        )
    }

    /// Counter query pattern for this kind
    pub fn pattern(self, name: &str) -> String {
        if self.is_named() {
            format!(
                "{}{d}{}{d}",
                self.category(),
                name,
                d = COUNTER_DELIMITER
            )
        } else {
            format!("{}{}", self.category(), COUNTER_DELIMITER)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRequest {
    pub kind: StatType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reset: bool,
}

/// One parsed traffic counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub name: String,
    #[serde(rename = "type")]
    pub stat_type: String,
    pub link: String,
    pub value: i64,
}

impl Stat {
    /// Parse a raw counter name for the given request kind.
    /// Returns None for names that do not have four segments.
    pub fn parse(kind: StatType, counter: &str, value: i64) -> Option<Self> {
        let parts: Vec<&str> = counter.split(COUNTER_DELIMITER).collect();
        if parts.len() != 4 {
            return None;
        }
        let name = parts[1].to_string();
        let (link, stat_type) = if kind.is_named() {
            (parts[3], parts[2])
        } else {
            (parts[2], parts[3])
        };
        Some(Self {
            name,
            stat_type: stat_type.to_string(),
            link: link.to_string(),
            value,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatResponse {
    pub stats: Vec<Stat>,
}

/// Raw counter as returned by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStat {
    pub name: String,
    pub value: i64,
}

/// Go runtime counters reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysStats {
    pub num_goroutine: u32,
    pub num_gc: u32,
    pub alloc: u64,
    pub total_alloc: u64,
    pub sys: u64,
    pub mallocs: u64,
    pub frees: u64,
    pub live_objects: u64,
    pub pause_total_ns: u64,
    pub uptime: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineStat {
    pub name: String,
    pub value: i64,
}

/// Distinct client IPs attributed to a user, with last-seen timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineIpList {
    pub name: String,
    pub ips: HashMap<String, i64>,
}

/// Counter name used for per-user online tracking
pub fn online_counter(email: &str) -> String {
    format!("user{d}{}{d}online", email, d = COUNTER_DELIMITER)
}

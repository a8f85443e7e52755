//! EngineApi port
//! Interface to the engine's own administrative gRPC services

use crate::domain::entities::Account;
use crate::domain::value_objects::{OnlineIpList, OnlineStat, RawStat, SysStats};
use crate::domain::Result;
use async_trait::async_trait;

/// Live administration of a running engine
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Add a user to the inbound with the given tag
    async fn add_inbound_user(&self, tag: &str, account: &Account) -> Result<()>;

    /// Remove a user (by email) from the inbound with the given tag
    async fn remove_inbound_user(&self, tag: &str, email: &str) -> Result<()>;

    async fn add_outbound_user(&self, tag: &str, account: &Account) -> Result<()>;

    async fn remove_outbound_user(&self, tag: &str, email: &str) -> Result<()>;

    /// Runtime counters of the engine process; also used as the health check
    async fn sys_stats(&self) -> Result<SysStats>;

    /// Traffic counters whose names match `pattern`
    async fn query_stats(&self, pattern: &str, reset: bool) -> Result<Vec<RawStat>>;

    /// Online session count of the counter `name`
    async fn stats_online(&self, name: &str) -> Result<OnlineStat>;

    /// Client IPs currently attributed to the counter `name`
    async fn stats_online_ip_list(&self, name: &str) -> Result<OnlineIpList>;
}

//! gRPC client for the engine's HandlerService and StatsService
//! Real implementation of the EngineApi port

use super::accounts::{add_user_operation, remove_user_operation};
use super::proto::{proxyman, stats};
use crate::constants::api;
use crate::domain::entities::Account;
use crate::domain::ports::EngineApi;
use crate::domain::value_objects::{OnlineIpList, OnlineStat, RawStat, SysStats};
use crate::domain::{DomainError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::debug;

const CONNECT_TIMEOUT_SEC: u64 = 5;

mod paths {
    pub const ALTER_INBOUND: &str = "/xray.app.proxyman.command.HandlerService/AlterInbound";
    pub const ALTER_OUTBOUND: &str = "/xray.app.proxyman.command.HandlerService/AlterOutbound";
    pub const GET_SYS_STATS: &str = "/xray.app.stats.command.StatsService/GetSysStats";
    pub const QUERY_STATS: &str = "/xray.app.stats.command.StatsService/QueryStats";
    pub const GET_STATS_ONLINE: &str = "/xray.app.stats.command.StatsService/GetStatsOnline";
    pub const GET_STATS_ONLINE_IP_LIST: &str =
        "/xray.app.stats.command.StatsService/GetStatsOnlineIpList";
}

/// Client bound to the loopback administrative inbound
#[derive(Debug, Clone)]
pub struct XrayApiClient {
    channel: Channel,
}

impl XrayApiClient {
    /// The connection is established on first use, so the engine may still be starting
    pub fn connect_lazy(port: u16) -> Result<Self> {
        let endpoint = Endpoint::from_shared(format!("http://{}:{}", api::LISTEN_ADDR, port))
            .map_err(|e| DomainError::Api(format!("invalid API endpoint: {}", e)))?
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SEC));
        debug!(port = port, "Engine API client created");
        Ok(Self {
            channel: endpoint.connect_lazy(),
        })
    }

    async fn unary<Req, Resp>(&self, path: &'static str, request: Req) -> std::result::Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {}", e)))?;
        let codec = tonic::codec::ProstCodec::default();
        let response = grpc
            .unary(tonic::Request::new(request), PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}

/// Lookup failures become `NotFound` so callers can tell them apart
fn map_status(status: Status, subject: &str) -> DomainError {
    if status.code() == Code::NotFound || status.message().contains("not found") {
        DomainError::NotFound(subject.to_string())
    } else {
        DomainError::Api(format!("{:?}: {}", status.code(), status.message()))
    }
}

#[async_trait]
impl EngineApi for XrayApiClient {
    async fn add_inbound_user(&self, tag: &str, account: &Account) -> Result<()> {
        let request = proxyman::AlterInboundRequest {
            tag: tag.to_string(),
            operation: Some(add_user_operation(account)),
        };
        self.unary::<_, proxyman::AlterInboundResponse>(paths::ALTER_INBOUND, request)
            .await
            .map_err(|s| map_status(s, tag))?;
        Ok(())
    }

    async fn remove_inbound_user(&self, tag: &str, email: &str) -> Result<()> {
        let request = proxyman::AlterInboundRequest {
            tag: tag.to_string(),
            operation: Some(remove_user_operation(email)),
        };
        self.unary::<_, proxyman::AlterInboundResponse>(paths::ALTER_INBOUND, request)
            .await
            .map_err(|s| map_status(s, email))?;
        Ok(())
    }

    async fn add_outbound_user(&self, tag: &str, account: &Account) -> Result<()> {
        let request = proxyman::AlterOutboundRequest {
            tag: tag.to_string(),
            operation: Some(add_user_operation(account)),
        };
        self.unary::<_, proxyman::AlterOutboundResponse>(paths::ALTER_OUTBOUND, request)
            .await
            .map_err(|s| map_status(s, tag))?;
        Ok(())
    }

    async fn remove_outbound_user(&self, tag: &str, email: &str) -> Result<()> {
        let request = proxyman::AlterOutboundRequest {
            tag: tag.to_string(),
            operation: Some(remove_user_operation(email)),
        };
        self.unary::<_, proxyman::AlterOutboundResponse>(paths::ALTER_OUTBOUND, request)
            .await
            .map_err(|s| map_status(s, email))?;
        Ok(())
    }

    async fn sys_stats(&self) -> Result<SysStats> {
        let resp: stats::SysStatsResponse = self
            .unary(paths::GET_SYS_STATS, stats::SysStatsRequest {})
            .await
            .map_err(|s| DomainError::Api(format!("failed to get sys stats: {}", s.message())))?;
        Ok(SysStats {
            num_goroutine: resp.num_goroutine,
            num_gc: resp.num_gc,
            alloc: resp.alloc,
            total_alloc: resp.total_alloc,
            sys: resp.sys,
            mallocs: resp.mallocs,
            frees: resp.frees,
            live_objects: resp.live_objects,
            pause_total_ns: resp.pause_total_ns,
            uptime: resp.uptime,
        })
    }

    async fn query_stats(&self, pattern: &str, reset: bool) -> Result<Vec<RawStat>> {
        let request = stats::QueryStatsRequest {
            pattern: pattern.to_string(),
            reset,
        };
        let resp: stats::QueryStatsResponse = self
            .unary(paths::QUERY_STATS, request)
            .await
            .map_err(|s| map_status(s, pattern))?;
        Ok(resp
            .stat
            .into_iter()
            .map(|s| RawStat {
                name: s.name,
                value: s.value,
            })
            .collect())
    }

    async fn stats_online(&self, name: &str) -> Result<OnlineStat> {
        let request = stats::GetStatsRequest {
            name: name.to_string(),
            reset: false,
        };
        let resp: stats::GetStatsResponse = self
            .unary(paths::GET_STATS_ONLINE, request)
            .await
            .map_err(|s| map_status(s, name))?;
        let stat = resp.stat.unwrap_or_default();
        Ok(OnlineStat {
            name: name.to_string(),
            value: stat.value,
        })
    }

    async fn stats_online_ip_list(&self, name: &str) -> Result<OnlineIpList> {
        let request = stats::GetStatsRequest {
            name: name.to_string(),
            reset: false,
        };
        let resp: stats::GetStatsOnlineIpListResponse = self
            .unary(paths::GET_STATS_ONLINE_IP_LIST, request)
            .await
            .map_err(|s| map_status(s, name))?;
        Ok(OnlineIpList {
            name: name.to_string(),
            ips: resp.ips,
        })
    }
}

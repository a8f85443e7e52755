//! Engine backend
//! Composition root wiring the supervisor, the engine API client and the
//! domain services into the surface the control-plane listeners call.

use crate::constants::startup;
use crate::domain::entities::{User, XrayConfig};
use crate::domain::ports::{EngineApi, EngineRestarter, ProcessControl};
use crate::domain::services::{
    rebuild_client_lists, wait_for_startup, HealthMonitoringService, UserSyncService,
};
use crate::domain::value_objects::{
    online_counter, HealthPolicy, OnlineIpList, OnlineStat, Stat, StatRequest, StatResponse,
    SysStats,
};
use crate::domain::{DomainError, Result};
use crate::infrastructure::{
    default_process_control, pick_free_port, CoreSettings, LogStream, XrayApiClient, XrayCore,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Operations exposed to the control-plane listeners
#[async_trait]
pub trait Backend: Send + Sync {
    async fn started(&self) -> bool;

    fn version(&self) -> &str;

    /// Live tail of engine output
    fn logs(&self) -> LogStream;

    async fn restart(&self) -> Result<()>;

    /// Stop health checks and the engine
    async fn shutdown(&self);

    /// Apply one user's memberships live
    async fn sync_user(&self, user: &User) -> Result<()>;

    /// Replace the whole user set and restart the engine
    async fn sync_users(&self, users: &[User]) -> Result<()>;

    async fn get_sys_stats(&self) -> Result<SysStats>;

    async fn get_stats(&self, request: &StatRequest) -> Result<StatResponse>;

    async fn get_user_online_stats(&self, email: &str) -> Result<OnlineStat>;

    async fn get_user_online_ip_list_stats(&self, email: &str) -> Result<OnlineIpList>;
}

/// Tunables of one backend instance
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub core: CoreSettings,
    /// Administrative API port; `None` or 0 picks a free loopback port
    pub api_port: Option<u16>,
    pub health: HealthPolicy,
    pub startup_timeout: Duration,
    /// Dump the generated config and echo engine output through tracing
    pub debug: bool,
}

impl BackendSettings {
    pub fn new(core: CoreSettings) -> Self {
        Self {
            core,
            api_port: None,
            health: HealthPolicy::default(),
            startup_timeout: Duration::from_secs(startup::READY_TIMEOUT_SEC),
            debug: false,
        }
    }

    pub fn with_api_port(mut self, port: u16) -> Self {
        self.api_port = Some(port);
        self
    }

    pub fn with_health(mut self, health: HealthPolicy) -> Self {
        self.health = health;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn resolve_api_port(&self) -> Result<u16> {
        match self.api_port {
            Some(port) if port != 0 => Ok(port),
            _ => pick_free_port(),
        }
    }
}

/// Adapters a backend is built on
pub struct BackendPorts {
    pub process_control: Arc<dyn ProcessControl>,
    /// Engine API; `None` connects to the administrative inbound
    pub api: Option<Arc<dyn EngineApi>>,
}

impl Default for BackendPorts {
    fn default() -> Self {
        Self {
            process_control: default_process_control(),
            api: None,
        }
    }
}

/// Restarts the supervised engine with the shared configuration model
struct CoreRestarter {
    core: Arc<XrayCore>,
    config: Arc<XrayConfig>,
    debug: bool,
}

#[async_trait]
impl EngineRestarter for CoreRestarter {
    async fn restart_engine(&self) -> Result<()> {
        self.core.restart(&self.config, self.debug).await
    }
}

/// Backend supervising a local xray-core process
pub struct XrayBackend {
    core: Arc<XrayCore>,
    api: Arc<dyn EngineApi>,
    restarter: Arc<CoreRestarter>,
    sync: UserSyncService,
    cancel: CancellationToken,
    health: Mutex<Option<JoinHandle<()>>>,
}

impl XrayBackend {
    /// Start the engine with the platform process control and a real API client
    pub async fn start(config: XrayConfig, users: &[User], settings: BackendSettings) -> Result<Self> {
        Self::start_with(config, users, settings, BackendPorts::default()).await
    }

    /// Start the engine and wait until it reports readiness
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration model; the administrative API is installed into it
    /// * `users` - Initial user directory rendered into the startup document
    /// * `settings` - Paths and tunables
    /// * `ports` - Process control and engine API adapters
    pub async fn start_with(
        mut config: XrayConfig,
        users: &[User],
        settings: BackendSettings,
        ports: BackendPorts,
    ) -> Result<Self> {
        let began = Instant::now();
        let api_port = settings.resolve_api_port()?;
        config.apply_api(api_port);
        rebuild_client_lists(&config, users);
        let config = Arc::new(config);
        info!(
            api_port = api_port,
            users = users.len(),
            elapsed_ms = began.elapsed().as_millis() as u64,
            "Engine config generated"
        );

        let core = Arc::new(XrayCore::new(settings.core.clone(), ports.process_control).await?);
        core.start(&config, settings.debug).await?;

        let ready = {
            let stream = core.logs();
            let mut logs = stream.lock().await;
            wait_for_startup(&mut logs, core.version(), settings.startup_timeout).await
        };
        if let Err(e) = ready {
            warn!(error = %e, "Engine did not start, tearing down");
            core.stop().await;
            return Err(e);
        }

        let api = match ports.api {
            Some(api) => api,
            None => match XrayApiClient::connect_lazy(api_port) {
                Ok(client) => Arc::new(client) as Arc<dyn EngineApi>,
                Err(e) => {
                    core.stop().await;
                    return Err(e);
                }
            },
        };

        let restarter = Arc::new(CoreRestarter {
            core: core.clone(),
            config: config.clone(),
            debug: settings.debug,
        });
        let cancel = CancellationToken::new();
        let health = HealthMonitoringService::new(api.clone(), restarter.clone(), settings.health)
            .start_monitoring(cancel.clone());

        info!(version = %core.version(), "Engine backend started");

        Ok(Self {
            sync: UserSyncService::new(config, api.clone()),
            core,
            api,
            restarter,
            cancel,
            health: Mutex::new(Some(health)),
        })
    }

    /// Configuration model the engine is running with
    pub fn config(&self) -> &XrayConfig {
        &self.restarter.config
    }

    pub async fn pid(&self) -> Option<u32> {
        self.core.pid().await
    }
}

#[async_trait]
impl Backend for XrayBackend {
    async fn started(&self) -> bool {
        self.core.started().await
    }

    fn version(&self) -> &str {
        self.core.version()
    }

    fn logs(&self) -> LogStream {
        self.core.logs()
    }

    async fn restart(&self) -> Result<()> {
        self.restarter.restart_engine().await
    }

    async fn shutdown(&self) {
        self.cancel.cancel();

        let health = self
            .health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = health {
            if let Err(e) = handle.await {
                warn!(error = %e, "Health monitor ended abnormally");
            }
        }

        self.core.stop().await;
        info!("Engine backend shut down");
    }

    async fn sync_user(&self, user: &User) -> Result<()> {
        self.sync.sync_user(user).await
    }

    async fn sync_users(&self, users: &[User]) -> Result<()> {
        self.sync.sync_users(users);
        self.restart().await
    }

    async fn get_sys_stats(&self) -> Result<SysStats> {
        self.api.sys_stats().await
    }

    async fn get_stats(&self, request: &StatRequest) -> Result<StatResponse> {
        collect_stats(self.api.as_ref(), request).await
    }

    async fn get_user_online_stats(&self, email: &str) -> Result<OnlineStat> {
        user_online_stats(self.api.as_ref(), email).await
    }

    async fn get_user_online_ip_list_stats(&self, email: &str) -> Result<OnlineIpList> {
        user_online_ip_list(self.api.as_ref(), email).await
    }
}

/// Query and parse the traffic counters selected by `request`
pub async fn collect_stats(api: &dyn EngineApi, request: &StatRequest) -> Result<StatResponse> {
    if request.kind.is_named() && request.name.is_empty() {
        return Err(DomainError::InvalidArgument(format!(
            "{:?} stats require a name",
            request.kind
        )));
    }

    let raw = api
        .query_stats(&request.kind.pattern(&request.name), request.reset)
        .await?;
    let stats = raw
        .into_iter()
        .filter_map(|counter| {
            let stat = Stat::parse(request.kind, &counter.name, counter.value);
            if stat.is_none() {
                debug!(counter = %counter.name, "Skipping malformed counter");
            }
            stat
        })
        .collect();

    Ok(StatResponse { stats })
}

pub async fn user_online_stats(api: &dyn EngineApi, email: &str) -> Result<OnlineStat> {
    require_email(email)?;
    let stat = api.stats_online(&online_counter(email)).await?;
    Ok(OnlineStat {
        name: email.to_string(),
        value: stat.value,
    })
}

pub async fn user_online_ip_list(api: &dyn EngineApi, email: &str) -> Result<OnlineIpList> {
    require_email(email)?;
    let list = api.stats_online_ip_list(&online_counter(email)).await?;
    Ok(OnlineIpList {
        name: email.to_string(),
        ips: list.ips,
    })
}

fn require_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(DomainError::InvalidArgument("email is required".to_string()));
    }
    Ok(())
}

pub mod account_service;
pub mod health_monitoring_service;
pub mod startup_check;
pub mod user_sync_service;

pub use account_service::{ensure_base64_password, eligible_account, supports_flow, ProxyAccounts};
pub use health_monitoring_service::HealthMonitoringService;
pub use startup_check::{startup_signal, wait_for_startup, StartupSignal};
pub use user_sync_service::{rebuild_client_lists, UserSyncService};

pub mod account;
pub mod inbound;
pub mod user;
pub mod xray_config;

pub use account::{
    Account, Shadowsocks2022Account, ShadowsocksAccount, TrojanAccount, VlessAccount,
    VmessAccount, DEFAULT_LEVEL,
};
pub use inbound::{ClientList, Inbound, InboundDocument, InboundKind};
pub use user::{
    Proxies, ShadowsocksSettings, TrojanSettings, User, VlessSettings, VmessSettings,
};
pub use xray_config::{
    ApiConfig, EngineDocument, LevelPolicy, LogConfig, LogFiles, PolicyConfig, RoutingConfig,
    SystemPolicy, XrayConfig,
};

pub mod health_policy;
pub mod log_line;
pub mod protocol;
pub mod stats;

pub use health_policy::HealthPolicy;
pub use log_line::{LogKind, LogLine, Severity};
pub use protocol::{CipherType, Protocol, SHADOWSOCKS_2022_PREFIX};
pub use stats::{
    online_counter, OnlineIpList, OnlineStat, RawStat, Stat, StatRequest, StatResponse,
    StatType, SysStats,
};

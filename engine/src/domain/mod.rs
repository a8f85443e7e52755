pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{Account, ClientList, Inbound, InboundKind, User, XrayConfig};
pub use error::{DomainError, InboundSyncFailure, Result};
pub use value_objects::{
    CipherType, HealthPolicy, LogKind, Protocol, Stat, StatRequest, StatResponse, StatType,
    SysStats,
};

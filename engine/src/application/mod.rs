//! Application Layer
//!
//! Wires the supervisor, the engine API client and the domain services
//! together behind the `Backend` surface.

pub mod backend;

pub use backend::{
    collect_stats, user_online_ip_list, user_online_stats, Backend, BackendPorts,
    BackendSettings, XrayBackend,
};

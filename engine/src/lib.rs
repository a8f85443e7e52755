//! Gate engine
//!
//! Supervises an xray-core process and keeps its inbound client lists in sync
//! with an external user directory, applying single-user changes live through
//! the engine's own gRPC API and falling back to a full restart for bulk changes.

pub mod application;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::{Backend, BackendSettings, XrayBackend};
pub use domain::{DomainError, Result};

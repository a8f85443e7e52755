//! Infrastructure Layer
//!
//! Adapters implementing the domain ports, plus the engine process supervisor.
//!
//! ## Adapters
//!
//! - `XrayApiClient`: gRPC client for the engine's administrative services
//! - `UnixProcessControl` / `WindowsProcessControl`: platform process control
//! - `XrayCore`: engine process supervisor
//! - `CoreLogger`: durable access/error log writer for captured engine output

pub mod core_logger;
pub mod port;
pub mod process_control;
pub mod xray_api;
pub mod xray_core;

pub use core_logger::CoreLogger;
pub use port::pick_free_port;
pub use process_control::default_process_control;
pub use xray_api::XrayApiClient;
pub use xray_core::{CoreSettings, LogStream, XrayCore};

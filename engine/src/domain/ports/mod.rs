pub mod engine_api;
pub mod engine_restarter;
pub mod process_control;

pub use engine_api::EngineApi;
pub use engine_restarter::EngineRestarter;
pub use process_control::{ProcessControl, ProcessInfo};

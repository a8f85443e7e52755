//! Engine administrative API adapter

pub mod accounts;
pub mod client;
pub mod proto;

pub use client::XrayApiClient;

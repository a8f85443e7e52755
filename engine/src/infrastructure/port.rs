//! Local port selection for the administrative API

use crate::constants::api;
use crate::domain::Result;
use std::net::TcpListener;

/// Ask the OS for a currently free loopback port
pub fn pick_free_port() -> Result<u16> {
    let listener = TcpListener::bind((api::LISTEN_ADDR, 0))?;
    Ok(listener.local_addr()?.port())
}

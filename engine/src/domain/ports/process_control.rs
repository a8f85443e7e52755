//! ProcessControl port
//! Platform capability for finding and terminating engine processes

use crate::domain::Result;
use async_trait::async_trait;
use std::path::Path;

/// A process found by executable path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub is_zombie: bool,
}

/// Port for OS-level process control
///
/// One implementation exists per target platform; the supervisor only
/// depends on this trait.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Processes whose resolved executable path equals `executable`
    async fn find_processes(&self, executable: &Path) -> Result<Vec<ProcessInfo>>;

    /// Whether the process lost its parent and will not be reaped by anyone else
    fn is_orphaned(&self, info: &ProcessInfo) -> bool;

    /// Ask the process to exit
    fn terminate(&self, pid: u32) -> Result<()>;

    /// Forcefully kill the process and its group/tree, then wait until it is gone
    async fn kill_tree(&self, pid: u32) -> Result<()>;

    /// True if the process exists and is not a zombie
    fn is_alive(&self, pid: u32) -> bool;
}

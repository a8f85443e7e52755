//! Platform process control adapters

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use self::unix::UnixProcessControl;
#[cfg(windows)]
pub use self::windows::WindowsProcessControl;

use crate::domain::ports::ProcessControl;
use std::sync::Arc;

/// Process control for the platform this binary was built for
pub fn default_process_control() -> Arc<dyn ProcessControl> {
    #[cfg(unix)]
    {
        Arc::new(UnixProcessControl::new())
    }

    #[cfg(windows)]
    {
        Arc::new(WindowsProcessControl::new())
    }
}

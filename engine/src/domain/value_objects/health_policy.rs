//! Health check policy for the running engine

use crate::constants::{health_check, startup};
use std::time::Duration;

/// How the background health loop checks the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Delay before the first check
    pub start_delay: Duration,
    /// Time between checks
    pub interval: Duration,
    /// Timeout of a single check
    pub timeout: Duration,
    /// Consecutive failures that trigger a restart
    pub max_failures: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(startup::HEALTH_START_DELAY_SEC),
            interval: Duration::from_secs(health_check::DEFAULT_INTERVAL),
            timeout: Duration::from_secs(health_check::DEFAULT_TIMEOUT),
            max_failures: health_check::DEFAULT_MAX_FAILURES,
        }
    }
}

impl HealthPolicy {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = HealthPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.timeout, Duration::from_secs(3));
        assert_eq!(policy.max_failures, 3);
    }
}

//! Health monitoring service
//! Checks the running engine and restarts it after repeated failures

use crate::domain::ports::{EngineApi, EngineRestarter};
use crate::domain::HealthPolicy;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Background health monitor for one engine lifetime
pub struct HealthMonitoringService {
    api: Arc<dyn EngineApi>,
    restarter: Arc<dyn EngineRestarter>,
    policy: HealthPolicy,
}

impl HealthMonitoringService {
    pub fn new(
        api: Arc<dyn EngineApi>,
        restarter: Arc<dyn EngineRestarter>,
        policy: HealthPolicy,
    ) -> Self {
        Self {
            api,
            restarter,
            policy,
        }
    }

    /// Spawn the monitoring loop; it ends when `cancel` fires
    pub fn start_monitoring(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Main monitoring loop
    pub async fn run(&self, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(self.policy.start_delay) => {}
        }

        // First tick completes immediately
        let mut ticker = interval(self.policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let check = tokio::select! {
                _ = cancel.cancelled() => break,
                result = timeout(self.policy.timeout, self.api.sys_stats()) => result,
            };

            match check {
                Ok(Ok(_)) => {
                    if failures > 0 {
                        debug!(previous_failures = failures, "Health check recovered");
                    }
                    failures = 0;
                }
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(failures = failures, error = %e, "Health check failed");
                }
                Err(_) => {
                    failures += 1;
                    warn!(failures = failures, "Health check timed out");
                }
            }

            if failures >= self.policy.max_failures {
                warn!(failures = failures, "Health check failure threshold reached, restarting engine");
                failures = 0;
                match self.restarter.restart_engine().await {
                    Ok(()) => info!("Engine restarted after failed health checks"),
                    Err(e) => error!(error = %e, "Failed to restart engine"),
                }
            }
        }

        debug!("Health monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Account;
    use crate::domain::value_objects::{OnlineIpList, OnlineStat, RawStat, SysStats};
    use crate::domain::{DomainError, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted check outcomes, then reports healthy
    struct ScriptedApi {
        outcomes: Mutex<VecDeque<bool>>,
        checks: AtomicU32,
    }

    impl ScriptedApi {
        fn new(outcomes: &[bool]) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
                checks: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl EngineApi for ScriptedApi {
        async fn add_inbound_user(&self, _tag: &str, _account: &Account) -> Result<()> {
            Ok(())
        }

        async fn remove_inbound_user(&self, _tag: &str, _email: &str) -> Result<()> {
            Ok(())
        }

        async fn add_outbound_user(&self, _tag: &str, _account: &Account) -> Result<()> {
            Ok(())
        }

        async fn remove_outbound_user(&self, _tag: &str, _email: &str) -> Result<()> {
            Ok(())
        }

        async fn sys_stats(&self) -> Result<SysStats> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            let healthy = self.outcomes.lock().unwrap().pop_front().unwrap_or(true);
            if healthy {
                Ok(SysStats::default())
            } else {
                Err(DomainError::Api("unavailable".to_string()))
            }
        }

        async fn query_stats(&self, _pattern: &str, _reset: bool) -> Result<Vec<RawStat>> {
            Ok(Vec::new())
        }

        async fn stats_online(&self, name: &str) -> Result<OnlineStat> {
            Err(DomainError::NotFound(name.to_string()))
        }

        async fn stats_online_ip_list(&self, name: &str) -> Result<OnlineIpList> {
            Err(DomainError::NotFound(name.to_string()))
        }
    }

    #[derive(Default)]
    struct CountingRestarter {
        restarts: AtomicU32,
    }

    #[async_trait]
    impl EngineRestarter for CountingRestarter {
        async fn restart_engine(&self) -> Result<()> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_policy() -> HealthPolicy {
        HealthPolicy::default()
            .with_start_delay(Duration::from_millis(5))
            .with_interval(Duration::from_millis(20))
            .with_timeout(Duration::from_millis(50))
    }

    async fn run_for(outcomes: &[bool], checks: u32) -> (Arc<ScriptedApi>, Arc<CountingRestarter>) {
        let api = Arc::new(ScriptedApi::new(outcomes));
        let restarter = Arc::new(CountingRestarter::default());
        let cancel = CancellationToken::new();
        let handle = HealthMonitoringService::new(api.clone(), restarter.clone(), fast_policy())
            .start_monitoring(cancel.clone());

        while api.checks.load(Ordering::SeqCst) < checks {
            sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        handle.await.unwrap();
        (api, restarter)
    }

    #[tokio::test]
    async fn test_two_failures_then_success_does_not_restart() {
        let (_, restarter) = run_for(&[false, false, true, false, false, true], 8).await;
        assert_eq!(restarter.restarts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_three_failures_restart_once() {
        let (_, restarter) = run_for(&[false, false, false, true, false, false], 8).await;
        assert_eq!(restarter.restarts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_counter_resets_after_restart() {
        let (_, restarter) = run_for(&[false; 5], 7).await;
        assert_eq!(restarter.restarts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_exits_silently() {
        let api = Arc::new(ScriptedApi::new(&[false; 100]));
        let restarter = Arc::new(CountingRestarter::default());
        let cancel = CancellationToken::new();
        let handle = HealthMonitoringService::new(api.clone(), restarter.clone(), fast_policy())
            .start_monitoring(cancel.clone());

        cancel.cancel();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should stop on cancel")
            .unwrap();
        assert_eq!(restarter.restarts.load(Ordering::SeqCst), 0);
    }
}

//! Periodic housekeeping: old quota windows and idle rate-limit buckets

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::interval;

use caloriscan_core::services::quota::{QuotaError, QuotaPolicy, QuotaStore};

use crate::perimeter::RateLimiter;

pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct Maintenance {
    store: QuotaStore,
    policy: QuotaPolicy,
    limiter: Arc<RateLimiter>,
    retention_days: i32,
}

/// What one pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub quota_windows: u64,
    pub rate_buckets: usize,
}

impl Maintenance {
    pub fn new(
        store: QuotaStore,
        policy: QuotaPolicy,
        limiter: Arc<RateLimiter>,
        retention_days: i32,
    ) -> Self {
        Self {
            store,
            policy,
            limiter,
            retention_days,
        }
    }

    pub async fn run_once(&self) -> Result<MaintenanceReport, QuotaError> {
        let quota_windows = self
            .store
            .cleanup(self.retention_days, &self.policy.current_key())
            .await?;
        let rate_buckets = self.limiter.prune();
        Ok(MaintenanceReport {
            quota_windows,
            rate_buckets,
        })
    }

    /// Run every `period` until the returned sender fires or is dropped
    pub fn spawn(self, period: Duration) -> oneshot::Sender<()> {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut timer = interval(period);

            // Skip the first tick (immediate)
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        match self.run_once().await {
                            Ok(report) => log::debug!(
                                "[maintenance] Removed {} quota window(s), {} rate bucket(s)",
                                report.quota_windows,
                                report.rate_buckets
                            ),
                            Err(e) => log::warn!("[maintenance] Quota cleanup failed: {}", e),
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            log::info!("[maintenance] Stopped");
        });

        shutdown_tx
    }
}

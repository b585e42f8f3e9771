//! Periodic maintenance jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fedinet_common::{AppResult, config::WorkerConfig};
use fedinet_core::{DeliveryEngine, HealthAggregator, HealthStatus, SweepReport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Maintenance job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceJob {
    /// Retry delivery attempts that are due.
    RetrySweep,
    /// Expire activities stuck in `pending`.
    ExpireStale,
    /// Recompute the health snapshot.
    HealthCheck,
}

/// Scheduler intervals.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Default: 30 seconds.
    pub retry_interval: Duration,
    /// Default: 5 minutes.
    pub expiration_interval: Duration,
    /// Default: 1 minute.
    pub health_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(30),
            expiration_interval: Duration::from_secs(300),
            health_interval: Duration::from_secs(60),
        }
    }
}

impl From<&WorkerConfig> for SchedulerConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            retry_interval: config.retry_interval(),
            expiration_interval: config.expiration_interval(),
            health_interval: config.health_interval(),
        }
    }
}

/// Executes maintenance jobs.
#[async_trait]
pub trait MaintenanceExecutor: Send + Sync + 'static {
    /// Retry due deliveries.
    async fn sweep_retries(&self) -> AppResult<SweepReport>;

    /// Returns the number of activities expired.
    async fn expire_stale(&self) -> AppResult<u64>;

    /// Refresh the cached health snapshot.
    async fn recompute_health(&self) -> AppResult<HealthStatus>;
}

/// [`MaintenanceExecutor`] over the engine services.
#[derive(Clone)]
pub struct FederationMaintenance {
    /// Retry sweep and stale expiry.
    pub delivery: DeliveryEngine,
    /// Health recomputation.
    pub health: HealthAggregator,
}

#[async_trait]
impl MaintenanceExecutor for FederationMaintenance {
    async fn sweep_retries(&self) -> AppResult<SweepReport> {
        self.delivery.process_due_retries_at(Utc::now()).await
    }

    async fn expire_stale(&self) -> AppResult<u64> {
        self.delivery.expire_stale_at(Utc::now()).await
    }

    async fn recompute_health(&self) -> AppResult<HealthStatus> {
        Ok(self.health.recompute().await?.status)
    }
}

/// Running maintenance loops.
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn one loop per job. Loops check `shutdown` between cycles, so a
    /// cycle that has started always finishes.
    pub fn start<E: MaintenanceExecutor>(
        config: &SchedulerConfig,
        executor: Arc<E>,
        shutdown: &watch::Receiver<bool>,
    ) -> Self {
        let handles = [
            (MaintenanceJob::RetrySweep, config.retry_interval),
            (MaintenanceJob::ExpireStale, config.expiration_interval),
            (MaintenanceJob::HealthCheck, config.health_interval),
        ]
        .into_iter()
        .map(|(job, period)| spawn_job(job, period, executor.clone(), shutdown.clone()))
        .collect();

        Self { handles }
    }

    /// Wait for every loop to stop.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduler loop terminated abnormally");
            }
        }
    }
}

fn spawn_job<E: MaintenanceExecutor>(
    job: MaintenanceJob,
    period: Duration,
    executor: Arc<E>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            run_job(executor.as_ref(), job).await;
        }

        tracing::debug!(job = ?job, "Scheduler loop stopped");
    })
}

async fn run_job<E: MaintenanceExecutor>(executor: &E, job: MaintenanceJob) {
    match job {
        MaintenanceJob::RetrySweep => {
            if let Err(e) = executor.sweep_retries().await {
                tracing::error!(error = %e, "Retry sweep failed");
            }
        }
        MaintenanceJob::ExpireStale => match executor.expire_stale().await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(count, "Expiration sweep finished");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Expiration sweep failed");
            }
        },
        MaintenanceJob::HealthCheck => match executor.recompute_health().await {
            Ok(status) => tracing::debug!(status = ?status, "Health recomputed"),
            Err(e) => tracing::error!(error = %e, "Health recompute failed"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = SchedulerConfig::default();
        assert_eq!(config.retry_interval, Duration::from_secs(30));
        assert_eq!(config.expiration_interval, Duration::from_secs(300));
        assert_eq!(config.health_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_from_worker_config() {
        let workers = WorkerConfig {
            retry_interval_secs: 5,
            ..WorkerConfig::default()
        };

        let config = SchedulerConfig::from(&workers);

        assert_eq!(config.retry_interval, Duration::from_secs(5));
        assert_eq!(config.health_interval, Duration::from_secs(60));
    }
}

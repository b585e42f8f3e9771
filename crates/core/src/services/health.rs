//! Instance health snapshot.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fedinet_common::AppResult;
use fedinet_db::OutboxStore;
use serde::Serialize;
use tokio::sync::RwLock;

use super::blocklist::BlocklistService;
use super::rate_limit::RateLimiter;

/// Overall federation health, derived from the outbound failure rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// At most 20% of outbound activities failed.
    Healthy,
    /// More than 20% failed.
    Degraded,
    /// More than half failed.
    Unhealthy,
}

impl HealthStatus {
    /// Status for `failed` out of `total` outbound activities.
    #[must_use]
    pub fn derive(total: u64, failed: u64) -> Self {
        if total == 0 {
            return Self::Healthy;
        }
        let failure_rate = failed as f64 / total as f64;
        if failure_rate > 0.5 {
            Self::Unhealthy
        } else if failure_rate > 0.2 {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }
}

/// Point-in-time summary of federation traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// Overall status.
    pub status: HealthStatus,
    /// Outbound activities ever published.
    pub total_messages: u64,
    /// Outbound activities delivered.
    pub successful_deliveries: u64,
    /// Failed plus expired.
    pub failed_deliveries: u64,
    /// Outbound activities still pending.
    pub pending_retries: u64,
    /// Mean delivery latency over the last hour.
    pub average_latency_ms: f64,
    /// Servers with an active block.
    pub blocked_servers_count: u64,
    /// Requests denied by rate limiting since startup.
    pub rate_limit_violations: u64,
    /// Seconds since the aggregator was created.
    pub uptime_seconds: u64,
    /// When this snapshot was computed.
    pub last_checked_at: DateTime<Utc>,
}

impl HealthSnapshot {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            total_messages: 0,
            successful_deliveries: 0,
            failed_deliveries: 0,
            pending_retries: 0,
            average_latency_ms: 0.0,
            blocked_servers_count: 0,
            rate_limit_violations: 0,
            uptime_seconds: 0,
            last_checked_at: now,
        }
    }
}

/// Holds the latest [`HealthSnapshot`]. Only the health worker recomputes
/// it; request handlers read the cached copy.
#[derive(Clone)]
pub struct HealthAggregator {
    outbox: Arc<dyn OutboxStore>,
    blocklist: BlocklistService,
    rate_limiter: RateLimiter,
    started_at: DateTime<Utc>,
    snapshot: Arc<RwLock<HealthSnapshot>>,
}

impl HealthAggregator {
    /// Create a new health aggregator. Uptime counts from now.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        blocklist: BlocklistService,
        rate_limiter: RateLimiter,
    ) -> Self {
        let started_at = Utc::now();
        Self {
            outbox,
            blocklist,
            rate_limiter,
            started_at,
            snapshot: Arc::new(RwLock::new(HealthSnapshot::empty(started_at))),
        }
    }

    /// The most recently computed snapshot.
    pub async fn snapshot(&self) -> HealthSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Recompute the snapshot from the stores and cache it.
    pub async fn recompute(&self) -> AppResult<HealthSnapshot> {
        self.recompute_at(Utc::now()).await
    }

    /// Rebuild the snapshot from the store as of `now`.
    pub async fn recompute_at(&self, now: DateTime<Utc>) -> AppResult<HealthSnapshot> {
        let counts = self.outbox.status_counts().await?;
        let average_latency_ms = self
            .outbox
            .average_latency_ms(now - Duration::hours(1))
            .await?
            .unwrap_or(0.0);
        let blocked = self.blocklist.list_active().await?.len();

        let snapshot = HealthSnapshot {
            status: HealthStatus::derive(counts.total, counts.failed),
            total_messages: counts.total,
            successful_deliveries: counts.delivered,
            failed_deliveries: counts.failed,
            pending_retries: counts.pending,
            average_latency_ms,
            blocked_servers_count: u64::try_from(blocked).unwrap_or(u64::MAX),
            rate_limit_violations: self.rate_limiter.violations(),
            uptime_seconds: u64::try_from((now - self.started_at).num_seconds()).unwrap_or(0),
            last_checked_at: now,
        };

        if snapshot.status != HealthStatus::Healthy {
            tracing::warn!(
                status = ?snapshot.status,
                total = snapshot.total_messages,
                failed = snapshot.failed_deliveries,
                "Federation health degraded"
            );
        }

        *self.snapshot.write().await = snapshot.clone();
        Ok(snapshot)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use fedinet_db::entities::outbound_activity::DeliveryStatus;

    #[test]
    fn test_status_thresholds() {
        assert_eq!(HealthStatus::derive(10, 6), HealthStatus::Unhealthy);
        assert_eq!(HealthStatus::derive(10, 3), HealthStatus::Degraded);
        assert_eq!(HealthStatus::derive(10, 1), HealthStatus::Healthy);
        assert_eq!(HealthStatus::derive(10, 5), HealthStatus::Degraded);
        assert_eq!(HealthStatus::derive(10, 2), HealthStatus::Healthy);
        assert_eq!(HealthStatus::derive(0, 0), HealthStatus::Healthy);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(HealthStatus::Unhealthy).unwrap(),
            serde_json::json!("unhealthy")
        );
    }

    #[tokio::test]
    async fn test_recompute_counts_outbox() {
        let harness = Harness::new();
        let health = harness.health();
        let now = Utc::now();

        for i in 0..10 {
            let activity = harness.publish("Follow", "https://b.example").await;
            match i {
                0..=5 => {
                    OutboxStore::mark_failed(harness.store.as_ref(), &activity.id, "boom", now)
                        .await
                        .unwrap();
                }
                6..=8 => {
                    OutboxStore::mark_delivered(harness.store.as_ref(), &activity.id, now)
                        .await
                        .unwrap();
                }
                _ => {}
            }
        }

        let snapshot = health.recompute_at(now).await.unwrap();

        assert_eq!(snapshot.status, HealthStatus::Unhealthy);
        assert_eq!(snapshot.total_messages, 10);
        assert_eq!(snapshot.failed_deliveries, 6);
        assert_eq!(snapshot.successful_deliveries, 3);
        assert_eq!(snapshot.pending_retries, 1);
        assert_eq!(health.snapshot().await, snapshot);

        let pending = OutboxStore::list_by_actor(harness.store.as_ref(), "alice", 20)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.delivery_status == DeliveryStatus::Pending)
            .count();
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn test_snapshot_starts_empty() {
        let harness = Harness::new();

        let snapshot = harness.health().snapshot().await;

        assert_eq!(snapshot.status, HealthStatus::Healthy);
        assert_eq!(snapshot.total_messages, 0);
    }
}

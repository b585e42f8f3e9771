//! Persistence seams used by the federation services.
//!
//! Each trait covers one table. The sea-orm repositories in
//! [`crate::repositories`] implement them against `PostgreSQL`; the
//! in-memory [`crate::memory::MemoryStore`] implements all of them for tests.
//!
//! State transitions are conditional: a `mark_*` call only moves a row out of
//! the status it expects and reports whether it did, so concurrent workers
//! never overwrite each other's terminal state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedinet_common::AppResult;

use crate::entities::{
    acknowledgment, blocked_server, delivery_attempt, delivery_attempt::AttemptStatus,
    federation_policy, inbound_activity, outbound_activity, rate_limit_bucket, server_capability,
};

/// Outbound activity counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// All rows.
    pub total: u64,
    /// `delivered` rows.
    pub delivered: u64,
    /// `failed` plus `expired` rows.
    pub failed: u64,
    /// `pending` rows.
    pub pending: u64,
}

/// The outbox.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Stores a new pending activity.
    async fn insert(&self, activity: outbound_activity::Model)
    -> AppResult<outbound_activity::Model>;

    /// Looks up by id.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<outbound_activity::Model>>;

    /// Newest first.
    async fn list_by_actor(
        &self,
        actor_id: &str,
        limit: u64,
    ) -> AppResult<Vec<outbound_activity::Model>>;

    /// `pending` to `delivered`.
    async fn mark_delivered(&self, id: &str, at: DateTime<Utc>) -> AppResult<bool>;

    /// `pending` to `failed`.
    async fn mark_failed(&self, id: &str, reason: &str, at: DateTime<Utc>) -> AppResult<bool>;

    /// `pending` to `expired`.
    async fn mark_expired(&self, id: &str, reason: &str, at: DateTime<Utc>) -> AppResult<bool>;

    /// Records the last error on a still-pending activity.
    async fn record_error(&self, id: &str, error: &str, at: DateTime<Utc>) -> AppResult<()>;

    /// Sets `acknowledged_at` if unset.
    async fn mark_acknowledged(&self, id: &str, at: DateTime<Utc>) -> AppResult<bool>;

    /// Expires every pending activity created before `cutoff`.
    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Pending activities created at or before `cutoff` that have no
    /// delivery attempt row, oldest first. These are activities whose eager
    /// push never ran.
    async fn find_unattempted_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<outbound_activity::Model>>;

    /// Row counts by delivery status.
    async fn status_counts(&self) -> AppResult<StatusCounts>;

    /// Mean `delivered_at - created_at` in milliseconds over activities
    /// delivered since `since`.
    async fn average_latency_ms(&self, since: DateTime<Utc>) -> AppResult<Option<f64>>;
}

/// Retry schedule and audit trail of outbound deliveries.
#[async_trait]
pub trait DeliveryAttemptStore: Send + Sync {
    /// Stores a scheduled attempt.
    async fn insert(
        &self,
        attempt: delivery_attempt::Model,
    ) -> AppResult<delivery_attempt::Model>;

    /// Highest attempt number for the activity, `0` when none exist.
    async fn max_attempt_number(&self, outbound_activity_id: &str) -> AppResult<i32>;

    /// Pending attempts with `next_retry_at <= now`, oldest first.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<delivery_attempt::Model>>;

    /// Moves a pending attempt to `status`.
    async fn complete(
        &self,
        id: &str,
        status: AttemptStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Ordered by attempt number.
    async fn list_for_activity(
        &self,
        outbound_activity_id: &str,
    ) -> AppResult<Vec<delivery_attempt::Model>>;
}

/// The inbox.
#[async_trait]
pub trait InboxStore: Send + Sync {
    /// Stores a received activity.
    async fn insert(&self, activity: inbound_activity::Model)
    -> AppResult<inbound_activity::Model>;

    /// Looks up by local id.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<inbound_activity::Model>>;

    /// Looks up the sender's message id, for deduplication.
    async fn find_by_remote_message(
        &self,
        actor_server: &str,
        remote_message_id: &str,
    ) -> AppResult<Option<inbound_activity::Model>>;

    /// Activities addressed to `target_id` or to nobody in particular,
    /// newest first.
    async fn list_for_target(
        &self,
        target_id: &str,
        limit: u64,
    ) -> AppResult<Vec<inbound_activity::Model>>;

    /// `received` to `processing`.
    async fn mark_processing(&self, id: &str) -> AppResult<bool>;

    /// `processing` to `processed`.
    async fn mark_processed(
        &self,
        id: &str,
        processed_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// `processing` to `failed`.
    async fn mark_failed(&self, id: &str, error: &str, at: DateTime<Utc>) -> AppResult<()>;
}

/// Receiver acknowledgments.
#[async_trait]
pub trait AcknowledgmentStore: Send + Sync {
    /// Inserts unless the receiver already acknowledged the activity.
    /// Returns `None` for a duplicate.
    async fn insert_if_absent(
        &self,
        ack: acknowledgment::Model,
    ) -> AppResult<Option<acknowledgment::Model>>;

    /// Oldest first.
    async fn list_for_activity(
        &self,
        outbound_activity_id: &str,
    ) -> AppResult<Vec<acknowledgment::Model>>;
}

/// Rate limit buckets keyed by exact `(server_url, endpoint)`.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Looks up the bucket for this exact pair.
    async fn find(
        &self,
        server_url: &str,
        endpoint: &str,
    ) -> AppResult<Option<rate_limit_bucket::Model>>;

    /// Persists the counters of the current window.
    async fn save_window(
        &self,
        id: &str,
        current_count: i32,
        window_started_at: DateTime<Utc>,
        last_request_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Creates the bucket, or updates its limits and keeps its counters.
    async fn upsert(&self, bucket: rate_limit_bucket::Model)
    -> AppResult<rate_limit_bucket::Model>;
}

/// Capability cache.
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    /// Cached capabilities, fresh or not.
    async fn find(&self, server_url: &str) -> AppResult<Option<server_capability::Model>>;

    /// Insert or replace by `server_url`.
    async fn upsert(
        &self,
        capability: server_capability::Model,
    ) -> AppResult<server_capability::Model>;
}

/// Server blocklist.
#[async_trait]
pub trait BlocklistStore: Send + Sync {
    /// The block row, active or not.
    async fn find(&self, server_url: &str) -> AppResult<Option<blocked_server::Model>>;

    /// Inserts the block, or reactivates the existing row with the new
    /// reason and expiry.
    async fn upsert_active(&self, block: blocked_server::Model)
    -> AppResult<blocked_server::Model>;

    /// Clears `is_active`. Returns false when no active row existed.
    async fn deactivate(&self, server_url: &str, at: DateTime<Utc>) -> AppResult<bool>;

    /// Effective blocks at `now`, most recent first.
    async fn list_active(&self, now: DateTime<Utc>) -> AppResult<Vec<blocked_server::Model>>;
}

/// The singleton federation policy.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// The policy row, `None` before the first write.
    async fn load(&self) -> AppResult<Option<federation_policy::Model>>;

    /// Writes `policy` if the stored version still equals `expected_version`.
    /// An `expected_version` of `0` means no row exists yet. Returns false on
    /// a lost race.
    async fn compare_and_swap(
        &self,
        expected_version: i64,
        policy: federation_policy::Model,
    ) -> AppResult<bool>;
}

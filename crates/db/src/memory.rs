//! In-memory implementation of every store trait, for tests.
//!
//! Enforces the same uniqueness and conditional-update rules as the
//! `PostgreSQL` schema so service tests exercise real state transitions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult};
use tokio::sync::Mutex;

use crate::entities::{
    acknowledgment, blocked_server, delivery_attempt, delivery_attempt::AttemptStatus,
    federation_policy, inbound_activity, inbound_activity::InboundStatus, outbound_activity,
    outbound_activity::DeliveryStatus, rate_limit_bucket, server_capability,
};
use crate::store::{
    AcknowledgmentStore, BlocklistStore, CapabilityStore, DeliveryAttemptStore, InboxStore,
    OutboxStore, PolicyStore, RateLimitStore, StatusCounts,
};

#[derive(Default)]
struct State {
    outbound: HashMap<String, outbound_activity::Model>,
    attempts: HashMap<String, delivery_attempt::Model>,
    inbound: HashMap<String, inbound_activity::Model>,
    acks: Vec<acknowledgment::Model>,
    buckets: HashMap<String, rate_limit_bucket::Model>,
    capabilities: HashMap<String, server_capability::Model>,
    blocks: HashMap<String, blocked_server::Model>,
    policy: Option<federation_policy::Model>,
}

/// Every federation table held in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> DateTime<chrono::FixedOffset>,
{
    rows.sort_by_key(|row| std::cmp::Reverse(key(row)));
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn insert(
        &self,
        activity: outbound_activity::Model,
    ) -> AppResult<outbound_activity::Model> {
        let mut state = self.state.lock().await;
        if state.outbound.contains_key(&activity.id) {
            return Err(AppError::Database(format!(
                "duplicate outbound activity {}",
                activity.id
            )));
        }
        state.outbound.insert(activity.id.clone(), activity.clone());
        Ok(activity)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<outbound_activity::Model>> {
        Ok(self.state.lock().await.outbound.get(id).cloned())
    }

    async fn list_by_actor(
        &self,
        actor_id: &str,
        limit: u64,
    ) -> AppResult<Vec<outbound_activity::Model>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .outbound
            .values()
            .filter(|a| a.actor_id == actor_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |a| a.created_at);
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn mark_delivered(&self, id: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.outbound.get_mut(id) {
            Some(a) if a.delivery_status == DeliveryStatus::Pending => {
                a.delivery_status = DeliveryStatus::Delivered;
                a.delivered_at = Some(at.into());
                a.updated_at = at.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: &str, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.outbound.get_mut(id) {
            Some(a) if a.delivery_status == DeliveryStatus::Pending => {
                a.delivery_status = DeliveryStatus::Failed;
                a.error_message = Some(reason.to_string());
                a.updated_at = at.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_expired(&self, id: &str, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.outbound.get_mut(id) {
            Some(a) if a.delivery_status == DeliveryStatus::Pending => {
                a.delivery_status = DeliveryStatus::Expired;
                a.error_message = Some(reason.to_string());
                a.updated_at = at.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_error(&self, id: &str, error: &str, at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(a) = state
            .outbound
            .get_mut(id)
            .filter(|a| a.delivery_status == DeliveryStatus::Pending)
        {
            a.error_message = Some(error.to_string());
            a.updated_at = at.into();
        }
        Ok(())
    }

    async fn mark_acknowledged(&self, id: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.outbound.get_mut(id) {
            Some(a) if a.acknowledged_at.is_none() => {
                a.acknowledged_at = Some(at.into());
                a.updated_at = at.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let mut expired = 0;
        for a in state.outbound.values_mut() {
            if a.delivery_status == DeliveryStatus::Pending && a.created_at < cutoff {
                a.delivery_status = DeliveryStatus::Expired;
                a.error_message = Some(reason.to_string());
                a.updated_at = at.into();
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn find_unattempted_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<outbound_activity::Model>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .outbound
            .values()
            .filter(|a| a.delivery_status == DeliveryStatus::Pending && a.created_at <= cutoff)
            .filter(|a| {
                !state
                    .attempts
                    .values()
                    .any(|attempt| attempt.outbound_activity_id == a.id)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.created_at);
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn status_counts(&self) -> AppResult<StatusCounts> {
        let state = self.state.lock().await;
        let mut counts = StatusCounts::default();
        for a in state.outbound.values() {
            counts.total += 1;
            match a.delivery_status {
                DeliveryStatus::Delivered => counts.delivered += 1,
                DeliveryStatus::Failed | DeliveryStatus::Expired => counts.failed += 1,
                DeliveryStatus::Pending => counts.pending += 1,
            }
        }
        Ok(counts)
    }

    async fn average_latency_ms(&self, since: DateTime<Utc>) -> AppResult<Option<f64>> {
        let state = self.state.lock().await;
        let latencies: Vec<f64> = state
            .outbound
            .values()
            .filter(|a| a.delivery_status == DeliveryStatus::Delivered)
            .filter_map(|a| {
                let delivered = a.delivered_at?;
                (delivered >= since).then(|| (delivered - a.created_at).num_milliseconds() as f64)
            })
            .collect();

        if latencies.is_empty() {
            return Ok(None);
        }
        Ok(Some(latencies.iter().sum::<f64>() / latencies.len() as f64))
    }
}

#[async_trait]
impl DeliveryAttemptStore for MemoryStore {
    async fn insert(
        &self,
        attempt: delivery_attempt::Model,
    ) -> AppResult<delivery_attempt::Model> {
        let mut state = self.state.lock().await;
        let clash = state.attempts.values().any(|a| {
            a.outbound_activity_id == attempt.outbound_activity_id
                && a.attempt_number == attempt.attempt_number
        });
        if clash {
            return Err(AppError::Database(format!(
                "duplicate attempt {} for {}",
                attempt.attempt_number, attempt.outbound_activity_id
            )));
        }
        state.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(attempt)
    }

    async fn max_attempt_number(&self, outbound_activity_id: &str) -> AppResult<i32> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .values()
            .filter(|a| a.outbound_activity_id == outbound_activity_id)
            .map(|a| a.attempt_number)
            .max()
            .unwrap_or(0))
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<delivery_attempt::Model>> {
        let state = self.state.lock().await;
        let mut due: Vec<_> = state
            .attempts
            .values()
            .filter(|a| a.status == AttemptStatus::Pending)
            .filter(|a| a.next_retry_at.is_some_and(|t| t <= now))
            .cloned()
            .collect();
        due.sort_by_key(|a| a.next_retry_at);
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(due)
    }

    async fn complete(
        &self,
        id: &str,
        status: AttemptStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.attempts.get_mut(id) {
            Some(a) if a.status == AttemptStatus::Pending => {
                a.status = status;
                if let Some(error) = error {
                    a.error_message = Some(error.to_string());
                }
                a.updated_at = at.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_activity(
        &self,
        outbound_activity_id: &str,
    ) -> AppResult<Vec<delivery_attempt::Model>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .attempts
            .values()
            .filter(|a| a.outbound_activity_id == outbound_activity_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.attempt_number);
        Ok(rows)
    }
}

#[async_trait]
impl InboxStore for MemoryStore {
    async fn insert(
        &self,
        activity: inbound_activity::Model,
    ) -> AppResult<inbound_activity::Model> {
        let mut state = self.state.lock().await;
        if let Some(message_id) = &activity.remote_message_id {
            let clash = state.inbound.values().any(|i| {
                i.actor_server == activity.actor_server
                    && i.remote_message_id.as_ref() == Some(message_id)
            });
            if clash {
                return Err(AppError::Database(format!(
                    "duplicate remote message {message_id}"
                )));
            }
        }
        state.inbound.insert(activity.id.clone(), activity.clone());
        Ok(activity)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<inbound_activity::Model>> {
        Ok(self.state.lock().await.inbound.get(id).cloned())
    }

    async fn find_by_remote_message(
        &self,
        actor_server: &str,
        remote_message_id: &str,
    ) -> AppResult<Option<inbound_activity::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .inbound
            .values()
            .find(|i| {
                i.actor_server == actor_server
                    && i.remote_message_id.as_deref() == Some(remote_message_id)
            })
            .cloned())
    }

    async fn list_for_target(
        &self,
        target_id: &str,
        limit: u64,
    ) -> AppResult<Vec<inbound_activity::Model>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .inbound
            .values()
            .filter(|i| i.target_id.as_deref().is_none_or(|t| t == target_id))
            .cloned()
            .collect();
        newest_first(&mut rows, |i| i.received_at);
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn mark_processing(&self, id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.inbound.get_mut(id) {
            Some(i) if i.status == InboundStatus::Received => {
                i.status = InboundStatus::Processing;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_processed(
        &self,
        id: &str,
        processed_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(i) = state.inbound.get_mut(id) {
            i.status = InboundStatus::Processed;
            i.processed_by = processed_by.map(ToString::to_string);
            i.processed_at = Some(at.into());
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str, at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(i) = state.inbound.get_mut(id) {
            i.status = InboundStatus::Failed;
            i.error_message = Some(error.to_string());
            i.processed_at = Some(at.into());
        }
        Ok(())
    }
}

#[async_trait]
impl AcknowledgmentStore for MemoryStore {
    async fn insert_if_absent(
        &self,
        ack: acknowledgment::Model,
    ) -> AppResult<Option<acknowledgment::Model>> {
        let mut state = self.state.lock().await;
        let duplicate = state.acks.iter().any(|k| {
            k.outbound_activity_id == ack.outbound_activity_id
                && k.receiver_server == ack.receiver_server
        });
        if duplicate {
            return Ok(None);
        }
        state.acks.push(ack.clone());
        Ok(Some(ack))
    }

    async fn list_for_activity(
        &self,
        outbound_activity_id: &str,
    ) -> AppResult<Vec<acknowledgment::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .acks
            .iter()
            .filter(|k| k.outbound_activity_id == outbound_activity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn find(
        &self,
        server_url: &str,
        endpoint: &str,
    ) -> AppResult<Option<rate_limit_bucket::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .buckets
            .values()
            .find(|b| b.server_url == server_url && b.endpoint == endpoint)
            .cloned())
    }

    async fn save_window(
        &self,
        id: &str,
        current_count: i32,
        window_started_at: DateTime<Utc>,
        last_request_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(b) = state.buckets.get_mut(id) {
            b.current_count = current_count;
            b.window_started_at = window_started_at.into();
            b.last_request_at = Some(last_request_at.into());
            b.updated_at = last_request_at.into();
        }
        Ok(())
    }

    async fn upsert(
        &self,
        bucket: rate_limit_bucket::Model,
    ) -> AppResult<rate_limit_bucket::Model> {
        let mut state = self.state.lock().await;
        let existing = state
            .buckets
            .values_mut()
            .find(|b| b.server_url == bucket.server_url && b.endpoint == bucket.endpoint);

        if let Some(existing) = existing {
            existing.requests_per_minute = bucket.requests_per_minute;
            existing.burst_allowance = bucket.burst_allowance;
            existing.updated_at = bucket.updated_at;
            return Ok(existing.clone());
        }
        state.buckets.insert(bucket.id.clone(), bucket.clone());
        Ok(bucket)
    }
}

#[async_trait]
impl CapabilityStore for MemoryStore {
    async fn find(&self, server_url: &str) -> AppResult<Option<server_capability::Model>> {
        Ok(self.state.lock().await.capabilities.get(server_url).cloned())
    }

    async fn upsert(
        &self,
        capability: server_capability::Model,
    ) -> AppResult<server_capability::Model> {
        let mut state = self.state.lock().await;
        let stored = match state.capabilities.get(&capability.server_url) {
            Some(existing) => server_capability::Model {
                id: existing.id.clone(),
                created_at: existing.created_at,
                ..capability
            },
            None => capability,
        };
        state
            .capabilities
            .insert(stored.server_url.clone(), stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl BlocklistStore for MemoryStore {
    async fn find(&self, server_url: &str) -> AppResult<Option<blocked_server::Model>> {
        Ok(self.state.lock().await.blocks.get(server_url).cloned())
    }

    async fn upsert_active(
        &self,
        block: blocked_server::Model,
    ) -> AppResult<blocked_server::Model> {
        let mut state = self.state.lock().await;
        let stored = match state.blocks.get(&block.server_url) {
            Some(existing) => blocked_server::Model {
                id: existing.id.clone(),
                created_at: existing.created_at,
                is_active: true,
                ..block
            },
            None => block,
        };
        state.blocks.insert(stored.server_url.clone(), stored.clone());
        Ok(stored)
    }

    async fn deactivate(&self, server_url: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.blocks.get_mut(server_url) {
            Some(b) if b.is_active => {
                b.is_active = false;
                b.updated_at = at.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_active(&self, now: DateTime<Utc>) -> AppResult<Vec<blocked_server::Model>> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .blocks
            .values()
            .filter(|b| b.is_effective(now))
            .cloned()
            .collect();
        newest_first(&mut rows, |b| b.blocked_at);
        Ok(rows)
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn load(&self) -> AppResult<Option<federation_policy::Model>> {
        Ok(self.state.lock().await.policy.clone())
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        policy: federation_policy::Model,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let current = state.policy.as_ref().map_or(0, |p| p.version);
        if current != expected_version {
            return Ok(false);
        }
        state.policy = Some(federation_policy::Model {
            id: federation_policy::POLICY_ID,
            ..policy
        });
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity(id: &str) -> outbound_activity::Model {
        outbound_activity::Model {
            id: id.to_string(),
            activity_type: "Follow".to_string(),
            actor_id: "alice".to_string(),
            target_server: "https://b.example".to_string(),
            target_id: None,
            payload: json!({}),
            delivery_status: DeliveryStatus::Pending,
            delivered_at: None,
            acknowledged_at: None,
            error_message: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_terminal_status_is_sticky() {
        let store = MemoryStore::new();
        OutboxStore::insert(&store, activity("a1")).await.unwrap();

        assert!(store.mark_delivered("a1", Utc::now()).await.unwrap());
        assert!(
            !OutboxStore::mark_failed(&store, "a1", "late", Utc::now())
                .await
                .unwrap()
        );

        let stored = OutboxStore::find_by_id(&store, "a1").await.unwrap().unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Delivered);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn test_policy_cas_rejects_stale_version() {
        let store = MemoryStore::new();
        let policy = federation_policy::Model {
            id: 1,
            mode: federation_policy::FederationMode::Soft,
            allow_unknown_servers: true,
            require_capability_negotiation: false,
            strict_validation: false,
            log_unknown_servers: true,
            auto_block_malicious: false,
            version: 1,
            updated_at: Utc::now().into(),
        };

        assert!(store.compare_and_swap(0, policy.clone()).await.unwrap());
        assert!(!store.compare_and_swap(0, policy.clone()).await.unwrap());
        assert!(
            store
                .compare_and_swap(1, federation_policy::Model { version: 2, ..policy })
                .await
                .unwrap()
        );
    }
}

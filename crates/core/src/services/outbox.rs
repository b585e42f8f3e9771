//! Outbound activity publishing.

use std::sync::Arc;

use chrono::Utc;
use fedinet_common::{AppError, AppResult, IdGenerator};
use fedinet_db::{
    OutboxStore,
    entities::outbound_activity::{self, DeliveryStatus},
};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use super::jobs::{FederationTask, TaskQueue};
use crate::envelope::normalize_server_url;

/// Input for publishing an activity to a remote server.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PublishInput {
    /// Activity type such as `Follow`.
    #[validate(length(min = 1, max = 64))]
    pub activity_type: String,

    /// Local actor sending the activity.
    #[validate(length(min = 1, max = 256))]
    pub actor_id: String,

    /// Base URL of the receiving server.
    #[validate(length(min = 1, max = 512))]
    pub target_server: String,

    /// Remote actor or object the activity targets.
    #[serde(default)]
    #[validate(length(max = 256))]
    pub target_id: Option<String>,

    /// Activity body, passed through untouched.
    #[serde(default)]
    pub payload: Value,
}

/// Accepts activities for delivery.
///
/// Publishing persists the activity as pending and queues the first
/// delivery attempt. The caller never waits on the network.
#[derive(Clone)]
pub struct OutboxPublisher {
    store: Arc<dyn OutboxStore>,
    queue: Arc<dyn TaskQueue>,
    id_gen: IdGenerator,
}

impl OutboxPublisher {
    /// Create a new outbox publisher.
    #[must_use]
    pub fn new(store: Arc<dyn OutboxStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            store,
            queue,
            id_gen: IdGenerator::new(),
        }
    }

    /// Persist an activity and schedule its delivery.
    pub async fn publish(&self, input: PublishInput) -> AppResult<outbound_activity::Model> {
        input.validate()?;

        let target_server = normalize_server_url(&input.target_server);
        url::Url::parse(&target_server).map_err(|e| {
            AppError::Validation(format!("target_server is not an absolute URL: {e}"))
        })?;
        if input.payload.is_null() {
            return Err(AppError::Validation("payload is required".to_string()));
        }

        let now = Utc::now();
        let activity = self
            .store
            .insert(outbound_activity::Model {
                id: self.id_gen.generate(),
                activity_type: input.activity_type,
                actor_id: input.actor_id,
                target_server,
                target_id: input.target_id,
                payload: input.payload,
                delivery_status: DeliveryStatus::Pending,
                delivered_at: None,
                acknowledged_at: None,
                error_message: None,
                created_at: now.into(),
                updated_at: now.into(),
            })
            .await?;

        tracing::info!(
            activity_id = %activity.id,
            activity_type = %activity.activity_type,
            target = %activity.target_server,
            "Activity queued for delivery"
        );

        // A lost enqueue only delays delivery: the retry sweep also pushes
        // pending activities that have no attempt row.
        if let Err(e) = self
            .queue
            .enqueue(FederationTask::Deliver {
                activity_id: activity.id.clone(),
            })
            .await
        {
            tracing::warn!(activity_id = %activity.id, error = %e, "Failed to enqueue delivery");
        }

        Ok(activity)
    }

    /// Load an outbound activity.
    pub async fn find(&self, id: &str) -> AppResult<outbound_activity::Model> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("outbound activity {id}")))
    }

    /// Newest first.
    pub async fn list_by_actor(
        &self,
        actor_id: &str,
        limit: u64,
    ) -> AppResult<Vec<outbound_activity::Model>> {
        self.store.list_by_actor(actor_id, limit).await
    }
}

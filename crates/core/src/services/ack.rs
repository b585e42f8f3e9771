//! Delivery acknowledgments.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult, IdGenerator};
use fedinet_db::{
    AcknowledgmentStore, OutboxStore,
    entities::acknowledgment::{self, AckStatus},
};
use serde::Deserialize;

use super::transport::FederationTransport;
use crate::envelope::{AckEnvelope, normalize_server_url};

/// An acknowledgment received for one of our outbound activities.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordAckInput {
    /// Our outbound activity id.
    pub message_id: String,
    /// Defaults to the activity's target server.
    #[serde(default)]
    pub receiver_server: Option<String>,
    /// How far the receiver got.
    pub status: AckStatus,
    /// Why processing failed, if it did.
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<AckEnvelope> for RecordAckInput {
    fn from(ack: AckEnvelope) -> Self {
        Self {
            message_id: ack.message_id,
            receiver_server: ack.receiver_server,
            status: ack.status,
            reason: ack.reason,
        }
    }
}

/// Result of recording an acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Stored as the receiver's first acknowledgment.
    Recorded(acknowledgment::Model),
    /// The receiver had already acknowledged this activity.
    Duplicate,
}

/// Records acknowledgments from receivers and sends our own.
#[derive(Clone)]
pub struct AckTracker {
    outbox: Arc<dyn OutboxStore>,
    acks: Arc<dyn AcknowledgmentStore>,
    transport: Arc<dyn FederationTransport>,
    local_server: String,
    id_gen: IdGenerator,
}

impl AckTracker {
    /// Create a new acknowledgment tracker.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        acks: Arc<dyn AcknowledgmentStore>,
        transport: Arc<dyn FederationTransport>,
        local_server: String,
    ) -> Self {
        Self {
            outbox,
            acks,
            transport,
            local_server,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record an acknowledgment at the current time.
    pub async fn record_ack(&self, input: RecordAckInput) -> AppResult<AckOutcome> {
        self.record_ack_at(input, Utc::now()).await
    }

    /// Store an acknowledgment. A `processed` ack also stamps the activity's
    /// `acknowledged_at`.
    pub async fn record_ack_at(
        &self,
        input: RecordAckInput,
        now: DateTime<Utc>,
    ) -> AppResult<AckOutcome> {
        if input.message_id.trim().is_empty() {
            return Err(AppError::Validation("message_id is required".to_string()));
        }

        let activity = self
            .outbox
            .find_by_id(&input.message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("outbound activity {}", input.message_id)))?;

        let receiver_server = input
            .receiver_server
            .as_deref()
            .map_or_else(|| activity.target_server.clone(), normalize_server_url);

        let inserted = self
            .acks
            .insert_if_absent(acknowledgment::Model {
                id: self.id_gen.generate(),
                outbound_activity_id: activity.id.clone(),
                sender_server: self.local_server.clone(),
                receiver_server: receiver_server.clone(),
                status: input.status,
                reason: input.reason,
                created_at: now.into(),
            })
            .await?;

        let Some(ack) = inserted else {
            // A later `processed` still stamps the activity even though only
            // the first acknowledgment per receiver is stored.
            if input.status == AckStatus::Processed {
                self.outbox.mark_acknowledged(&activity.id, now).await?;
            }
            tracing::debug!(
                activity_id = %activity.id,
                receiver = %receiver_server,
                "Duplicate acknowledgment ignored"
            );
            return Ok(AckOutcome::Duplicate);
        };

        if ack.status == AckStatus::Processed {
            self.outbox.mark_acknowledged(&activity.id, now).await?;
        }

        tracing::info!(
            activity_id = %activity.id,
            receiver = %receiver_server,
            status = ?ack.status,
            "Acknowledgment recorded"
        );

        Ok(AckOutcome::Recorded(ack))
    }

    /// Acknowledgments received for an activity.
    pub async fn list_for_activity(
        &self,
        activity_id: &str,
    ) -> AppResult<Vec<acknowledgment::Model>> {
        self.acks.list_for_activity(activity_id).await
    }

    /// Best-effort send. Failures are logged, never retried.
    pub async fn send_ack(&self, server_url: &str, ack: &AckEnvelope) {
        match self.transport.send_ack(server_url, ack).await {
            Ok(()) => tracing::debug!(
                server = %server_url,
                message_id = %ack.message_id,
                "Acknowledgment sent"
            ),
            Err(e) => tracing::warn!(
                server = %server_url,
                message_id = %ack.message_id,
                error = %e,
                "Failed to send acknowledgment"
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::Harness;

    fn input(id: &str, status: AckStatus) -> RecordAckInput {
        RecordAckInput {
            message_id: id.to_string(),
            receiver_server: None,
            status,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_processed_ack_stamps_activity() {
        let harness = Harness::new();
        let tracker = harness.acks();
        let activity = harness.publish("Follow", "https://b.example").await;

        let outcome = tracker
            .record_ack(input(&activity.id, AckStatus::Processed))
            .await
            .unwrap();

        let AckOutcome::Recorded(ack) = outcome else {
            panic!("expected a recorded ack");
        };
        assert_eq!(ack.receiver_server, "https://b.example");
        assert_eq!(ack.sender_server, crate::test_support::LOCAL);

        let stored = OutboxStore::find_by_id(harness.store.as_ref(), &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.acknowledged_at.is_some());
    }

    #[tokio::test]
    async fn test_received_ack_does_not_stamp_activity() {
        let harness = Harness::new();
        let tracker = harness.acks();
        let activity = harness.publish("Follow", "https://b.example").await;

        tracker
            .record_ack(input(&activity.id, AckStatus::Received))
            .await
            .unwrap();

        let stored = OutboxStore::find_by_id(harness.store.as_ref(), &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.acknowledged_at.is_none());
    }

    #[tokio::test]
    async fn test_second_ack_from_same_receiver_is_duplicate() {
        let harness = Harness::new();
        let tracker = harness.acks();
        let activity = harness.publish("Follow", "https://b.example").await;

        tracker
            .record_ack(input(&activity.id, AckStatus::Received))
            .await
            .unwrap();
        let second = tracker
            .record_ack(input(&activity.id, AckStatus::Processed))
            .await
            .unwrap();

        assert_eq!(second, AckOutcome::Duplicate);
        assert_eq!(tracker.list_for_activity(&activity.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_processed_after_received_stamps_acknowledged_at() {
        let harness = Harness::new();
        let tracker = harness.acks();
        let activity = harness.publish("Follow", "https://b.example").await;

        tracker
            .record_ack(input(&activity.id, AckStatus::Received))
            .await
            .unwrap();
        let after_received = OutboxStore::find_by_id(harness.store.as_ref(), &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert!(after_received.acknowledged_at.is_none());

        tracker
            .record_ack(input(&activity.id, AckStatus::Processed))
            .await
            .unwrap();
        let after_processed = OutboxStore::find_by_id(harness.store.as_ref(), &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert!(after_processed.acknowledged_at.is_some());
    }

    #[tokio::test]
    async fn test_ack_for_unknown_activity() {
        let harness = Harness::new();

        let result = harness
            .acks()
            .record_ack(input("missing", AckStatus::Processed))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_send_ack_swallows_transport_failure() {
        let harness = Harness::new();
        harness.transport.fail_acks();
        let ack = AckEnvelope {
            message_id: "m-1".to_string(),
            status: AckStatus::Received,
            reason: None,
            receiver_server: None,
        };

        harness.acks().send_ack("https://c.example", &ack).await;

        assert!(harness.transport.acks().is_empty());
    }
}

//! Outbound delivery with retry, backoff and expiration.
//!
//! The first push of an activity is eager and leaves no attempt row. Each
//! failure after that schedules the next [`delivery_attempt`] row with a fixed
//! backoff, and the failure that would schedule attempt
//! `MAX_RETRY_ATTEMPTS + 1` expires the activity instead. Blocked targets,
//! unknown targets under hard mode, and capability mismatches fail the
//! activity immediately without scheduling anything. Whether a refusal is
//! final or retried is decided by [`AppError::is_terminal`].
//!
//! The retry sweep also picks up pending activities that never got their
//! eager push, for example because the task queue was closed or the process
//! stopped before a worker ran it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fedinet_common::{AppError, AppResult, IdGenerator};
use fedinet_db::{
    DeliveryAttemptStore, OutboxStore,
    entities::{
        delivery_attempt::{self, AttemptStatus},
        federation_policy::FederationMode,
        outbound_activity::{self, DeliveryStatus},
    },
};

use super::FederationGuards;
use super::identity::ActivitySigner;
use super::rate_limit::Admission;
use super::transport::FederationTransport;
use crate::envelope::InboxEnvelope;

/// Attempt rows an activity may accumulate before it expires.
pub const MAX_RETRY_ATTEMPTS: i32 = 6;

const BACKOFF_SCHEDULE: [i64; 6] = [30, 60, 300, 900, 3600, 21600];

/// Rate limit endpoint counted for pushes to a remote server.
const OUTBOUND_ENDPOINT: &str = "/outbox";

/// Delay before retry attempt `attempt`. Clamped to the schedule's ends.
#[must_use]
pub fn backoff_seconds(attempt: i32) -> i64 {
    let index = usize::try_from(attempt.clamp(1, MAX_RETRY_ATTEMPTS) - 1).unwrap_or(0);
    BACKOFF_SCHEDULE
        .get(index)
        .copied()
        .unwrap_or(BACKOFF_SCHEDULE[BACKOFF_SCHEDULE.len() - 1])
}

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The remote inbox accepted the envelope.
    Delivered,
    /// The push failed and attempt row `attempt` will run at `next_retry_at`.
    RetryScheduled {
        /// Number of the scheduled attempt, starting at 1.
        attempt: i32,
        /// When the sweep will pick the attempt up.
        next_retry_at: DateTime<Utc>,
    },
    /// Retries are exhausted. The activity is now `expired`.
    Expired,
    /// Terminal refusal. The activity is now `failed`.
    Rejected(String),
    /// The activity had already left `pending`.
    AlreadyFinal(DeliveryStatus),
}

/// Tally of one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Due attempts plus never-attempted activities taken in this sweep.
    pub picked: usize,
    /// Pushes the remote accepted.
    pub delivered: usize,
    /// Failures that scheduled another attempt.
    pub rescheduled: usize,
    /// Activities that ran out of attempts.
    pub expired: usize,
    /// Terminal refusals.
    pub rejected: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::RetryScheduled { .. } => self.rescheduled += 1,
            DeliveryOutcome::Expired => self.expired += 1,
            DeliveryOutcome::Rejected(_) => self.rejected += 1,
            DeliveryOutcome::AlreadyFinal(_) => {}
        }
    }
}

/// Delivery engine settings.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Our own base URL, sent as `actor_server`.
    pub local_server: String,
    /// Most attempts, and separately most never-attempted activities, one
    /// sweep takes.
    pub retry_batch_size: u64,
    /// Pending activities older than this are force-expired.
    pub stale_after: Duration,
}

enum PushResult {
    Delivered,
    Refused(AppError),
}

/// Pushes outbound activities to remote inboxes.
#[derive(Clone)]
pub struct DeliveryEngine {
    outbox: Arc<dyn OutboxStore>,
    attempts: Arc<dyn DeliveryAttemptStore>,
    guards: FederationGuards,
    transport: Arc<dyn FederationTransport>,
    signer: Arc<dyn ActivitySigner>,
    settings: DeliverySettings,
    id_gen: IdGenerator,
}

impl DeliveryEngine {
    /// Create a new delivery engine.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        attempts: Arc<dyn DeliveryAttemptStore>,
        guards: FederationGuards,
        transport: Arc<dyn FederationTransport>,
        signer: Arc<dyn ActivitySigner>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            outbox,
            attempts,
            guards,
            transport,
            signer,
            settings,
            id_gen: IdGenerator::new(),
        }
    }

    /// Deliver an activity now.
    pub async fn deliver(&self, activity_id: &str) -> AppResult<DeliveryOutcome> {
        self.deliver_at(activity_id, Utc::now()).await
    }

    /// Eager delivery of a freshly published activity.
    pub async fn deliver_at(
        &self,
        activity_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<DeliveryOutcome> {
        let activity = self.find_activity(activity_id).await?;
        if activity.delivery_status != DeliveryStatus::Pending {
            return Ok(DeliveryOutcome::AlreadyFinal(activity.delivery_status));
        }

        match self.try_push(&activity, now).await? {
            PushResult::Delivered => {
                self.mark_delivered(&activity, now).await?;
                Ok(DeliveryOutcome::Delivered)
            }
            PushResult::Refused(err) if err.is_terminal() => self.reject(&activity, &err, now).await,
            PushResult::Refused(err) => {
                self.schedule_retry(&activity, &err.to_string(), now).await
            }
        }
    }

    /// Retry every attempt due at `now`, up to the batch size, then push
    /// pending activities that never had a delivery attempt.
    ///
    /// An activity counts as never attempted once it has sat without an
    /// attempt row for the first backoff step. A failing item is logged and
    /// skipped. The rest of the batch still runs.
    pub async fn process_due_retries_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let due = self
            .attempts
            .find_due(now, self.settings.retry_batch_size)
            .await?;
        let unattempted = self
            .outbox
            .find_unattempted_pending(
                now - Duration::seconds(BACKOFF_SCHEDULE[0]),
                self.settings.retry_batch_size,
            )
            .await?;

        let mut report = SweepReport {
            picked: due.len() + unattempted.len(),
            ..SweepReport::default()
        };

        for attempt in due {
            match self.retry(&attempt, now).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => tracing::error!(
                    attempt_id = %attempt.id,
                    activity_id = %attempt.outbound_activity_id,
                    error = %e,
                    "Retry attempt failed"
                ),
            }
        }

        for activity in unattempted {
            match self.deliver_at(&activity.id, now).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => tracing::error!(
                    activity_id = %activity.id,
                    error = %e,
                    "Delivery of unattempted activity failed"
                ),
            }
        }

        if report.picked > 0 {
            tracing::info!(
                picked = report.picked,
                delivered = report.delivered,
                rescheduled = report.rescheduled,
                expired = report.expired,
                rejected = report.rejected,
                "Retry sweep finished"
            );
        }

        Ok(report)
    }

    /// Expire every activity still pending after `stale_after`.
    pub async fn expire_stale_at(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = now - self.settings.stale_after;
        let reason = format!(
            "Expired: still pending after {}h",
            self.settings.stale_after.num_hours()
        );

        let expired = self
            .outbox
            .expire_pending_before(cutoff, &reason, now)
            .await?;

        if expired > 0 {
            tracing::info!(count = expired, "Expired stale outbound activities");
        }

        Ok(expired)
    }

    /// Attempt trail of an activity, oldest first.
    pub async fn attempts_for(&self, activity_id: &str) -> AppResult<Vec<delivery_attempt::Model>> {
        self.find_activity(activity_id).await?;
        self.attempts.list_for_activity(activity_id).await
    }

    async fn find_activity(&self, activity_id: &str) -> AppResult<outbound_activity::Model> {
        self.outbox
            .find_by_id(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("outbound activity {activity_id}")))
    }

    async fn retry(
        &self,
        attempt: &delivery_attempt::Model,
        now: DateTime<Utc>,
    ) -> AppResult<DeliveryOutcome> {
        let Some(activity) = self
            .outbox
            .find_by_id(&attempt.outbound_activity_id)
            .await?
        else {
            self.attempts
                .complete(
                    &attempt.id,
                    AttemptStatus::Failed,
                    Some("outbound activity missing"),
                    now,
                )
                .await?;
            return Err(AppError::NotFound(format!(
                "outbound activity {}",
                attempt.outbound_activity_id
            )));
        };

        if activity.delivery_status != DeliveryStatus::Pending {
            let status = if activity.delivery_status == DeliveryStatus::Delivered {
                AttemptStatus::Success
            } else {
                AttemptStatus::Failed
            };
            self.attempts.complete(&attempt.id, status, None, now).await?;
            return Ok(DeliveryOutcome::AlreadyFinal(activity.delivery_status));
        }

        match self.try_push(&activity, now).await? {
            PushResult::Delivered => {
                self.attempts
                    .complete(&attempt.id, AttemptStatus::Success, None, now)
                    .await?;
                self.mark_delivered(&activity, now).await?;
                Ok(DeliveryOutcome::Delivered)
            }
            PushResult::Refused(err) => {
                let reason = err.to_string();
                self.attempts
                    .complete(&attempt.id, AttemptStatus::Failed, Some(&reason), now)
                    .await?;
                if err.is_terminal() {
                    self.reject(&activity, &err, now).await
                } else {
                    self.schedule_retry(&activity, &reason, now).await
                }
            }
        }
    }

    async fn try_push(
        &self,
        activity: &outbound_activity::Model,
        now: DateTime<Utc>,
    ) -> AppResult<PushResult> {
        let target = activity.target_server.as_str();

        if self.guards.blocklist.is_blocked_at(target, now).await? {
            return Ok(PushResult::Refused(AppError::ServerBlocked(format!(
                "target server {target} is blocked"
            ))));
        }

        let policy = self.guards.mode.get_policy().await?;
        if policy.mode == FederationMode::Hard
            && !self.guards.capabilities.is_known_server(target).await?
        {
            return Ok(PushResult::Refused(AppError::Protocol(format!(
                "target server {target} is unknown under hard federation mode"
            ))));
        }

        if self
            .guards
            .rate_limiter
            .admit_at(target, OUTBOUND_ENDPOINT, now)
            .await?
            == Admission::Denied
        {
            return Ok(PushResult::Refused(AppError::RateLimited(format!(
                "outbound pushes to {target}"
            ))));
        }

        let mut envelope = InboxEnvelope::from_outbound(activity, &self.settings.local_server);
        envelope.signature = self.signer.sign(&envelope.signing_bytes())?;

        if policy.require_capability_negotiation {
            let capabilities = match self
                .guards
                .capabilities
                .get_capabilities_at(target, now)
                .await
            {
                Ok(capabilities) => capabilities,
                Err(e) => {
                    return Ok(PushResult::Refused(AppError::DiscoveryFailed(
                        e.detail().to_string(),
                    )));
                }
            };

            let size = i64::try_from(envelope.encoded_len()?).unwrap_or(i64::MAX);
            if capabilities.max_message_size > 0 && size > capabilities.max_message_size {
                return Ok(PushResult::Refused(AppError::Protocol(format!(
                    "message of {size} bytes exceeds {target} limit of {}",
                    capabilities.max_message_size
                ))));
            }

            if policy.strict_validation
                && !capabilities
                    .supported_types
                    .iter()
                    .any(|t| t == &activity.activity_type)
            {
                return Ok(PushResult::Refused(AppError::Protocol(format!(
                    "{target} does not support {}",
                    activity.activity_type
                ))));
            }
        }

        match self.transport.push(target, &envelope).await {
            Ok(()) => Ok(PushResult::Delivered),
            Err(e) => Ok(PushResult::Refused(e.into())),
        }
    }

    async fn mark_delivered(
        &self,
        activity: &outbound_activity::Model,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.outbox.mark_delivered(&activity.id, now).await? {
            tracing::info!(
                activity_id = %activity.id,
                target = %activity.target_server,
                "Activity delivered"
            );
        }
        Ok(())
    }

    async fn reject(
        &self,
        activity: &outbound_activity::Model,
        err: &AppError,
        now: DateTime<Utc>,
    ) -> AppResult<DeliveryOutcome> {
        let reason = err.to_string();
        self.outbox.mark_failed(&activity.id, &reason, now).await?;

        tracing::warn!(
            activity_id = %activity.id,
            target = %activity.target_server,
            error = %reason,
            "Delivery refused"
        );

        Ok(DeliveryOutcome::Rejected(reason))
    }

    async fn schedule_retry(
        &self,
        activity: &outbound_activity::Model,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<DeliveryOutcome> {
        let attempt = self.attempts.max_attempt_number(&activity.id).await? + 1;

        if attempt > MAX_RETRY_ATTEMPTS {
            let message = format!("Max retries exceeded: {reason}");
            self.outbox.mark_expired(&activity.id, &message, now).await?;
            tracing::info!(
                activity_id = %activity.id,
                target = %activity.target_server,
                attempts = MAX_RETRY_ATTEMPTS,
                "Activity expired"
            );
            return Ok(DeliveryOutcome::Expired);
        }

        let backoff = backoff_seconds(attempt);
        let next_retry_at = now + Duration::seconds(backoff);

        self.attempts
            .insert(delivery_attempt::Model {
                id: self.id_gen.generate(),
                outbound_activity_id: activity.id.clone(),
                attempt_number: attempt,
                status: AttemptStatus::Pending,
                error_message: Some(reason.to_string()),
                next_retry_at: Some(next_retry_at.into()),
                backoff_seconds: i32::try_from(backoff).unwrap_or(i32::MAX),
                created_at: now.into(),
                updated_at: now.into(),
            })
            .await?;
        self.outbox.record_error(&activity.id, reason, now).await?;

        tracing::warn!(
            activity_id = %activity.id,
            target = %activity.target_server,
            attempt,
            backoff_secs = backoff,
            error = %reason,
            "Delivery failed, retry scheduled"
        );

        Ok(DeliveryOutcome::RetryScheduled {
            attempt,
            next_retry_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::ack::{AckOutcome, RecordAckInput};
    use crate::services::blocklist::BlockInput;
    use crate::services::mode::PolicyUpdate;
    use crate::services::outbox::{OutboxPublisher, PublishInput};
    use crate::services::rate_limit::BucketInput;
    use crate::test_support::{Harness, RecordingQueue, capability_doc};
    use serde_json::json;
    use fedinet_db::entities::acknowledgment::AckStatus;

    async fn publish(harness: &Harness) -> outbound_activity::Model {
        harness.publish("Follow", "https://b.example").await
    }

    /// Publishes through a queue that refuses every task, so the eager push
    /// never runs.
    async fn publish_without_queue(harness: &Harness) -> outbound_activity::Model {
        OutboxPublisher::new(harness.store.clone(), Arc::new(RecordingQueue::closed()))
            .publish(PublishInput {
                activity_type: "Follow".to_string(),
                actor_id: "alice".to_string(),
                target_server: "https://b.example".to_string(),
                target_id: None,
                payload: json!({"type": "Follow"}),
            })
            .await
            .unwrap()
    }

    async fn status(harness: &Harness, id: &str) -> DeliveryStatus {
        OutboxStore::find_by_id(harness.store.as_ref(), id)
            .await
            .unwrap()
            .unwrap()
            .delivery_status
    }

    #[test]
    fn test_backoff_schedule() {
        let schedule: Vec<i64> = (1..=6).map(backoff_seconds).collect();
        assert_eq!(schedule, vec![30, 60, 300, 900, 3600, 21600]);
        assert_eq!(backoff_seconds(7), 21600);
        assert_eq!(backoff_seconds(0), 30);
    }

    #[tokio::test]
    async fn test_successful_push_marks_delivered() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish(&harness).await;

        let outcome = engine.deliver(&activity.id).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::Delivered);
        let pushes = harness.transport.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "https://b.example");
        assert_eq!(pushes[0].1.message_id.as_deref(), Some(activity.id.as_str()));
        assert!(engine.attempts_for(&activity.id).await.unwrap().is_empty());

        let stored = OutboxStore::find_by_id(harness.store.as_ref(), &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Delivered);
        assert!(stored.delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_schedules_backoff() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish(&harness).await;
        harness.transport.fail_pushes(1);
        let now = Utc::now();

        let outcome = engine.deliver_at(&activity.id, now).await.unwrap();

        assert_eq!(
            outcome,
            DeliveryOutcome::RetryScheduled {
                attempt: 1,
                next_retry_at: now + Duration::seconds(30)
            }
        );
        let attempts = engine.attempts_for(&activity.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Pending);
        assert_eq!(attempts[0].backoff_seconds, 30);
        assert_eq!(status(&harness, &activity.id).await, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn test_expires_after_max_attempts() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish(&harness).await;
        harness.transport.fail_pushes(10);
        let mut now = Utc::now();

        let mut outcome = engine.deliver_at(&activity.id, now).await.unwrap();
        while let DeliveryOutcome::RetryScheduled { next_retry_at, .. } = outcome {
            now = next_retry_at;
            let report = engine.process_due_retries_at(now).await.unwrap();
            assert_eq!(report.picked, 1);
            outcome = if report.expired == 1 {
                DeliveryOutcome::Expired
            } else {
                let attempts = engine.attempts_for(&activity.id).await.unwrap();
                let last = attempts.last().unwrap();
                DeliveryOutcome::RetryScheduled {
                    attempt: last.attempt_number,
                    next_retry_at: last.next_retry_at.unwrap().with_timezone(&Utc),
                }
            };
        }

        assert_eq!(outcome, DeliveryOutcome::Expired);
        assert_eq!(status(&harness, &activity.id).await, DeliveryStatus::Expired);
        assert_eq!(harness.transport.pushes().len(), 7);

        let attempts = engine.attempts_for(&activity.id).await.unwrap();
        let numbers: Vec<i32> = attempts.iter().map(|a| a.attempt_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert!(attempts.iter().all(|a| a.status == AttemptStatus::Failed));

        let later = now + Duration::days(2);
        assert_eq!(engine.process_due_retries_at(later).await.unwrap().picked, 0);
    }

    #[tokio::test]
    async fn test_blocked_target_fails_without_retry() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish(&harness).await;
        harness
            .guards
            .blocklist
            .block(BlockInput {
                server_url: "https://b.example".to_string(),
                reason: "spam".to_string(),
                blocked_by: "admin".to_string(),
                expires_at: None,
            })
            .await
            .unwrap();

        let outcome = engine.deliver(&activity.id).await.unwrap();

        assert!(matches!(outcome, DeliveryOutcome::Rejected(_)));
        assert_eq!(status(&harness, &activity.id).await, DeliveryStatus::Failed);
        assert!(harness.transport.pushes().is_empty());
        assert!(engine.attempts_for(&activity.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hard_mode_unknown_target_fails_without_retry() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish(&harness).await;
        harness
            .guards
            .mode
            .set_policy(PolicyUpdate {
                mode: Some(FederationMode::Hard),
                ..PolicyUpdate::default()
            })
            .await
            .unwrap();

        let outcome = engine.deliver(&activity.id).await.unwrap();

        assert!(matches!(outcome, DeliveryOutcome::Rejected(ref m) if m.contains("unknown")));
        assert_eq!(status(&harness, &activity.id).await, DeliveryStatus::Failed);
        assert!(engine.attempts_for(&activity.id).await.unwrap().is_empty());
        assert!(harness.transport.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_hard_mode_known_target_delivers() {
        let harness = Harness::new();
        let engine = harness.engine();
        harness
            .transport
            .set_capabilities(capability_doc("https://b.example", &["Follow"]));
        harness
            .guards
            .capabilities
            .get_capabilities("https://b.example")
            .await
            .unwrap();
        harness
            .guards
            .mode
            .set_policy(PolicyUpdate {
                mode: Some(FederationMode::Hard),
                ..PolicyUpdate::default()
            })
            .await
            .unwrap();
        let activity = publish(&harness).await;

        assert_eq!(
            engine.deliver(&activity.id).await.unwrap(),
            DeliveryOutcome::Delivered
        );
    }

    #[tokio::test]
    async fn test_strict_negotiation_rejects_unsupported_type() {
        let harness = Harness::new();
        let engine = harness.engine();
        harness
            .transport
            .set_capabilities(capability_doc("https://b.example", &["Like"]));
        harness
            .guards
            .mode
            .set_policy(PolicyUpdate {
                require_capability_negotiation: Some(true),
                strict_validation: Some(true),
                ..PolicyUpdate::default()
            })
            .await
            .unwrap();
        let activity = publish(&harness).await;

        let outcome = engine.deliver(&activity.id).await.unwrap();

        assert!(matches!(outcome, DeliveryOutcome::Rejected(ref m) if m.contains("Follow")));
        assert!(harness.transport.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_negotiation_is_retried() {
        let harness = Harness::new();
        let engine = harness.engine();
        harness
            .guards
            .mode
            .set_policy(PolicyUpdate {
                require_capability_negotiation: Some(true),
                ..PolicyUpdate::default()
            })
            .await
            .unwrap();
        let activity = publish(&harness).await;

        let outcome = engine.deliver(&activity.id).await.unwrap();

        assert!(matches!(
            outcome,
            DeliveryOutcome::RetryScheduled { attempt: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_outbound_rate_limit_defers_delivery() {
        let harness = Harness::new();
        let engine = harness.engine();
        harness
            .guards
            .rate_limiter
            .upsert_bucket(BucketInput {
                server_url: "https://b.example".to_string(),
                endpoint: OUTBOUND_ENDPOINT.to_string(),
                requests_per_minute: 1,
                burst_allowance: 0,
            })
            .await
            .unwrap();
        let first = publish(&harness).await;
        let second = publish(&harness).await;

        assert_eq!(
            engine.deliver(&first.id).await.unwrap(),
            DeliveryOutcome::Delivered
        );
        assert!(matches!(
            engine.deliver(&second.id).await.unwrap(),
            DeliveryOutcome::RetryScheduled { attempt: 1, .. }
        ));
        assert_eq!(harness.transport.pushes().len(), 1);

        let attempts = engine.attempts_for(&second.id).await.unwrap();
        let reason = attempts[0].error_message.as_deref().unwrap();
        assert!(reason.starts_with("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried_not_rejected() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish(&harness).await;
        harness.transport.fail_pushes(1);

        let outcome = engine.deliver(&activity.id).await.unwrap();

        assert!(matches!(
            outcome,
            DeliveryOutcome::RetryScheduled { attempt: 1, .. }
        ));
        let stored = OutboxStore::find_by_id(harness.store.as_ref(), &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Pending);
        assert!(stored.error_message.unwrap().starts_with("Transport error"));
    }

    #[tokio::test]
    async fn test_sweep_pushes_activity_whose_enqueue_was_lost() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish_without_queue(&harness).await;
        assert!(harness.transport.pushes().is_empty());

        let report = engine
            .process_due_retries_at(Utc::now() + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(report.picked, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(harness.transport.pushes().len(), 1);
        assert_eq!(status(&harness, &activity.id).await, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn test_sweep_skips_freshly_published_activity() {
        let harness = Harness::new();
        let engine = harness.engine();
        publish_without_queue(&harness).await;

        let report = engine.process_due_retries_at(Utc::now()).await.unwrap();

        assert_eq!(report.picked, 0);
        assert!(harness.transport.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_lost_activity_enters_retry_schedule_on_failure() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish_without_queue(&harness).await;
        harness.transport.fail_pushes(1);
        let now = Utc::now() + Duration::minutes(1);

        let report = engine.process_due_retries_at(now).await.unwrap();
        assert_eq!(report.rescheduled, 1);
        let attempts = engine.attempts_for(&activity.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].attempt_number, 1);

        let report = engine
            .process_due_retries_at(now + Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(report.picked, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(harness.transport.pushes().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_completes_attempt_of_finished_activity() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish(&harness).await;
        harness.transport.fail_pushes(1);
        let now = Utc::now();
        engine.deliver_at(&activity.id, now).await.unwrap();

        OutboxStore::mark_delivered(harness.store.as_ref(), &activity.id, now)
            .await
            .unwrap();
        let report = engine
            .process_due_retries_at(now + Duration::seconds(30))
            .await
            .unwrap();

        assert_eq!(report.picked, 1);
        assert_eq!(report.delivered, 0);
        let attempts = engine.attempts_for(&activity.id).await.unwrap();
        assert_eq!(attempts[0].status, AttemptStatus::Success);
        assert_eq!(harness.transport.pushes().len(), 1);
    }

    #[tokio::test]
    async fn test_expire_stale_pending() {
        let harness = Harness::new();
        let engine = harness.engine();
        let activity = publish(&harness).await;

        let expired = engine
            .expire_stale_at(Utc::now() + Duration::hours(25))
            .await
            .unwrap();

        assert_eq!(expired, 1);
        assert_eq!(status(&harness, &activity.id).await, DeliveryStatus::Expired);
        assert_eq!(
            engine.deliver(&activity.id).await.unwrap(),
            DeliveryOutcome::AlreadyFinal(DeliveryStatus::Expired)
        );
    }

    #[tokio::test]
    async fn test_publish_deliver_ack_round_trip() {
        let harness = Harness::new();
        let activity = publish(&harness).await;
        assert_eq!(activity.delivery_status, DeliveryStatus::Pending);

        let outcome = harness.engine().deliver(&activity.id).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);

        let delivered = OutboxStore::find_by_id(harness.store.as_ref(), &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert!(delivered.delivered_at.is_some());
        assert!(delivered.acknowledged_at.is_none());

        let ack = harness
            .acks()
            .record_ack(RecordAckInput {
                message_id: activity.id.clone(),
                receiver_server: Some("https://b.example".to_string()),
                status: AckStatus::Processed,
                reason: None,
            })
            .await
            .unwrap();
        assert!(matches!(ack, AckOutcome::Recorded(_)));

        let acknowledged = OutboxStore::find_by_id(harness.store.as_ref(), &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert!(acknowledged.acknowledged_at.is_some());
    }

    #[tokio::test]
    async fn test_attempts_for_unknown_activity() {
        let harness = Harness::new();

        let result = harness.engine().attempts_for("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}

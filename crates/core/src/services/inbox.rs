//! Inbound activity intake and dispatch.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fedinet_common::{AppError, AppResult, IdGenerator};
use fedinet_db::{
    InboxStore,
    entities::{
        acknowledgment::AckStatus,
        federation_policy::{self, FederationMode},
        inbound_activity::{self, InboundStatus},
    },
};
use serde::Serialize;

use super::FederationGuards;
use super::blocklist::BlockInput;
use super::handlers::HandlerRegistry;
use super::identity::{IdentityDirectory, SignatureVerifier};
use super::jobs::{FederationTask, TaskQueue};
use crate::envelope::{AckEnvelope, InboxEnvelope, normalize_server_url};

/// Rate limit endpoint counted for inbound pushes.
pub const INBOX_ENDPOINT: &str = "/inbox";

const AUTO_BLOCK_HOURS: i64 = 24;

/// Result of an accepted push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxReceipt {
    /// Id of the stored inbound activity.
    pub activity_id: String,
    /// The sender already delivered this message.
    pub duplicate: bool,
}

/// Receives activities from remote servers.
///
/// Every check runs before anything is written, cheapest first: shape,
/// blocklist, rate limit, federation mode, user blocks, signature. Accepted
/// activities are stored as `received`, acknowledged, and dispatched in the
/// background.
#[derive(Clone)]
pub struct InboxService {
    store: Arc<dyn InboxStore>,
    guards: FederationGuards,
    identity: Arc<dyn IdentityDirectory>,
    verifier: Arc<dyn SignatureVerifier>,
    handlers: HandlerRegistry,
    queue: Arc<dyn TaskQueue>,
    local_server: String,
    id_gen: IdGenerator,
}

impl InboxService {
    /// Create a new inbox service.
    #[must_use]
    pub fn new(
        store: Arc<dyn InboxStore>,
        guards: FederationGuards,
        identity: Arc<dyn IdentityDirectory>,
        verifier: Arc<dyn SignatureVerifier>,
        handlers: HandlerRegistry,
        queue: Arc<dyn TaskQueue>,
        local_server: String,
    ) -> Self {
        Self {
            store,
            guards,
            identity,
            verifier,
            handlers,
            queue,
            local_server,
            id_gen: IdGenerator::new(),
        }
    }

    /// Accept an envelope pushed by a remote server.
    pub async fn receive(&self, envelope: InboxEnvelope) -> AppResult<InboxReceipt> {
        self.receive_at(envelope, Utc::now()).await
    }

    /// Validate and store a pushed activity.
    pub async fn receive_at(
        &self,
        mut envelope: InboxEnvelope,
        now: DateTime<Utc>,
    ) -> AppResult<InboxReceipt> {
        envelope.validate()?;
        envelope.actor_server = normalize_server_url(&envelope.actor_server);
        let sender = envelope.actor_server.clone();

        if self.guards.blocklist.is_blocked_at(&sender, now).await? {
            tracing::warn!(
                server = %sender,
                actor = %envelope.actor,
                "Rejected push from blocked server"
            );
            return Err(AppError::ServerBlocked(format!("server {sender} is blocked")));
        }

        self.guards
            .rate_limiter
            .check_at(&sender, INBOX_ENDPOINT, now)
            .await?;

        let policy = self.guards.mode.get_policy().await?;
        self.check_unknown_server(&policy, &sender).await?;

        if let Some(target) = envelope.target.as_deref() {
            if self.identity.is_user_blocked(target, &envelope.actor).await? {
                tracing::debug!(target, actor = %envelope.actor, "Target has blocked actor");
                return Err(AppError::ActorBlocked(format!(
                    "{target} has blocked {}",
                    envelope.actor
                )));
            }
        }

        self.check_signature(&policy, &envelope, now).await?;

        if let Some(message_id) = envelope.message_id.as_deref() {
            if let Some(existing) = self.store.find_by_remote_message(&sender, message_id).await? {
                return Ok(self.acknowledge_duplicate(existing).await);
            }
        }

        let record = inbound_activity::Model {
            id: self.id_gen.generate(),
            remote_message_id: envelope.message_id.clone(),
            activity_type: envelope.activity_type,
            actor_id: envelope.actor,
            actor_server: sender.clone(),
            target_id: envelope.target,
            payload: envelope.payload,
            received_at: now.into(),
            processed_at: None,
            processed_by: None,
            status: InboundStatus::Received,
            error_message: None,
        };

        let stored = match self.store.insert(record).await {
            Ok(stored) => stored,
            Err(e) => {
                // A concurrent push of the same message won the insert.
                if let Some(message_id) = envelope.message_id.as_deref() {
                    if let Some(existing) =
                        self.store.find_by_remote_message(&sender, message_id).await?
                    {
                        return Ok(self.acknowledge_duplicate(existing).await);
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(
            inbound_id = %stored.id,
            activity_type = %stored.activity_type,
            actor = %stored.actor_id,
            server = %sender,
            "Inbound activity received"
        );

        self.enqueue_ack(&stored).await;
        self.enqueue(FederationTask::Dispatch {
            inbound_id: stored.id.clone(),
        })
        .await;

        Ok(InboxReceipt {
            activity_id: stored.id,
            duplicate: false,
        })
    }

    async fn check_unknown_server(
        &self,
        policy: &federation_policy::Model,
        sender: &str,
    ) -> AppResult<()> {
        let enforce = policy.mode == FederationMode::Hard && !policy.allow_unknown_servers;
        if !enforce && !policy.log_unknown_servers {
            return Ok(());
        }
        if self.guards.capabilities.is_known_server(sender).await? {
            return Ok(());
        }

        if enforce {
            tracing::warn!(server = %sender, "Rejected push from unknown server");
            return Err(AppError::Protocol(format!(
                "server {sender} is unknown under hard federation mode"
            )));
        }
        tracing::info!(server = %sender, "Push from unknown server");
        Ok(())
    }

    async fn check_signature(
        &self,
        policy: &federation_policy::Model,
        envelope: &InboxEnvelope,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let Some(signature) = envelope.signature.as_deref() else {
            if policy.strict_validation {
                return Err(AppError::Unauthorized(
                    "signature required under strict validation".to_string(),
                ));
            }
            return Ok(());
        };

        let Some(public_key) = self.identity.resolve_public_key(&envelope.actor).await? else {
            return Err(AppError::Unauthorized(format!(
                "no public key for {}",
                envelope.actor
            )));
        };

        if self.identity.is_key_revoked(&public_key).await? {
            return Err(AppError::Unauthorized(format!(
                "key of {} has been revoked",
                envelope.actor
            )));
        }

        let valid = self
            .verifier
            .verify(&envelope.signing_bytes(), signature, &public_key)
            .unwrap_or_else(|e| {
                tracing::debug!(
                    actor = %envelope.actor,
                    error = %e,
                    "Signature could not be checked"
                );
                false
            });
        if valid {
            return Ok(());
        }

        tracing::warn!(
            actor = %envelope.actor,
            server = %envelope.actor_server,
            "Invalid signature"
        );

        if policy.auto_block_malicious {
            let block = BlockInput {
                server_url: envelope.actor_server.clone(),
                reason: "automatic: invalid signature".to_string(),
                blocked_by: "system".to_string(),
                expires_at: Some(now + Duration::hours(AUTO_BLOCK_HOURS)),
            };
            if let Err(e) = self.guards.blocklist.block(block).await {
                tracing::error!(
                    server = %envelope.actor_server,
                    error = %e,
                    "Automatic block failed"
                );
            }
        }

        Err(AppError::Unauthorized("invalid signature".to_string()))
    }

    async fn acknowledge_duplicate(&self, existing: inbound_activity::Model) -> InboxReceipt {
        tracing::debug!(
            inbound_id = %existing.id,
            server = %existing.actor_server,
            "Duplicate push, re-acknowledging"
        );
        self.enqueue_ack(&existing).await;
        InboxReceipt {
            activity_id: existing.id,
            duplicate: true,
        }
    }

    async fn enqueue_ack(&self, activity: &inbound_activity::Model) {
        let envelope = AckEnvelope {
            message_id: activity
                .remote_message_id
                .clone()
                .unwrap_or_else(|| activity.id.clone()),
            status: AckStatus::Received,
            reason: None,
            receiver_server: Some(self.local_server.clone()),
        };
        self.enqueue(FederationTask::SendAck {
            server_url: activity.actor_server.clone(),
            envelope,
        })
        .await;
    }

    async fn enqueue(&self, task: FederationTask) {
        let kind = task.kind();
        if let Err(e) = self.queue.enqueue(task).await {
            tracing::error!(task = kind, error = %e, "Failed to enqueue inbox task");
        }
    }

    /// Hand a received activity to its handler. Runs at most once per
    /// activity.
    pub async fn dispatch(&self, inbound_id: &str) -> AppResult<()> {
        let mut activity = self.find(inbound_id).await?;
        if !self.store.mark_processing(inbound_id).await? {
            tracing::debug!(inbound_id, status = ?activity.status, "Already dispatched");
            return Ok(());
        }
        activity.status = InboundStatus::Processing;

        let Some(handler) = self.handlers.get(&activity.activity_type) else {
            tracing::debug!(
                inbound_id,
                activity_type = %activity.activity_type,
                "No handler registered"
            );
            return self.store.mark_processed(inbound_id, None, Utc::now()).await;
        };

        match handler.handle(&activity).await {
            Ok(()) => {
                self.store
                    .mark_processed(inbound_id, Some(handler.name()), Utc::now())
                    .await
            }
            Err(e) => {
                tracing::warn!(
                    inbound_id,
                    handler = handler.name(),
                    error = %e,
                    "Inbound handler failed"
                );
                self.store
                    .mark_failed(inbound_id, &e.to_string(), Utc::now())
                    .await
            }
        }
    }

    /// Load an inbound activity.
    pub async fn find(&self, id: &str) -> AppResult<inbound_activity::Model> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("inbound activity {id}")))
    }

    /// Activities for `target_id` or for nobody in particular, newest first.
    pub async fn list_for_target(
        &self,
        target_id: &str,
        limit: u64,
    ) -> AppResult<Vec<inbound_activity::Model>> {
        self.store.list_for_target(target_id, limit).await
    }
}

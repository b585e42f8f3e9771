//! Background work handed off by request paths.
//!
//! The inbox and outbox never spawn work directly. They enqueue a
//! [`FederationTask`] on a [`TaskQueue`], and the queue's workers run it
//! against the engine services. Enqueueing happens after the row is durable,
//! so a lost task leaves recoverable state behind.

use async_trait::async_trait;
use fedinet_common::AppResult;

use crate::envelope::AckEnvelope;

/// Unit of background work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederationTask {
    /// First, eager delivery attempt of an outbound activity.
    Deliver { activity_id: String },
    /// Hand an accepted inbound activity to its domain handler.
    Dispatch { inbound_id: String },
    /// Best-effort acknowledgment back to a sender.
    SendAck {
        /// Sender's base URL.
        server_url: String,
        /// Acknowledgment to send.
        envelope: AckEnvelope,
    },
}

impl FederationTask {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Deliver { .. } => "deliver",
            Self::Dispatch { .. } => "dispatch",
            Self::SendAck { .. } => "send_ack",
        }
    }
}

/// Bounded queue for fire-and-forget federation work.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task. Fails once the queue has shut down.
    async fn enqueue(&self, task: FederationTask) -> AppResult<()>;
}

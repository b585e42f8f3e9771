//! Outbound HTTP to remote servers.

use async_trait::async_trait;
use fedinet_common::{AppError, AppResult};
use thiserror::Error;

use crate::envelope::{AckEnvelope, CapabilityDocument, InboxEnvelope};

/// Why a push to a remote inbox failed. Every variant is retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    /// No response within the configured timeout. Holds the server URL.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// DNS, TCP or TLS failure before a response arrived.
    #[error("connection to {server} failed: {message}")]
    Connect {
        /// Target server URL.
        server: String,
        /// Underlying client error.
        message: String,
    },

    /// The remote inbox answered with a non-2xx status.
    #[error("{server} responded with HTTP {status}")]
    Status {
        /// Target server URL.
        server: String,
        /// HTTP status code.
        status: u16,
    },

    /// Any other client failure.
    #[error("push failed: {0}")]
    Other(String),
}

impl From<PushError> for AppError {
    fn from(err: PushError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Client side of the federation protocol.
#[async_trait]
pub trait FederationTransport: Send + Sync {
    /// POST an envelope to `{target_server}/federation/inbox`.
    async fn push(&self, target_server: &str, envelope: &InboxEnvelope) -> Result<(), PushError>;

    /// GET `{server_url}/federation/capabilities`. Fails with
    /// `DiscoveryFailed`.
    async fn fetch_capabilities(&self, server_url: &str) -> AppResult<CapabilityDocument>;

    /// POST an acknowledgment to `{server_url}/federation/ack`.
    async fn send_ack(&self, server_url: &str, ack: &AckEnvelope) -> AppResult<()>;
}

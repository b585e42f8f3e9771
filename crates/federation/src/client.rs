//! HTTP transport for the federation protocol.

use std::time::Duration;

use async_trait::async_trait;
use fedinet_common::{AppError, AppResult, config::FederationConfig};
use fedinet_core::{AckEnvelope, CapabilityDocument, FederationTransport, InboxEnvelope, PushError};
use reqwest::Client;

const INBOX_PATH: &str = "/federation/inbox";
const CAPABILITIES_PATH: &str = "/federation/capabilities";
const ACK_PATH: &str = "/federation/ack";

/// Body bytes of a failed response kept for the log.
const ERROR_BODY_LIMIT: usize = 512;

/// Reqwest-backed [`FederationTransport`].
///
/// Every request carries the configured request and connect timeouts, so a
/// hung remote costs at most one timeout per call.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Build a transport from the federation settings.
    pub fn new(config: &FederationConfig, instance_url: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        let user_agent = config.user_agent.clone().unwrap_or_else(|| {
            format!(
                "fedinet/{} (+{instance_url})",
                env!("CARGO_PKG_VERSION")
            )
        });

        Ok(Self { client, user_agent })
    }

    fn endpoint(server_url: &str, path: &str) -> String {
        format!("{}{path}", fedinet_core::normalize_server_url(server_url))
    }
}

fn push_error(server: &str, err: &reqwest::Error) -> PushError {
    if err.is_timeout() {
        PushError::Timeout(server.to_string())
    } else if err.is_connect() {
        PushError::Connect {
            server: server.to_string(),
            message: err.to_string(),
        }
    } else {
        PushError::Other(err.to_string())
    }
}

#[async_trait]
impl FederationTransport for HttpTransport {
    async fn push(&self, target_server: &str, envelope: &InboxEnvelope) -> Result<(), PushError> {
        let url = Self::endpoint(target_server, INBOX_PATH);
        tracing::debug!(
            url = %url,
            activity_type = %envelope.activity_type,
            signed = envelope.signature.is_some(),
            "Pushing activity"
        );

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(envelope)
            .send()
            .await
            .map_err(|e| push_error(target_server, &e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(
            url = %url,
            status = %status,
            body = %body.chars().take(ERROR_BODY_LIMIT).collect::<String>(),
            "Remote inbox refused push"
        );
        Err(PushError::Status {
            server: target_server.to_string(),
            status: status.as_u16(),
        })
    }

    async fn fetch_capabilities(&self, server_url: &str) -> AppResult<CapabilityDocument> {
        let url = Self::endpoint(server_url, CAPABILITIES_PATH);
        tracing::debug!(url = %url, "Fetching capabilities");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| AppError::DiscoveryFailed(format!("{server_url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::DiscoveryFailed(format!(
                "{server_url} responded with HTTP {status}"
            )));
        }

        response
            .json::<CapabilityDocument>()
            .await
            .map_err(|e| AppError::DiscoveryFailed(format!("{server_url}: malformed document: {e}")))
    }

    async fn send_ack(&self, server_url: &str, ack: &AckEnvelope) -> AppResult<()> {
        let url = Self::endpoint(server_url, ACK_PATH);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(ack)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Transport(format!(
                "{url} responded with HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(
            HttpTransport::endpoint("https://b.example/", INBOX_PATH),
            "https://b.example/federation/inbox"
        );
        assert_eq!(
            HttpTransport::endpoint("https://b.example", CAPABILITIES_PATH),
            "https://b.example/federation/capabilities"
        );
    }
}

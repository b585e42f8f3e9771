//! Capability discovery and caching.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fedinet_common::{AppResult, IdGenerator};
use fedinet_db::CapabilityStore;

use super::transport::FederationTransport;
use crate::envelope::{CapabilityDocument, normalize_server_url};

/// How long a discovered capability document is trusted.
pub const CAPABILITY_TTL: Duration = Duration::hours(1);

/// Answers "what does this server support?".
///
/// Reads hit the cache first. Anything older than [`CAPABILITY_TTL`] is
/// refetched from the remote and written back.
#[derive(Clone)]
pub struct CapabilityService {
    store: Arc<dyn CapabilityStore>,
    transport: Arc<dyn FederationTransport>,
    advertised: Arc<CapabilityDocument>,
    id_gen: IdGenerator,
}

impl CapabilityService {
    /// Create a new capability service advertising `advertised`.
    #[must_use]
    pub fn new(
        store: Arc<dyn CapabilityStore>,
        transport: Arc<dyn FederationTransport>,
        advertised: CapabilityDocument,
    ) -> Self {
        Self {
            store,
            transport,
            advertised: Arc::new(advertised),
            id_gen: IdGenerator::new(),
        }
    }

    /// This instance's document.
    #[must_use]
    pub fn advertise(&self) -> CapabilityDocument {
        self.advertised.as_ref().clone()
    }

    /// Cached capabilities of `server_url`, fetched when missing or stale.
    pub async fn get_capabilities(&self, server_url: &str) -> AppResult<CapabilityDocument> {
        self.get_capabilities_at(server_url, Utc::now()).await
    }

    /// Fresh capabilities of `server_url` as of `now`.
    pub async fn get_capabilities_at(
        &self,
        server_url: &str,
        now: DateTime<Utc>,
    ) -> AppResult<CapabilityDocument> {
        let server_url = normalize_server_url(server_url);

        if let Some(cached) = self.store.find(&server_url).await? {
            let age = now - cached.last_discovered_at.with_timezone(&Utc);
            if age < CAPABILITY_TTL {
                return Ok(CapabilityDocument::from(&cached));
            }
            tracing::debug!(server = %server_url, "Capability cache stale");
        }

        let fetched = self.transport.fetch_capabilities(&server_url).await?;
        let stored = self
            .store
            .upsert(fetched.into_model(self.id_gen.generate(), &server_url, now))
            .await?;

        tracing::info!(
            server = %server_url,
            types = stored.supported_activity_types.to_string(),
            "Discovered server capabilities"
        );

        Ok(CapabilityDocument::from(&stored))
    }

    /// Whether `server_url` has ever been discovered.
    pub async fn is_known_server(&self, server_url: &str) -> AppResult<bool> {
        Ok(self
            .store
            .find(&normalize_server_url(server_url))
            .await?
            .is_some())
    }
}

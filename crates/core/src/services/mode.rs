//! Federation mode and policy.

use std::sync::Arc;

use chrono::Utc;
use fedinet_common::{AppError, AppResult};
use fedinet_db::{
    PolicyStore,
    entities::federation_policy::{self, FederationMode, POLICY_ID},
};
use serde::Deserialize;

const CAS_ATTEMPTS: usize = 3;

/// Partial policy change. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyUpdate {
    /// New federation mode.
    pub mode: Option<FederationMode>,
    /// Accept traffic from servers with no capability record.
    pub allow_unknown_servers: Option<bool>,
    /// Fetch capabilities before pushing.
    pub require_capability_negotiation: Option<bool>,
    /// Refuse activity types the target does not advertise.
    pub strict_validation: Option<bool>,
    /// Log traffic from servers with no capability record.
    pub log_unknown_servers: Option<bool>,
    /// Block servers that repeatedly send invalid signatures.
    pub auto_block_malicious: Option<bool>,
}

impl PolicyUpdate {
    fn apply(&self, mut policy: federation_policy::Model) -> federation_policy::Model {
        if let Some(mode) = self.mode {
            policy.mode = mode;
        }
        if let Some(v) = self.allow_unknown_servers {
            policy.allow_unknown_servers = v;
        }
        if let Some(v) = self.require_capability_negotiation {
            policy.require_capability_negotiation = v;
        }
        if let Some(v) = self.strict_validation {
            policy.strict_validation = v;
        }
        if let Some(v) = self.log_unknown_servers {
            policy.log_unknown_servers = v;
        }
        if let Some(v) = self.auto_block_malicious {
            policy.auto_block_malicious = v;
        }
        policy
    }
}

fn default_policy() -> federation_policy::Model {
    federation_policy::Model {
        id: POLICY_ID,
        mode: FederationMode::Soft,
        allow_unknown_servers: true,
        require_capability_negotiation: false,
        strict_validation: false,
        log_unknown_servers: true,
        auto_block_malicious: false,
        version: 0,
        updated_at: Utc::now().into(),
    }
}

/// Reads and updates the singleton federation policy.
///
/// Updates are optimistic: the write only lands if nobody else changed the
/// policy since it was read.
#[derive(Clone)]
pub struct ModeController {
    store: Arc<dyn PolicyStore>,
}

impl ModeController {
    /// Create a new mode controller.
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// The current policy, or the soft-mode default if none was ever saved.
    pub async fn get_policy(&self) -> AppResult<federation_policy::Model> {
        Ok(self.store.load().await?.unwrap_or_else(default_policy))
    }

    /// Apply `update` and return the stored policy.
    pub async fn set_policy(&self, update: PolicyUpdate) -> AppResult<federation_policy::Model> {
        for _ in 0..CAS_ATTEMPTS {
            let current = self.get_policy().await?;
            let expected = current.version;

            let mut next = update.apply(current);
            next.id = POLICY_ID;
            next.version = expected + 1;
            next.updated_at = Utc::now().into();

            if self.store.compare_and_swap(expected, next.clone()).await? {
                tracing::info!(
                    mode = ?next.mode,
                    version = next.version,
                    allow_unknown = next.allow_unknown_servers,
                    strict = next.strict_validation,
                    "Federation policy updated"
                );
                return Ok(next);
            }
            tracing::debug!(expected, "Federation policy changed concurrently, retrying");
        }

        Err(AppError::Conflict(
            "federation policy was modified concurrently".to_string(),
        ))
    }
}

//! Server blocklist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult, IdGenerator};
use fedinet_db::{BlocklistStore, entities::blocked_server};
use serde::Deserialize;
use validator::Validate;

use crate::envelope::normalize_server_url;

/// Input for blocking a server.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BlockInput {
    /// Server to block.
    #[validate(length(min = 1, max = 512))]
    pub server_url: String,

    /// Shown to operators.
    #[validate(length(min = 1, max = 1024))]
    pub reason: String,

    /// Operator or subsystem that added the block.
    #[serde(default = "default_blocked_by")]
    #[validate(length(min = 1, max = 256))]
    pub blocked_by: String,

    /// Omit for a permanent block.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_blocked_by() -> String {
    "admin".to_string()
}

/// Blocks and unblocks remote servers.
///
/// A block is effective while it is active and unexpired. Unblocking clears
/// the active flag and keeps the row for audit.
#[derive(Clone)]
pub struct BlocklistService {
    store: Arc<dyn BlocklistStore>,
    id_gen: IdGenerator,
}

impl BlocklistService {
    /// Create a new blocklist service.
    #[must_use]
    pub fn new(store: Arc<dyn BlocklistStore>) -> Self {
        Self {
            store,
            id_gen: IdGenerator::new(),
        }
    }

    /// Whether `server_url` is blocked right now.
    pub async fn is_blocked(&self, server_url: &str) -> AppResult<bool> {
        self.is_blocked_at(server_url, Utc::now()).await
    }

    /// Whether `server_url` is blocked at `now`.
    pub async fn is_blocked_at(&self, server_url: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let block = self.store.find(&normalize_server_url(server_url)).await?;
        Ok(block.is_some_and(|b| b.is_effective(now)))
    }

    /// Block a server, or refresh the reason and expiry of an existing block.
    pub async fn block(&self, input: BlockInput) -> AppResult<blocked_server::Model> {
        input.validate()?;

        let now = Utc::now();
        if input.expires_at.is_some_and(|at| at <= now) {
            return Err(AppError::Validation(
                "expires_at must be in the future".to_string(),
            ));
        }

        let server_url = normalize_server_url(&input.server_url);
        let block = self
            .store
            .upsert_active(blocked_server::Model {
                id: self.id_gen.generate(),
                server_url: server_url.clone(),
                reason: input.reason,
                blocked_by: input.blocked_by,
                blocked_at: now.into(),
                expires_at: input.expires_at.map(Into::into),
                is_active: true,
                created_at: now.into(),
                updated_at: now.into(),
            })
            .await?;

        tracing::warn!(
            server = %server_url,
            reason = %block.reason,
            blocked_by = %block.blocked_by,
            "Server blocked"
        );

        Ok(block)
    }

    /// Lift the active block on a server.
    pub async fn unblock(&self, server_url: &str) -> AppResult<()> {
        let server_url = normalize_server_url(server_url);
        if !self.store.deactivate(&server_url, Utc::now()).await? {
            return Err(AppError::NotFound(format!(
                "no active block for {server_url}"
            )));
        }

        tracing::info!(server = %server_url, "Server unblocked");
        Ok(())
    }

    /// Blocks in effect now, most recent first.
    pub async fn list_active(&self) -> AppResult<Vec<blocked_server::Model>> {
        self.store.list_active(Utc::now()).await
    }
}

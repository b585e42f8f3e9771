//! Server capability cache repository.

use std::sync::Arc;

use async_trait::async_trait;
use fedinet_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    sea_query::OnConflict,
};

use crate::entities::{ServerCapability, server_capability};
use crate::store::CapabilityStore;

/// Capability repository for database operations.
#[derive(Clone)]
pub struct CapabilityRepository {
    db: Arc<DatabaseConnection>,
}

impl CapabilityRepository {
    /// Create a new capability repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CapabilityStore for CapabilityRepository {
    async fn find(&self, server_url: &str) -> AppResult<Option<server_capability::Model>> {
        ServerCapability::find()
            .filter(server_capability::Column::ServerUrl.eq(server_url))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert(
        &self,
        capability: server_capability::Model,
    ) -> AppResult<server_capability::Model> {
        ServerCapability::insert(capability.clone().into_active_model().reset_all())
            .on_conflict(
                OnConflict::column(server_capability::Column::ServerUrl)
                    .update_columns([
                        server_capability::Column::ProtocolVersions,
                        server_capability::Column::SupportedActivityTypes,
                        server_capability::Column::MaxMessageSizeBytes,
                        server_capability::Column::SupportsRetries,
                        server_capability::Column::SupportsAcks,
                        server_capability::Column::RateLimitInfo,
                        server_capability::Column::LastDiscoveredAt,
                        server_capability::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find(&capability.server_url)
            .await?
            .ok_or_else(|| AppError::Internal("capability vanished after upsert".into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    #[tokio::test]
    async fn test_find_cached_capability() {
        let capability = server_capability::Model {
            id: "c1".to_string(),
            server_url: "https://b.example".to_string(),
            protocol_versions: json!(["1.0.0"]),
            supported_activity_types: json!(["Follow", "Like"]),
            max_message_size_bytes: 1_048_576,
            supports_retries: true,
            supports_acks: true,
            rate_limit_info: Some(json!({"requests_per_min": 100, "burst": 20})),
            last_discovered_at: Utc::now().into(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[capability.clone()]])
                .into_connection(),
        );

        let repo = CapabilityRepository::new(db);
        let found = repo.find("https://b.example").await.unwrap().unwrap();

        assert!(found.supports_activity_type("Like"));
        assert!(!found.supports_activity_type("Post"));
    }
}

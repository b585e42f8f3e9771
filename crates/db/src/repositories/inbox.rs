//! Inbound activity repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

use crate::entities::{InboundActivity, inbound_activity, inbound_activity::InboundStatus};
use crate::store::InboxStore;

/// Inbox repository for database operations.
#[derive(Clone)]
pub struct InboxRepository {
    db: Arc<DatabaseConnection>,
}

impl InboxRepository {
    /// Create a new inbox repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn finish(
        &self,
        id: &str,
        status: InboundStatus,
        processed_by: Option<&str>,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        InboundActivity::update_many()
            .col_expr(inbound_activity::Column::Status, Expr::value(status))
            .col_expr(inbound_activity::Column::ProcessedAt, Expr::value(at))
            .col_expr(
                inbound_activity::Column::ProcessedBy,
                Expr::value(processed_by.map(ToString::to_string)),
            )
            .col_expr(
                inbound_activity::Column::ErrorMessage,
                Expr::value(error.map(ToString::to_string)),
            )
            .filter(inbound_activity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl InboxStore for InboxRepository {
    async fn insert(
        &self,
        activity: inbound_activity::Model,
    ) -> AppResult<inbound_activity::Model> {
        activity
            .into_active_model()
            .reset_all()
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<inbound_activity::Model>> {
        InboundActivity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_remote_message(
        &self,
        actor_server: &str,
        remote_message_id: &str,
    ) -> AppResult<Option<inbound_activity::Model>> {
        InboundActivity::find()
            .filter(inbound_activity::Column::ActorServer.eq(actor_server))
            .filter(inbound_activity::Column::RemoteMessageId.eq(remote_message_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_for_target(
        &self,
        target_id: &str,
        limit: u64,
    ) -> AppResult<Vec<inbound_activity::Model>> {
        InboundActivity::find()
            .filter(
                Condition::any()
                    .add(inbound_activity::Column::TargetId.eq(target_id))
                    .add(inbound_activity::Column::TargetId.is_null()),
            )
            .order_by_desc(inbound_activity::Column::ReceivedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn mark_processing(&self, id: &str) -> AppResult<bool> {
        let result = InboundActivity::update_many()
            .col_expr(
                inbound_activity::Column::Status,
                Expr::value(InboundStatus::Processing),
            )
            .filter(inbound_activity::Column::Id.eq(id))
            .filter(inbound_activity::Column::Status.eq(InboundStatus::Received))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    async fn mark_processed(
        &self,
        id: &str,
        processed_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.finish(id, InboundStatus::Processed, processed_by, None, at)
            .await
    }

    async fn mark_failed(&self, id: &str, error: &str, at: DateTime<Utc>) -> AppResult<()> {
        self.finish(id, InboundStatus::Failed, None, Some(error), at)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn create_test_inbound(id: &str, message_id: Option<&str>) -> inbound_activity::Model {
        inbound_activity::Model {
            id: id.to_string(),
            remote_message_id: message_id.map(ToString::to_string),
            activity_type: "Like".to_string(),
            actor_id: "carol".to_string(),
            actor_server: "https://c.example".to_string(),
            target_id: Some("alice".to_string()),
            payload: json!({"object": "post-1"}),
            received_at: Utc::now().into(),
            processed_at: None,
            processed_by: None,
            status: InboundStatus::Received,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_remote_message_found() {
        let inbound = create_test_inbound("i1", Some("m1"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[inbound.clone()]])
                .into_connection(),
        );

        let repo = InboxRepository::new(db);
        let found = repo
            .find_by_remote_message("https://c.example", "m1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, "i1");
        assert_eq!(found.remote_message_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_find_by_remote_message_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<inbound_activity::Model>::new()])
                .into_connection(),
        );

        let repo = InboxRepository::new(db);
        let found = repo
            .find_by_remote_message("https://c.example", "missing")
            .await
            .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_for_target() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_inbound("i2", None),
                    create_test_inbound("i1", Some("m1")),
                ]])
                .into_connection(),
        );

        let repo = InboxRepository::new(db);
        let result = repo.list_for_target("alice", 20).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "i2");
    }
}

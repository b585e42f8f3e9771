//! Outbound activity repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Statement,
    sea_query::{Expr, Query},
};

use crate::entities::{
    DeliveryAttempt, OutboundActivity, delivery_attempt, outbound_activity,
    outbound_activity::DeliveryStatus,
};
use crate::store::{OutboxStore, StatusCounts};

const AVERAGE_LATENCY_SQL: &str = r"
    SELECT (AVG(EXTRACT(EPOCH FROM (delivered_at - created_at))) * 1000)::float8 AS avg_ms
    FROM outbound_activity
    WHERE delivery_status = 'delivered' AND delivered_at >= $1
";

/// Outbox repository for database operations.
#[derive(Clone)]
pub struct OutboxRepository {
    db: Arc<DatabaseConnection>,
}

impl OutboxRepository {
    /// Create a new outbox repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Moves a pending activity to `status`, recording `error` and the
    /// delivery timestamp where relevant.
    async fn transition(
        &self,
        id: &str,
        status: DeliveryStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut update = OutboundActivity::update_many()
            .col_expr(outbound_activity::Column::DeliveryStatus, Expr::value(status))
            .col_expr(outbound_activity::Column::UpdatedAt, Expr::value(at));

        if status == DeliveryStatus::Delivered {
            update = update.col_expr(outbound_activity::Column::DeliveredAt, Expr::value(at));
        }
        if let Some(error) = error {
            update = update.col_expr(
                outbound_activity::Column::ErrorMessage,
                Expr::value(error.to_string()),
            );
        }

        let result = update
            .filter(outbound_activity::Column::Id.eq(id))
            .filter(outbound_activity::Column::DeliveryStatus.eq(DeliveryStatus::Pending))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl OutboxStore for OutboxRepository {
    async fn insert(
        &self,
        activity: outbound_activity::Model,
    ) -> AppResult<outbound_activity::Model> {
        activity
            .into_active_model()
            .reset_all()
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<outbound_activity::Model>> {
        OutboundActivity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_by_actor(
        &self,
        actor_id: &str,
        limit: u64,
    ) -> AppResult<Vec<outbound_activity::Model>> {
        OutboundActivity::find()
            .filter(outbound_activity::Column::ActorId.eq(actor_id))
            .order_by_desc(outbound_activity::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn mark_delivered(&self, id: &str, at: DateTime<Utc>) -> AppResult<bool> {
        self.transition(id, DeliveryStatus::Delivered, None, at).await
    }

    async fn mark_failed(&self, id: &str, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        self.transition(id, DeliveryStatus::Failed, Some(reason), at)
            .await
    }

    async fn mark_expired(&self, id: &str, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        self.transition(id, DeliveryStatus::Expired, Some(reason), at)
            .await
    }

    async fn record_error(&self, id: &str, error: &str, at: DateTime<Utc>) -> AppResult<()> {
        OutboundActivity::update_many()
            .col_expr(
                outbound_activity::Column::ErrorMessage,
                Expr::value(error.to_string()),
            )
            .col_expr(outbound_activity::Column::UpdatedAt, Expr::value(at))
            .filter(outbound_activity::Column::Id.eq(id))
            .filter(outbound_activity::Column::DeliveryStatus.eq(DeliveryStatus::Pending))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn mark_acknowledged(&self, id: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let result = OutboundActivity::update_many()
            .col_expr(outbound_activity::Column::AcknowledgedAt, Expr::value(at))
            .col_expr(outbound_activity::Column::UpdatedAt, Expr::value(at))
            .filter(outbound_activity::Column::Id.eq(id))
            .filter(outbound_activity::Column::AcknowledgedAt.is_null())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = OutboundActivity::update_many()
            .col_expr(
                outbound_activity::Column::DeliveryStatus,
                Expr::value(DeliveryStatus::Expired),
            )
            .col_expr(
                outbound_activity::Column::ErrorMessage,
                Expr::value(reason.to_string()),
            )
            .col_expr(outbound_activity::Column::UpdatedAt, Expr::value(at))
            .filter(outbound_activity::Column::DeliveryStatus.eq(DeliveryStatus::Pending))
            .filter(outbound_activity::Column::CreatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    async fn find_unattempted_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<outbound_activity::Model>> {
        OutboundActivity::find()
            .filter(outbound_activity::Column::DeliveryStatus.eq(DeliveryStatus::Pending))
            .filter(outbound_activity::Column::CreatedAt.lte(cutoff))
            .filter(
                outbound_activity::Column::Id.not_in_subquery(
                    Query::select()
                        .column(delivery_attempt::Column::OutboundActivityId)
                        .from(DeliveryAttempt)
                        .to_owned(),
                ),
            )
            .order_by_asc(outbound_activity::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn status_counts(&self) -> AppResult<StatusCounts> {
        let rows: Vec<(DeliveryStatus, i64)> = OutboundActivity::find()
            .select_only()
            .column(outbound_activity::Column::DeliveryStatus)
            .column_as(outbound_activity::Column::Id.count(), "count")
            .group_by(outbound_activity::Column::DeliveryStatus)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let count = u64::try_from(count).unwrap_or(0);
            counts.total += count;
            match status {
                DeliveryStatus::Delivered => counts.delivered += count,
                DeliveryStatus::Failed | DeliveryStatus::Expired => counts.failed += count,
                DeliveryStatus::Pending => counts.pending += count,
            }
        }
        Ok(counts)
    }

    async fn average_latency_ms(&self, since: DateTime<Utc>) -> AppResult<Option<f64>> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                AVERAGE_LATENCY_SQL,
                [since.into()],
            ))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get::<Option<f64>>("", "avg_ms")
                .map_err(|e| AppError::Database(e.to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn create_test_activity(id: &str, status: DeliveryStatus) -> outbound_activity::Model {
        outbound_activity::Model {
            id: id.to_string(),
            activity_type: "Follow".to_string(),
            actor_id: "alice".to_string(),
            target_server: "https://b.example".to_string(),
            target_id: Some("bob".to_string()),
            payload: json!({"object": "bob"}),
            delivery_status: status,
            delivered_at: None,
            acknowledged_at: None,
            error_message: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let activity = create_test_activity("a1", DeliveryStatus::Pending);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[activity.clone()]])
                .into_connection(),
        );

        let repo = OutboxRepository::new(db);
        let found = repo.find_by_id("a1").await.unwrap().unwrap();

        assert_eq!(found.id, "a1");
        assert_eq!(found.delivery_status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_by_actor() {
        let first = create_test_activity("a2", DeliveryStatus::Delivered);
        let second = create_test_activity("a1", DeliveryStatus::Pending);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[first, second]])
                .into_connection(),
        );

        let repo = OutboxRepository::new(db);
        let result = repo.list_by_actor("alice", 50).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "a2");
    }

    #[tokio::test]
    async fn test_mark_delivered_only_from_pending() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );

        let repo = OutboxRepository::new(db);

        assert!(repo.mark_delivered("a1", Utc::now()).await.unwrap());
        assert!(!repo.mark_delivered("a1", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_pending_before_reports_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );

        let repo = OutboxRepository::new(db);
        let expired = repo
            .expire_pending_before(Utc::now(), "stale", Utc::now())
            .await
            .unwrap();

        assert_eq!(expired, 3);
    }

    #[tokio::test]
    async fn test_find_unattempted_pending() {
        let activity = create_test_activity("a1", DeliveryStatus::Pending);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[activity]])
                .into_connection(),
        );

        let repo = OutboxRepository::new(db);
        let found = repo.find_unattempted_pending(Utc::now(), 10).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a1");
    }
}

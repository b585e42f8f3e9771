//! Delivery attempt repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, sea_query::Expr,
};

use crate::entities::{DeliveryAttempt, delivery_attempt, delivery_attempt::AttemptStatus};
use crate::store::DeliveryAttemptStore;

/// Delivery attempt repository for database operations.
#[derive(Clone)]
pub struct DeliveryAttemptRepository {
    db: Arc<DatabaseConnection>,
}

impl DeliveryAttemptRepository {
    /// Create a new delivery attempt repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeliveryAttemptStore for DeliveryAttemptRepository {
    async fn insert(
        &self,
        attempt: delivery_attempt::Model,
    ) -> AppResult<delivery_attempt::Model> {
        attempt
            .into_active_model()
            .reset_all()
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn max_attempt_number(&self, outbound_activity_id: &str) -> AppResult<i32> {
        let max: Option<Option<i32>> = DeliveryAttempt::find()
            .select_only()
            .column_as(delivery_attempt::Column::AttemptNumber.max(), "max_attempt")
            .filter(delivery_attempt::Column::OutboundActivityId.eq(outbound_activity_id))
            .into_tuple()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(max.flatten().unwrap_or(0))
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<delivery_attempt::Model>> {
        DeliveryAttempt::find()
            .filter(delivery_attempt::Column::Status.eq(AttemptStatus::Pending))
            .filter(delivery_attempt::Column::NextRetryAt.lte(now))
            .order_by_asc(delivery_attempt::Column::NextRetryAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn complete(
        &self,
        id: &str,
        status: AttemptStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut update = DeliveryAttempt::update_many()
            .col_expr(delivery_attempt::Column::Status, Expr::value(status))
            .col_expr(delivery_attempt::Column::UpdatedAt, Expr::value(at));

        if let Some(error) = error {
            update = update.col_expr(
                delivery_attempt::Column::ErrorMessage,
                Expr::value(error.to_string()),
            );
        }

        let result = update
            .filter(delivery_attempt::Column::Id.eq(id))
            .filter(delivery_attempt::Column::Status.eq(AttemptStatus::Pending))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    async fn list_for_activity(
        &self,
        outbound_activity_id: &str,
    ) -> AppResult<Vec<delivery_attempt::Model>> {
        DeliveryAttempt::find()
            .filter(delivery_attempt::Column::OutboundActivityId.eq(outbound_activity_id))
            .order_by_asc(delivery_attempt::Column::AttemptNumber)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_attempt(id: &str, number: i32) -> delivery_attempt::Model {
        delivery_attempt::Model {
            id: id.to_string(),
            outbound_activity_id: "a1".to_string(),
            attempt_number: number,
            status: AttemptStatus::Pending,
            error_message: Some("connection refused".to_string()),
            next_retry_at: Some(Utc::now().into()),
            backoff_seconds: 30,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_insert_returns_model() {
        let attempt = create_test_attempt("r1", 1);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[attempt.clone()]])
                .into_connection(),
        );

        let repo = DeliveryAttemptRepository::new(db);
        let inserted = repo.insert(attempt).await.unwrap();

        assert_eq!(inserted.attempt_number, 1);
        assert_eq!(inserted.backoff_seconds, 30);
    }

    #[tokio::test]
    async fn test_find_due() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_attempt("r1", 1), create_test_attempt("r2", 2)]])
                .into_connection(),
        );

        let repo = DeliveryAttemptRepository::new(db);
        let due = repo.find_due(Utc::now(), 100).await.unwrap();

        assert_eq!(due.len(), 2);
        assert_eq!(due[1].attempt_number, 2);
    }

    #[tokio::test]
    async fn test_complete_is_conditional() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = DeliveryAttemptRepository::new(db);
        let moved = repo
            .complete("r1", AttemptStatus::Success, None, Utc::now())
            .await
            .unwrap();

        assert!(!moved);
    }
}

//! Rate limit bucket repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    sea_query::{Expr, OnConflict},
};

use crate::entities::{RateLimitBucket, rate_limit_bucket};
use crate::store::RateLimitStore;

/// Rate limit repository for database operations.
#[derive(Clone)]
pub struct RateLimitRepository {
    db: Arc<DatabaseConnection>,
}

impl RateLimitRepository {
    /// Create a new rate limit repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RateLimitStore for RateLimitRepository {
    async fn find(
        &self,
        server_url: &str,
        endpoint: &str,
    ) -> AppResult<Option<rate_limit_bucket::Model>> {
        RateLimitBucket::find()
            .filter(rate_limit_bucket::Column::ServerUrl.eq(server_url))
            .filter(rate_limit_bucket::Column::Endpoint.eq(endpoint))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn save_window(
        &self,
        id: &str,
        current_count: i32,
        window_started_at: DateTime<Utc>,
        last_request_at: DateTime<Utc>,
    ) -> AppResult<()> {
        RateLimitBucket::update_many()
            .col_expr(
                rate_limit_bucket::Column::CurrentCount,
                Expr::value(current_count),
            )
            .col_expr(
                rate_limit_bucket::Column::WindowStartedAt,
                Expr::value(window_started_at),
            )
            .col_expr(
                rate_limit_bucket::Column::LastRequestAt,
                Expr::value(last_request_at),
            )
            .col_expr(
                rate_limit_bucket::Column::UpdatedAt,
                Expr::value(last_request_at),
            )
            .filter(rate_limit_bucket::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn upsert(
        &self,
        bucket: rate_limit_bucket::Model,
    ) -> AppResult<rate_limit_bucket::Model> {
        RateLimitBucket::insert(bucket.clone().into_active_model().reset_all())
            .on_conflict(
                OnConflict::columns([
                    rate_limit_bucket::Column::ServerUrl,
                    rate_limit_bucket::Column::Endpoint,
                ])
                .update_columns([
                    rate_limit_bucket::Column::RequestsPerMinute,
                    rate_limit_bucket::Column::BurstAllowance,
                    rate_limit_bucket::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find(&bucket.server_url, &bucket.endpoint)
            .await?
            .ok_or_else(|| AppError::Internal("rate limit bucket vanished after upsert".into()))
    }
}

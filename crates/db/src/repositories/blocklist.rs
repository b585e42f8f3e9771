//! Blocked server repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedinet_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder,
    sea_query::{Expr, OnConflict},
};

use crate::entities::{BlockedServer, blocked_server};
use crate::store::BlocklistStore;

/// Blocklist repository for database operations.
#[derive(Clone)]
pub struct BlocklistRepository {
    db: Arc<DatabaseConnection>,
}

impl BlocklistRepository {
    /// Create a new blocklist repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BlocklistStore for BlocklistRepository {
    async fn find(&self, server_url: &str) -> AppResult<Option<blocked_server::Model>> {
        BlockedServer::find()
            .filter(blocked_server::Column::ServerUrl.eq(server_url))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_active(
        &self,
        block: blocked_server::Model,
    ) -> AppResult<blocked_server::Model> {
        BlockedServer::insert(block.clone().into_active_model().reset_all())
            .on_conflict(
                OnConflict::column(blocked_server::Column::ServerUrl)
                    .update_columns([
                        blocked_server::Column::Reason,
                        blocked_server::Column::BlockedBy,
                        blocked_server::Column::BlockedAt,
                        blocked_server::Column::ExpiresAt,
                        blocked_server::Column::IsActive,
                        blocked_server::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find(&block.server_url)
            .await?
            .ok_or_else(|| AppError::Internal("block vanished after upsert".into()))
    }

    async fn deactivate(&self, server_url: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let result = BlockedServer::update_many()
            .col_expr(blocked_server::Column::IsActive, Expr::value(false))
            .col_expr(blocked_server::Column::UpdatedAt, Expr::value(at))
            .filter(blocked_server::Column::ServerUrl.eq(server_url))
            .filter(blocked_server::Column::IsActive.eq(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn list_active(&self, now: DateTime<Utc>) -> AppResult<Vec<blocked_server::Model>> {
        BlockedServer::find()
            .filter(blocked_server::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(blocked_server::Column::ExpiresAt.is_null())
                    .add(blocked_server::Column::ExpiresAt.gt(now)),
            )
            .order_by_desc(blocked_server::Column::BlockedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

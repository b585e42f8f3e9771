//! Acknowledgment repository.

use std::sync::Arc;

use async_trait::async_trait;
use fedinet_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, sea_query::OnConflict,
};

use crate::entities::{Acknowledgment, acknowledgment};
use crate::store::AcknowledgmentStore;

/// Acknowledgment repository for database operations.
#[derive(Clone)]
pub struct AcknowledgmentRepository {
    db: Arc<DatabaseConnection>,
}

impl AcknowledgmentRepository {
    /// Create a new acknowledgment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AcknowledgmentStore for AcknowledgmentRepository {
    async fn insert_if_absent(
        &self,
        ack: acknowledgment::Model,
    ) -> AppResult<Option<acknowledgment::Model>> {
        let result = Acknowledgment::insert(ack.clone().into_active_model().reset_all())
            .on_conflict(
                OnConflict::columns([
                    acknowledgment::Column::OutboundActivityId,
                    acknowledgment::Column::ReceiverServer,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await;

        match result {
            Ok(0) | Err(DbErr::RecordNotInserted) => Ok(None),
            Ok(_) => Ok(Some(ack)),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn list_for_activity(
        &self,
        outbound_activity_id: &str,
    ) -> AppResult<Vec<acknowledgment::Model>> {
        Acknowledgment::find()
            .filter(acknowledgment::Column::OutboundActivityId.eq(outbound_activity_id))
            .order_by_asc(acknowledgment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

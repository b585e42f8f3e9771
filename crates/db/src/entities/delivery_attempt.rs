//! Delivery attempt entity.
//!
//! One row per scheduled retry of an outbound activity. The eager first push
//! is not recorded here, so attempt numbers count retries.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a single retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Waiting for `next_retry_at`.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// The retry delivered the activity.
    #[sea_orm(string_value = "success")]
    Success,
    /// The retry failed or was superseded.
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_attempt")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub outbound_activity_id: String,

    /// 1-based, unique per activity.
    pub attempt_number: i32,

    pub status: AttemptStatus,

    /// Error that caused this attempt to be scheduled, or its own failure.
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    #[sea_orm(nullable)]
    pub next_retry_at: Option<DateTimeWithTimeZone>,

    pub backoff_seconds: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::outbound_activity::Entity",
        from = "Column::OutboundActivityId",
        to = "super::outbound_activity::Column::Id",
        on_delete = "Cascade"
    )]
    OutboundActivity,
}

impl Related<super::outbound_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OutboundActivity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Delivery acknowledgment entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Acknowledgment status reported by a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "processed")]
    Processed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// A receiver's confirmation for one outbound activity.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_acknowledgment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub outbound_activity_id: String,

    /// This instance.
    pub sender_server: String,

    /// The server acknowledging.
    pub receiver_server: String,

    pub status: AckStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,

    pub created_at: DateTimeWithTimeZone,
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

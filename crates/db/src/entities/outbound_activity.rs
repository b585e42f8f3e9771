//! Outbound activity entity (the outbox).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery status of an outbound activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Waiting for a first push or a scheduled retry.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Remote inbox accepted the envelope.
    #[sea_orm(string_value = "delivered")]
    Delivered,
    /// Permanently refused before or during delivery (blocked, protocol).
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Gave up after the retry ceiling or the stale-activity sweep.
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl DeliveryStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

/// An activity produced locally and addressed to a remote server.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outbound_activity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Activity type, e.g. `Follow`.
    pub activity_type: String,

    /// Local actor that produced the activity.
    #[sea_orm(indexed)]
    pub actor_id: String,

    /// Base URL of the receiving server.
    pub target_server: String,

    /// Remote object or user the activity addresses.
    #[sea_orm(nullable)]
    pub target_id: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,

    pub delivery_status: DeliveryStatus,

    #[sea_orm(nullable)]
    pub delivered_at: Option<DateTimeWithTimeZone>,

    /// Set when the receiver acknowledges with `processed`.
    #[sea_orm(nullable)]
    pub acknowledged_at: Option<DateTimeWithTimeZone>,

    /// Last delivery error.
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_attempt::Entity")]
    DeliveryAttempts,
    #[sea_orm(has_many = "super::acknowledgment::Entity")]
    Acknowledgments,
}

impl Related<super::delivery_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryAttempts.def()
    }
}

impl Related<super::acknowledgment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Acknowledgments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

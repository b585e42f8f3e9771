//! Inbound activity entity (the inbox).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Processing status of an inbound activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InboundStatus {
    /// Accepted and persisted, not yet dispatched.
    #[sea_orm(string_value = "received")]
    Received,
    /// Handed to a domain handler.
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Handler finished, or no handler is registered for the type.
    #[sea_orm(string_value = "processed")]
    Processed,
    /// Handler returned an error. Never retried.
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// An activity accepted from a remote server.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inbound_activity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Sender-side outbound activity id, used to drop redeliveries.
    #[sea_orm(nullable)]
    pub remote_message_id: Option<String>,

    pub activity_type: String,

    /// Remote actor that produced the activity.
    pub actor_id: String,

    /// Base URL of the sending server.
    #[sea_orm(indexed)]
    pub actor_server: String,

    /// Local user or object the activity addresses.
    #[sea_orm(nullable, indexed)]
    pub target_id: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,

    pub received_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub processed_at: Option<DateTimeWithTimeZone>,

    /// Name of the handler that processed the activity.
    #[sea_orm(nullable)]
    pub processed_by: Option<String>,

    pub status: InboundStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Cached capability document of a remote server.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "server_capability")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub server_url: String,

    /// JSON array of version strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub protocol_versions: Json,

    /// JSON array of activity type names.
    #[sea_orm(column_type = "JsonBinary")]
    pub supported_activity_types: Json,

    pub max_message_size_bytes: i64,

    pub supports_retries: bool,

    pub supports_acks: bool,

    /// `{"requests_per_min": n, "burst": n}` as advertised by the remote.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub rate_limit_info: Option<Json>,

    pub last_discovered_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the remote lists `activity_type` as supported.
    #[must_use]
    pub fn supports_activity_type(&self, activity_type: &str) -> bool {
        self.supported_activity_types
            .as_array()
            .is_some_and(|types| types.iter().any(|t| t.as_str() == Some(activity_type)))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

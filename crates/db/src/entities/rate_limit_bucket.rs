//! Rate limit bucket entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wildcard value for `server_url` or `endpoint`.
pub const WILDCARD: &str = "*";

/// Fixed-window request counter for a (server, endpoint) pair.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rate_limit_bucket")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Remote server URL, or `*`.
    pub server_url: String,

    /// Endpoint path, or `*`.
    pub endpoint: String,

    pub requests_per_minute: i32,

    pub burst_allowance: i32,

    pub current_count: i32,

    pub window_started_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub last_request_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Requests admitted per window before denial.
    #[must_use]
    pub const fn capacity(&self) -> i32 {
        self.requests_per_minute + self.burst_allowance
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

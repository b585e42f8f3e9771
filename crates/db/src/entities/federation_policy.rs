//! Federation policy entity (singleton row).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Primary key of the only policy row.
pub const POLICY_ID: i32 = 1;

/// Trust posture toward unknown servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
pub enum FederationMode {
    /// Unknown servers may deliver and be delivered to.
    #[sea_orm(string_value = "soft")]
    Soft,
    /// Only servers in the capability cache are delivered to.
    #[sea_orm(string_value = "hard")]
    Hard,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "federation_policy")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip)]
    pub id: i32,

    pub mode: FederationMode,

    pub allow_unknown_servers: bool,

    pub require_capability_negotiation: bool,

    pub strict_validation: bool,

    pub log_unknown_servers: bool,

    pub auto_block_malicious: bool,

    /// Incremented on every change; writes compare-and-swap on it.
    pub version: i64,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Database migrations.
//!
//! Schema migrations for the federation tables.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_outbound_activity_table;
mod m20250101_000002_create_inbound_activity_table;
mod m20250101_000003_create_delivery_attempt_table;
mod m20250101_000004_create_delivery_acknowledgment_table;
mod m20250101_000005_create_rate_limit_bucket_table;
mod m20250101_000006_create_server_capability_table;
mod m20250101_000007_create_blocked_server_table;
mod m20250101_000008_create_federation_policy_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_outbound_activity_table::Migration),
            Box::new(m20250101_000002_create_inbound_activity_table::Migration),
            Box::new(m20250101_000003_create_delivery_attempt_table::Migration),
            Box::new(m20250101_000004_create_delivery_acknowledgment_table::Migration),
            Box::new(m20250101_000005_create_rate_limit_bucket_table::Migration),
            Box::new(m20250101_000006_create_server_capability_table::Migration),
            Box::new(m20250101_000007_create_blocked_server_table::Migration),
            Box::new(m20250101_000008_create_federation_policy_table::Migration),
        ]
    }
}

//! Create federation_policy table and seed the default soft-mode policy.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FederationPolicy::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FederationPolicy::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FederationPolicy::Mode)
                            .string_len(8)
                            .not_null()
                            .default("soft"),
                    )
                    .col(
                        ColumnDef::new(FederationPolicy::AllowUnknownServers)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(FederationPolicy::RequireCapabilityNegotiation)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FederationPolicy::StrictValidation)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FederationPolicy::LogUnknownServers)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(FederationPolicy::AutoBlockMalicious)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FederationPolicy::Version)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FederationPolicy::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        let seed = Query::insert()
            .into_table(FederationPolicy::Table)
            .columns([FederationPolicy::Id])
            .values_panic([1.into()])
            .on_conflict(
                OnConflict::column(FederationPolicy::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();

        manager.exec_stmt(seed).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FederationPolicy::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum FederationPolicy {
    Table,
    Id,
    Mode,
    AllowUnknownServers,
    RequireCapabilityNegotiation,
    StrictValidation,
    LogUnknownServers,
    AutoBlockMalicious,
    Version,
    UpdatedAt,
}

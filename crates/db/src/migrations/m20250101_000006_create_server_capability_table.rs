//! Create server_capability table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ServerCapability::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServerCapability::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::ServerUrl)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::ProtocolVersions)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::SupportedActivityTypes)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::MaxMessageSizeBytes)
                            .big_integer()
                            .not_null()
                            .default(1_048_576),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::SupportsRetries)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::SupportsAcks)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::RateLimitInfo)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::LastDiscoveredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ServerCapability::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ServerCapability::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ServerCapability {
    Table,
    Id,
    ServerUrl,
    ProtocolVersions,
    SupportedActivityTypes,
    MaxMessageSizeBytes,
    SupportsRetries,
    SupportsAcks,
    RateLimitInfo,
    LastDiscoveredAt,
    CreatedAt,
    UpdatedAt,
}

//! Create rate_limit_bucket table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RateLimitBucket::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RateLimitBucket::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RateLimitBucket::ServerUrl).string().not_null())
                    .col(ColumnDef::new(RateLimitBucket::Endpoint).string().not_null())
                    .col(
                        ColumnDef::new(RateLimitBucket::RequestsPerMinute)
                            .integer()
                            .not_null()
                            .default(100),
                    )
                    .col(
                        ColumnDef::new(RateLimitBucket::BurstAllowance)
                            .integer()
                            .not_null()
                            .default(20),
                    )
                    .col(
                        ColumnDef::new(RateLimitBucket::CurrentCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RateLimitBucket::WindowStartedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RateLimitBucket::LastRequestAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RateLimitBucket::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RateLimitBucket::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rate_limit_bucket_server_endpoint")
                    .table(RateLimitBucket::Table)
                    .col(RateLimitBucket::ServerUrl)
                    .col(RateLimitBucket::Endpoint)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RateLimitBucket::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum RateLimitBucket {
    Table,
    Id,
    ServerUrl,
    Endpoint,
    RequestsPerMinute,
    BurstAllowance,
    CurrentCount,
    WindowStartedAt,
    LastRequestAt,
    CreatedAt,
    UpdatedAt,
}

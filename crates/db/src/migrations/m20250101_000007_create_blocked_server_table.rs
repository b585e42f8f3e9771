//! Create blocked_server table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BlockedServer::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BlockedServer::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BlockedServer::ServerUrl)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(BlockedServer::Reason).text().not_null())
                    .col(ColumnDef::new(BlockedServer::BlockedBy).string().not_null())
                    .col(
                        ColumnDef::new(BlockedServer::BlockedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BlockedServer::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BlockedServer::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(BlockedServer::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BlockedServer::UpdatedAt)
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
                    .name("idx_blocked_server_is_active")
                    .table(BlockedServer::Table)
                    .col(BlockedServer::IsActive)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlockedServer::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BlockedServer {
    Table,
    Id,
    ServerUrl,
    Reason,
    BlockedBy,
    BlockedAt,
    ExpiresAt,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

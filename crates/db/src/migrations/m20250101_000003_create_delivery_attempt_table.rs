//! Create delivery_attempt table.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_outbound_activity_table::OutboundActivity;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeliveryAttempt::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeliveryAttempt::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::OutboundActivityId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::AttemptNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(DeliveryAttempt::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(DeliveryAttempt::NextRetryAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::BackoffSeconds)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_attempt_outbound_activity")
                            .from(DeliveryAttempt::Table, DeliveryAttempt::OutboundActivityId)
                            .to(OutboundActivity::Table, OutboundActivity::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_attempt_activity_number")
                    .table(DeliveryAttempt::Table)
                    .col(DeliveryAttempt::OutboundActivityId)
                    .col(DeliveryAttempt::AttemptNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Retry sweep: status = pending AND next_retry_at <= now
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_attempt_status_next_retry")
                    .table(DeliveryAttempt::Table)
                    .col(DeliveryAttempt::Status)
                    .col(DeliveryAttempt::NextRetryAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeliveryAttempt::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum DeliveryAttempt {
    Table,
    Id,
    OutboundActivityId,
    AttemptNumber,
    Status,
    ErrorMessage,
    NextRetryAt,
    BackoffSeconds,
    CreatedAt,
    UpdatedAt,
}

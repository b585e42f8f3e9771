//! Create outbound_activity table (the outbox).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OutboundActivity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OutboundActivity::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OutboundActivity::ActivityType).string().not_null())
                    .col(ColumnDef::new(OutboundActivity::ActorId).string().not_null())
                    .col(ColumnDef::new(OutboundActivity::TargetServer).string().not_null())
                    .col(ColumnDef::new(OutboundActivity::TargetId).string().null())
                    .col(ColumnDef::new(OutboundActivity::Payload).json_binary().not_null())
                    .col(
                        ColumnDef::new(OutboundActivity::DeliveryStatus)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(OutboundActivity::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OutboundActivity::AcknowledgedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(OutboundActivity::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(OutboundActivity::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(OutboundActivity::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Outbox listing per actor, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_outbound_activity_actor_created")
                    .table(OutboundActivity::Table)
                    .col(OutboundActivity::ActorId)
                    .col(OutboundActivity::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Health counters and the stale-activity sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_outbound_activity_status_created")
                    .table(OutboundActivity::Table)
                    .col(OutboundActivity::DeliveryStatus)
                    .col(OutboundActivity::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OutboundActivity::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum OutboundActivity {
    Table,
    Id,
    ActivityType,
    ActorId,
    TargetServer,
    TargetId,
    Payload,
    DeliveryStatus,
    DeliveredAt,
    AcknowledgedAt,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

//! Create inbound_activity table (the inbox).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InboundActivity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InboundActivity::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InboundActivity::RemoteMessageId).string().null())
                    .col(ColumnDef::new(InboundActivity::ActivityType).string().not_null())
                    .col(ColumnDef::new(InboundActivity::ActorId).string().not_null())
                    .col(ColumnDef::new(InboundActivity::ActorServer).string().not_null())
                    .col(ColumnDef::new(InboundActivity::TargetId).string().null())
                    .col(ColumnDef::new(InboundActivity::Payload).json_binary().not_null())
                    .col(
                        ColumnDef::new(InboundActivity::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(InboundActivity::ProcessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(InboundActivity::ProcessedBy).string().null())
                    .col(
                        ColumnDef::new(InboundActivity::Status)
                            .string_len(16)
                            .not_null()
                            .default("received"),
                    )
                    .col(ColumnDef::new(InboundActivity::ErrorMessage).text().null())
                    .to_owned(),
            )
            .await?;

        // Redelivery detection; NULL message ids never collide
        manager
            .create_index(
                Index::create()
                    .name("idx_inbound_activity_sender_message")
                    .table(InboundActivity::Table)
                    .col(InboundActivity::ActorServer)
                    .col(InboundActivity::RemoteMessageId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_inbound_activity_target_received")
                    .table(InboundActivity::Table)
                    .col(InboundActivity::TargetId)
                    .col(InboundActivity::ReceivedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InboundActivity::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum InboundActivity {
    Table,
    Id,
    RemoteMessageId,
    ActivityType,
    ActorId,
    ActorServer,
    TargetId,
    Payload,
    ReceivedAt,
    ProcessedAt,
    ProcessedBy,
    Status,
    ErrorMessage,
}

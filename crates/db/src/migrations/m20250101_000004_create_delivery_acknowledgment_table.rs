//! Create delivery_acknowledgment table.

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
                    .table(DeliveryAcknowledgment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeliveryAcknowledgment::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAcknowledgment::OutboundActivityId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAcknowledgment::SenderServer)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAcknowledgment::ReceiverServer)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAcknowledgment::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeliveryAcknowledgment::Reason).text().null())
                    .col(
                        ColumnDef::new(DeliveryAcknowledgment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_acknowledgment_outbound_activity")
                            .from(
                                DeliveryAcknowledgment::Table,
                                DeliveryAcknowledgment::OutboundActivityId,
                            )
                            .to(OutboundActivity::Table, OutboundActivity::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_acknowledgment_activity_receiver")
                    .table(DeliveryAcknowledgment::Table)
                    .col(DeliveryAcknowledgment::OutboundActivityId)
                    .col(DeliveryAcknowledgment::ReceiverServer)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeliveryAcknowledgment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum DeliveryAcknowledgment {
    Table,
    Id,
    OutboundActivityId,
    SenderServer,
    ReceiverServer,
    Status,
    Reason,
    CreatedAt,
}

//! Create `service_request` table with FK to `user`.
//!
//! Status is constrained to the four workflow values at the storage layer.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ServiceRequest::Table)
                    .if_not_exists()
                    .col(uuid(ServiceRequest::Id).primary_key())
                    .col(uuid(ServiceRequest::UserId).not_null())
                    .col(string_len(ServiceRequest::RequestType, 255).not_null())
                    .col(text(ServiceRequest::Description).not_null())
                    .col(
                        ColumnDef::new(ServiceRequest::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending")
                            .check(Expr::col(ServiceRequest::Status).is_in([
                                "pending",
                                "in_progress",
                                "resolved",
                                "cancelled",
                            ])),
                    )
                    .col(timestamp_with_time_zone(ServiceRequest::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(ServiceRequest::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_request_user")
                            .from(ServiceRequest::Table, ServiceRequest::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ServiceRequest::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ServiceRequest {
    Table,
    Id,
    UserId,
    RequestType,
    Description,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum User { Table, Id }

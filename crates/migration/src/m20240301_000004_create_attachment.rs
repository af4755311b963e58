//! Create `attachment` table, cascade-deleted with its service request.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Attachment::Table)
                    .if_not_exists()
                    .col(uuid(Attachment::Id).primary_key())
                    .col(uuid(Attachment::ServiceRequestId).not_null())
                    // Relative path under the media root
                    .col(string_len(Attachment::File, 512).not_null())
                    .col(timestamp_with_time_zone(Attachment::UploadedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachment_service_request")
                            .from(Attachment::Table, Attachment::ServiceRequestId)
                            .to(ServiceRequest::Table, ServiceRequest::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attachment::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Attachment { Table, Id, ServiceRequestId, File, UploadedAt }

#[derive(DeriveIden)]
enum ServiceRequest { Table, Id }

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ServiceRequest: owner lookup drives every list/retrieve
        manager
            .create_index(
                Index::create()
                    .name("idx_service_request_user")
                    .table(ServiceRequest::Table)
                    .col(ServiceRequest::UserId)
                    .to_owned(),
            )
            .await?;

        // ServiceRequest: status and created_at support filters and default ordering
        manager
            .create_index(
                Index::create()
                    .name("idx_service_request_status")
                    .table(ServiceRequest::Table)
                    .col(ServiceRequest::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_service_request_created_at")
                    .table(ServiceRequest::Table)
                    .col(ServiceRequest::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Attachment: fetched by parent request
        manager
            .create_index(
                Index::create()
                    .name("idx_attachment_service_request")
                    .table(Attachment::Table)
                    .col(Attachment::ServiceRequestId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_service_request_user")
                    .table(ServiceRequest::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_service_request_status")
                    .table(ServiceRequest::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_service_request_created_at")
                    .table(ServiceRequest::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_attachment_service_request")
                    .table(Attachment::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum ServiceRequest { Table, UserId, Status, CreatedAt }

#[derive(DeriveIden)]
enum Attachment { Table, ServiceRequestId }

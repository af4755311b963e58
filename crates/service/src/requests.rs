use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;
use uuid::Uuid;

use models::service_request::{self, Status};

use crate::errors::ServiceError;
use crate::pagination::{Page, Pagination};

/// List filters and pagination for the request ledger.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Pagination,
}

/// Partial update; a supplied status is validated but never persisted here,
/// the transition operations own status changes.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequestInput {
    pub request_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

fn parse_ordering(ordering: Option<&str>) -> (service_request::Column, Order) {
    match ordering {
        Some("created_at") => (service_request::Column::CreatedAt, Order::Asc),
        Some("-created_at") => (service_request::Column::CreatedAt, Order::Desc),
        Some("updated_at") => (service_request::Column::UpdatedAt, Order::Asc),
        Some("-updated_at") => (service_request::Column::UpdatedAt, Order::Desc),
        // Unknown fields fall back to newest-first
        _ => (service_request::Column::CreatedAt, Order::Desc),
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// List the caller's requests, newest first unless overridden.
pub async fn list_requests(
    db: &DatabaseConnection,
    user_id: Uuid,
    params: &ListParams,
) -> Result<Page<service_request::Model>, ServiceError> {
    let mut query =
        service_request::Entity::find().filter(service_request::Column::UserId.eq(user_id));

    if let Some(term) = params.search.as_deref().filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(
            Condition::any()
                .add(Expr::col(service_request::Column::RequestType).ilike(pattern.clone()))
                .add(Expr::col(service_request::Column::Description).ilike(pattern)),
        );
    }

    let (col, order) = parse_ordering(params.ordering.as_deref());
    query = query.order_by(col, order);

    let (page_idx, per_page) = params.page.normalize();
    let paginator = query.paginate(db, per_page);
    let total = paginator.num_items().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let items =
        paginator.fetch_page(page_idx).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(Page { items, total, page: page_idx + 1, page_size: per_page })
}

/// Create a request owned by the caller; status always starts pending.
pub async fn create_request(
    db: &DatabaseConnection,
    user_id: Uuid,
    request_type: &str,
    description: &str,
) -> Result<service_request::Model, ServiceError> {
    let created = service_request::create(db, user_id, request_type, description).await?;
    info!(request_id = %created.id, user_id = %user_id, "service_request_created");
    Ok(created)
}

/// Fetch a caller-owned request. A row owned by someone else is reported as
/// missing, not forbidden.
pub async fn get_request(
    db: &DatabaseConnection,
    user_id: Uuid,
    id: Uuid,
) -> Result<service_request::Model, ServiceError> {
    service_request::Entity::find_by_id(id)
        .filter(service_request::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("service request"))
}

pub async fn update_request(
    db: &DatabaseConnection,
    user_id: Uuid,
    id: Uuid,
    input: UpdateRequestInput,
) -> Result<service_request::Model, ServiceError> {
    // Ownership resolves before body validation, so a foreign row is a 404
    // even with a bad payload.
    let existing = get_request(db, user_id, id).await?;
    if let Some(rt) = input.request_type.as_deref() {
        service_request::validate_request_type(rt)?;
    }
    if let Some(s) = input.status.as_deref() {
        let _ = s.parse::<Status>()?;
    }
    if input.request_type.is_none() && input.description.is_none() {
        return Ok(existing);
    }

    let mut am: service_request::ActiveModel = existing.into();
    if let Some(rt) = input.request_type {
        am.request_type = Set(rt);
    }
    if let Some(desc) = input.description {
        am.description = Set(desc);
    }
    am.updated_at = Set(Utc::now().into());
    am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))
}

pub async fn delete_request(
    db: &DatabaseConnection,
    user_id: Uuid,
    id: Uuid,
) -> Result<(), ServiceError> {
    let existing = get_request(db, user_id, id).await?;
    existing.delete(db).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(request_id = %id, user_id = %user_id, "service_request_deleted");
    Ok(())
}

/// Unconditionally move a caller-owned request to `status`. There is no
/// transition graph: any state may move to any other, and concurrent calls
/// are last-write-wins at the database.
pub async fn set_status(
    db: &DatabaseConnection,
    user_id: Uuid,
    id: Uuid,
    status: Status,
) -> Result<Status, ServiceError> {
    let existing = get_request(db, user_id, id).await?;
    let mut am: service_request::ActiveModel = existing.into();
    am.status = Set(status.as_str().to_string());
    am.updated_at = Set(Utc::now().into());
    am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(request_id = %id, status = status.as_str(), "service_request_status_set");
    Ok(status)
}

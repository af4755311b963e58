use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use models::attachment;
use models::service_request::{self, Status};
use service::pagination::Pagination;
use service::requests::{ListParams, UpdateRequestInput};

use crate::errors::ApiError;
use crate::routes::auth::{CurrentUser, ServerState};

#[derive(Debug, Serialize)]
pub struct AttachmentOut {
    pub id: Uuid,
    pub file: String,
    pub uploaded_at: DateTime<FixedOffset>,
    pub filename: String,
}

impl From<attachment::Model> for AttachmentOut {
    fn from(m: attachment::Model) -> Self {
        let filename = m.filename().to_string();
        Self { id: m.id, file: m.file, uploaded_at: m.uploaded_at, filename }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceRequestOut {
    pub id: Uuid,
    /// Human-readable owner label (the username)
    pub user: String,
    pub request_type: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub attachments: Vec<AttachmentOut>,
}

impl ServiceRequestOut {
    fn from_parts(
        m: service_request::Model,
        username: &str,
        attachments: Vec<attachment::Model>,
    ) -> Self {
        Self {
            id: m.id,
            user: username.to_string(),
            request_type: m.request_type,
            description: m.description,
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
            attachments: attachments.into_iter().map(AttachmentOut::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInput {
    pub request_type: String,
    pub description: String,
    /// Accepted for shape compatibility; new requests always start pending.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateInput {
    pub request_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// Paginated list envelope with relative next/previous links.
#[derive(Debug, Serialize)]
pub struct PageOut<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

const LIST_PATH: &str = "/api/v1/service-requests/";

fn page_link(q: &ListQuery, page: u64) -> String {
    let mut parts = vec![format!("page={page}")];
    if let Some(ps) = q.page_size {
        parts.push(format!("page_size={ps}"));
    }
    if let Some(s) = q.search.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("search={}", urlencoding::encode(s)));
    }
    if let Some(o) = q.ordering.as_deref().filter(|o| !o.is_empty()) {
        parts.push(format!("ordering={}", urlencoding::encode(o)));
    }
    format!("{LIST_PATH}?{}", parts.join("&"))
}

fn validate_optional_status(status: Option<&str>) -> Result<(), ApiError> {
    if let Some(s) = status {
        s.parse::<Status>().map_err(service::errors::ServiceError::from)?;
    }
    Ok(())
}

#[utoipa::path(get, path = "/api/v1/service-requests/", tag = "service-requests",
    params(ListQuery),
    responses((status = 200, description = "Paginated list"), (status = 401, description = "Unauthenticated")))]
pub async fn list(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Query(q): Query<ListQuery>,
) -> Result<Json<PageOut<ServiceRequestOut>>, ApiError> {
    let params = ListParams {
        search: q.search.clone(),
        ordering: q.ordering.clone(),
        page: Pagination { page: q.page.unwrap_or(1), page_size: q.page_size.unwrap_or(10) },
    };
    let page = service::requests::list_requests(&state.db, user.id, &params).await?;

    // One extra query serves attachments for the whole page
    let ids: Vec<Uuid> = page.items.iter().map(|r| r.id).collect();
    let mut by_request: HashMap<Uuid, Vec<attachment::Model>> = HashMap::new();
    for a in service::attachments::list_for_requests(&state.db, &ids).await? {
        by_request.entry(a.service_request_id).or_default().push(a);
    }

    let next = page.has_next().then(|| page_link(&q, page.page + 1));
    let previous = page.has_previous().then(|| page_link(&q, page.page - 1));
    let results = page
        .items
        .into_iter()
        .map(|m| {
            let files = by_request.remove(&m.id).unwrap_or_default();
            ServiceRequestOut::from_parts(m, &user.username, files)
        })
        .collect();
    Ok(Json(PageOut { count: page.total, next, previous, results }))
}

#[utoipa::path(post, path = "/api/v1/service-requests/", tag = "service-requests",
    request_body = crate::openapi::CreateServiceRequestDoc,
    responses((status = 201, description = "Created"), (status = 400, description = "Validation error")))]
pub async fn create(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<CreateInput>,
) -> Result<(StatusCode, Json<ServiceRequestOut>), ApiError> {
    validate_optional_status(input.status.as_deref())?;
    let created = service::requests::create_request(
        &state.db,
        user.id,
        &input.request_type,
        &input.description,
    )
    .await?;
    let out = ServiceRequestOut::from_parts(created, &user.username, Vec::new());
    Ok((StatusCode::CREATED, Json(out)))
}

#[utoipa::path(get, path = "/api/v1/service-requests/{id}/", tag = "service-requests",
    params(("id" = Uuid, Path, description = "Service request id")),
    responses((status = 200, description = "Found"), (status = 404, description = "Missing or not owned")))]
pub async fn retrieve(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequestOut>, ApiError> {
    let found = service::requests::get_request(&state.db, user.id, id).await?;
    let files = service::attachments::list_for_request(&state.db, found.id).await?;
    Ok(Json(ServiceRequestOut::from_parts(found, &user.username, files)))
}

#[utoipa::path(patch, path = "/api/v1/service-requests/{id}/", tag = "service-requests",
    params(("id" = Uuid, Path, description = "Service request id")),
    request_body = crate::openapi::UpdateServiceRequestDoc,
    responses((status = 200, description = "Updated"), (status = 400, description = "Validation error"), (status = 404, description = "Missing or not owned")))]
pub async fn update(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateInput>,
) -> Result<Json<ServiceRequestOut>, ApiError> {
    let updated = service::requests::update_request(
        &state.db,
        user.id,
        id,
        UpdateRequestInput {
            request_type: input.request_type,
            description: input.description,
            status: input.status,
        },
    )
    .await?;
    let files = service::attachments::list_for_request(&state.db, updated.id).await?;
    Ok(Json(ServiceRequestOut::from_parts(updated, &user.username, files)))
}

#[utoipa::path(delete, path = "/api/v1/service-requests/{id}/", tag = "service-requests",
    params(("id" = Uuid, Path, description = "Service request id")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Missing or not owned")))]
pub async fn destroy(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    service::requests::delete_request(&state.db, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/v1/service-requests/{id}/upload_attachment/", tag = "service-requests",
    params(("id" = Uuid, Path, description = "Service request id")),
    responses((status = 201, description = "Attachment stored"), (status = 400, description = "Validation error"), (status = 404, description = "Missing or not owned")))]
pub async fn upload_attachment(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AttachmentOut>), ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) =
        multipart.next_field().await.map_err(|e| ApiError::validation("file", e.to_string()))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation("file", e.to_string()))?;
            file = Some((name, data.to_vec()));
            break;
        }
    }
    let (name, data) =
        file.ok_or_else(|| ApiError::validation("file", "No file was submitted."))?;

    let stored = service::attachments::store_attachment(
        &state.db,
        &state.media_root,
        user.id,
        id,
        &name,
        &data,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(AttachmentOut::from(stored))))
}

async fn transition(
    state: &ServerState,
    user: &CurrentUser,
    id: Uuid,
    status: Status,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = service::requests::set_status(&state.db, user.id, id, status).await?;
    Ok(Json(serde_json::json!({ "status": status.as_str() })))
}

#[utoipa::path(patch, path = "/api/v1/service-requests/{id}/mark_in_progress/", tag = "service-requests",
    params(("id" = Uuid, Path, description = "Service request id")),
    responses((status = 200, description = "Status set"), (status = 404, description = "Missing or not owned")))]
pub async fn mark_in_progress(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    transition(&state, &user, id, Status::InProgress).await
}

#[utoipa::path(patch, path = "/api/v1/service-requests/{id}/resolve/", tag = "service-requests",
    params(("id" = Uuid, Path, description = "Service request id")),
    responses((status = 200, description = "Status set"), (status = 404, description = "Missing or not owned")))]
pub async fn resolve(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    transition(&state, &user, id, Status::Resolved).await
}

#[utoipa::path(patch, path = "/api/v1/service-requests/{id}/cancel/", tag = "service-requests",
    params(("id" = Uuid, Path, description = "Service request id")),
    responses((status = 200, description = "Status set"), (status = 404, description = "Missing or not owned")))]
pub async fn cancel(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    transition(&state, &user, id, Status::Cancelled).await
}

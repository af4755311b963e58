pub mod auth;
pub mod requests;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use common::types::Health;

use crate::openapi::ApiDoc;
use auth::ServerState;

/// Body ceiling well above the 5MB attachment validator so oversize uploads
/// fail with a field error instead of a transport-level 413.
const BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

#[utoipa::path(get, path = "/health", tag = "health",
    responses((status = 200, description = "Service is up")))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: public health + auth token endpoints,
/// bearer-protected service-request endpoints, and Swagger docs.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let public = Router::new().route("/health", get(health));

    let auth_routes = Router::new()
        .route("/api/v1/auth/register/", post(auth::register))
        .route("/api/v1/auth/token/", post(auth::token))
        .route("/api/v1/auth/token/refresh/", post(auth::token_refresh));

    let api = Router::new()
        .route(
            "/api/v1/service-requests/",
            get(requests::list).post(requests::create),
        )
        .route(
            "/api/v1/service-requests/:id/",
            get(requests::retrieve).patch(requests::update).delete(requests::destroy),
        )
        .route(
            "/api/v1/service-requests/:id/upload_attachment/",
            post(requests::upload_attachment),
        )
        .route(
            "/api/v1/service-requests/:id/mark_in_progress/",
            patch(requests::mark_in_progress),
        )
        .route("/api/v1/service-requests/:id/resolve/", patch(requests::resolve))
        .route("/api/v1/service-requests/:id/cancel/", patch(requests::cancel))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .merge(public)
        .merge(auth_routes)
        .merge(api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

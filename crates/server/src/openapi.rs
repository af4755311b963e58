use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(ToSchema)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(ToSchema)]
pub struct CreateServiceRequestDoc {
    pub request_type: String,
    pub description: String,
    pub status: Option<String>,
}

#[derive(ToSchema)]
pub struct UpdateServiceRequestDoc {
    pub request_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::auth::register,
        crate::routes::auth::token,
        crate::routes::auth::token_refresh,
        crate::routes::requests::list,
        crate::routes::requests::create,
        crate::routes::requests::retrieve,
        crate::routes::requests::update,
        crate::routes::requests::destroy,
        crate::routes::requests::upload_attachment,
        crate::routes::requests::mark_in_progress,
        crate::routes::requests::resolve,
        crate::routes::requests::cancel,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            TokenRequest,
            RefreshRequest,
            CreateServiceRequestDoc,
            UpdateServiceRequestDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "auth"),
        (name = "service-requests")
    )
)]
pub struct ApiDoc;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use service::auth::domain::{LoginInput, RegisterInput, TokenPair};
use service::auth::repo::seaorm::SeaOrmAuthRepository;
use service::auth::service::{decode_token, AuthConfig, AuthService, TOKEN_TYPE_ACCESS};

use crate::errors::ApiError;

#[derive(Clone)]
pub struct ServerAuthConfig {
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_hours: i64,
}

#[derive(Clone)]
pub struct ServerState {
    pub db: DatabaseConnection,
    pub auth: ServerAuthConfig,
    pub media_root: PathBuf,
}

/// Authenticated caller, resolved by the bearer middleware and injected into
/// request extensions.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
}

fn auth_service(state: &ServerState) -> AuthService<SeaOrmAuthRepository> {
    let repo = Arc::new(SeaOrmAuthRepository { db: state.db.clone() });
    AuthService::new(
        repo,
        AuthConfig {
            jwt_secret: Some(state.auth.jwt_secret.clone()),
            access_token_minutes: state.auth.access_token_minutes,
            refresh_token_hours: state.auth.refresh_token_hours,
            password_algorithm: "argon2".into(),
        },
    )
}

#[derive(Serialize)]
pub struct RegisterOutput {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}

#[derive(Deserialize)]
pub struct RefreshInput {
    pub refresh: String,
}

#[derive(Serialize)]
pub struct RefreshOutput {
    pub access: String,
}

#[utoipa::path(post, path = "/api/v1/auth/register/", tag = "auth",
    request_body = crate::openapi::RegisterRequest,
    responses((status = 201, description = "Registered"), (status = 400, description = "Validation error")))]
pub async fn register(
    State(state): State<ServerState>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<RegisterOutput>), ApiError> {
    let svc = auth_service(&state);
    let user = svc.register(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterOutput { user_id: user.id, email: user.email, username: user.username }),
    ))
}

#[utoipa::path(post, path = "/api/v1/auth/token/", tag = "auth",
    request_body = crate::openapi::TokenRequest,
    responses((status = 200, description = "Token pair issued"), (status = 401, description = "Bad credentials")))]
pub async fn token(
    State(state): State<ServerState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<TokenPair>, ApiError> {
    let svc = auth_service(&state);
    let session = svc.login(input).await?;
    match session.tokens {
        Some(pair) => Ok(Json(pair)),
        None => Err(ApiError::internal("token generation disabled")),
    }
}

#[utoipa::path(post, path = "/api/v1/auth/token/refresh/", tag = "auth",
    request_body = crate::openapi::RefreshRequest,
    responses((status = 200, description = "Access token refreshed"), (status = 401, description = "Invalid refresh token")))]
pub async fn token_refresh(
    State(state): State<ServerState>,
    Json(input): Json<RefreshInput>,
) -> Result<Json<RefreshOutput>, ApiError> {
    let svc = auth_service(&state);
    let access = svc.refresh(&input.refresh).await?;
    Ok(Json(RefreshOutput { access }))
}

/// Route-layer middleware guarding the service-request surface: requires a
/// valid access token and resolves the caller against the user table, so a
/// deleted account is rejected even while its token is still live.
pub async fn require_bearer_token(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path().to_string();

    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = match header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(t) => t.to_string(),
            None => {
                warn!(path = %path, "invalid Authorization format (expect Bearer)");
                return Err(ApiError::unauthorized(
                    "Authorization header must contain a Bearer token.",
                ));
            }
        },
        None => {
            warn!(path = %path, "missing Authorization header");
            return Err(ApiError::unauthorized(
                "Authentication credentials were not provided.",
            ));
        }
    };

    let claims = decode_token(&state.auth.jwt_secret, &token).map_err(|e| {
        warn!(path = %path, err = %e, "token validation failed");
        ApiError::unauthorized("Token is invalid or expired")
    })?;
    if claims.token_type != TOKEN_TYPE_ACCESS {
        return Err(ApiError::unauthorized("Token has wrong type"));
    }
    let uid = Uuid::parse_str(&claims.uid)
        .map_err(|_| ApiError::unauthorized("Token is invalid or expired"))?;

    let user = models::user::Entity::find_by_id(uid)
        .one(&state.db)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        username: user.username,
    });
    Ok(next.run(req).await)
}

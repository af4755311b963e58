use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use common::utils::logging::init_logging_default;
use dotenvy::dotenv;
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes::{self, auth};

/// Initialize logging via shared common utils
fn init_logging() {
    init_logging_default();
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load config.toml when present; env vars fill the gaps either way.
fn load_config() -> configs::AppConfig {
    let mut cfg = configs::load_default().unwrap_or_default();
    cfg.database.normalize_from_env();
    cfg.auth.normalize_from_env();
    cfg
}

fn load_bind_addr(cfg: &configs::AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bad bind address: {e}")))
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let cfg = load_config();

    // Attachment writes need the media root in place
    common::env::ensure_media_root(&cfg.storage.media_root).await?;

    let db = models::db::connect_with(&cfg.database).await?;
    migration::Migrator::up(&db, None).await?;

    let jwt_secret = if cfg.auth.jwt_secret.trim().is_empty() {
        "dev-secret-change-me".to_string()
    } else {
        cfg.auth.jwt_secret.clone()
    };
    let state = auth::ServerState {
        db,
        auth: auth::ServerAuthConfig {
            jwt_secret,
            access_token_minutes: cfg.auth.access_token_minutes,
            refresh_token_hours: cfg.auth.refresh_token_hours,
        },
        media_root: PathBuf::from(&cfg.storage.media_root),
    };

    let app: Router = routes::build_router(state, build_cors());

    let addr = load_bind_addr(&cfg)?;
    info!(%addr, "starting request tracker api");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use migration::MigratorTrait;
use serde_json::json;
use tower::Service;
use uuid::Uuid;

use server::routes::{self, auth};

fn cors() -> tower_http::cors::CorsLayer {
    tower_http::cors::CorsLayer::very_permissive()
}

async fn build_app(media_root: std::path::PathBuf) -> anyhow::Result<Router> {
    let db = models::db::connect().await?;
    // Parallel test binaries may race on the migration table; already-applied
    // schema is fine.
    if let Err(e) = migration::Migrator::up(&db, None).await {
        let msg = format!("{}", e);
        if msg.contains("duplicate key value violates unique constraint") {
            eprintln!("migrations already applied, continue: {}", msg);
        } else {
            return Err(e.into());
        }
    }
    let state = auth::ServerState {
        db,
        auth: auth::ServerAuthConfig {
            jwt_secret: "test-secret".into(),
            access_token_minutes: 60,
            refresh_token_hours: 24,
        },
        media_root,
    };
    Ok(routes::build_router(state, cors()))
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(t) = token {
        builder = builder.header("authorization", format!("Bearer {t}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(body).expect("encode")))
        .expect("request")
}

fn bare_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

fn multipart_request(uri: &str, token: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let boundary = "XTESTBOUNDARY";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .expect("request")
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Register a fresh user and return their username plus access token.
async fn register_user(app: &mut Router, tag: &str) -> anyhow::Result<(String, String)> {
    let email = format!("{tag}_{}@example.com", Uuid::new_v4());
    let username = format!("{tag}_{}", Uuid::new_v4());
    let password = "StrongPass123";

    let resp = app
        .call(json_request(
            "POST",
            "/api/v1/auth/register/",
            None,
            &json!({"email": email, "username": username, "password": password}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .call(json_request(
            "POST",
            "/api/v1/auth/token/",
            None,
            &json!({"email": email, "password": password}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let tokens = body_json(resp).await;
    let access = tokens["access"].as_str().expect("access token").to_string();
    Ok((username, access))
}

async fn create_request_via_api(
    app: &mut Router,
    token: &str,
    request_type: &str,
    description: &str,
) -> anyhow::Result<serde_json::Value> {
    let resp = app
        .call(json_request(
            "POST",
            "/api/v1/service-requests/",
            Some(token),
            &json!({"request_type": request_type, "description": description}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    Ok(body_json(resp).await)
}

#[tokio::test]
async fn test_create_defaults_to_pending_and_owner() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let media = tempfile::tempdir()?;
    let mut app = build_app(media.path().to_path_buf()).await?;
    let (username, token) = register_user(&mut app, "create").await?;

    let created = create_request_via_api(&mut app, &token, "Fix printer", "jammed").await?;
    assert_eq!(created["status"], "pending");
    assert_eq!(created["user"], username.as_str());
    assert_eq!(created["request_type"], "Fix printer");
    assert!(created["attachments"].as_array().expect("attachments").is_empty());

    // A client-supplied status is validated but not persisted
    let resp = app
        .call(json_request(
            "POST",
            "/api/v1/service-requests/",
            Some(&token),
            &json!({"request_type": "Replace toner", "description": "low", "status": "resolved"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "pending");

    // An invalid status is still a field error
    let resp = app
        .call(json_request(
            "POST",
            "/api/v1/service-requests/",
            Some(&token),
            &json!({"request_type": "Replace toner", "description": "low", "status": "done"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(body["status"].is_array());

    // Short request_type rejected
    let resp = app
        .call(json_request(
            "POST",
            "/api/v1/service-requests/",
            Some(&token),
            &json!({"request_type": "Fix", "description": "x"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["request_type"][0], "Request type must be at least 5 characters long.");
    Ok(())
}

#[tokio::test]
async fn test_ownership_is_a_not_found() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let media = tempfile::tempdir()?;
    let mut app = build_app(media.path().to_path_buf()).await?;
    let (_, owner_token) = register_user(&mut app, "owner").await?;
    let (_, stranger_token) = register_user(&mut app, "stranger").await?;

    let created = create_request_via_api(&mut app, &owner_token, "Fix printer", "jammed").await?;
    let id = created["id"].as_str().expect("id").to_string();

    // The stranger cannot see, mutate, transition or delete it
    let uri = format!("/api/v1/service-requests/{id}/");
    let resp = app.call(bare_request("GET", &uri, &stranger_token)).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .call(json_request("PATCH", &uri, Some(&stranger_token), &json!({"description": "mine now"})))
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .call(bare_request(
            "PATCH",
            &format!("/api/v1/service-requests/{id}/resolve/"),
            &stranger_token,
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.call(bare_request("DELETE", &uri, &stranger_token)).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Still intact for the owner
    let resp = app.call(bare_request("GET", &uri, &owner_token)).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let media = tempfile::tempdir()?;
    let mut app = build_app(media.path().to_path_buf()).await?;
    let (_, token) = register_user(&mut app, "upd").await?;

    let created = create_request_via_api(&mut app, &token, "Fix printer", "jammed").await?;
    let id = created["id"].as_str().expect("id").to_string();
    let uri = format!("/api/v1/service-requests/{id}/");

    let resp = app
        .call(json_request("PATCH", &uri, Some(&token), &json!({"description": "paper jam"})))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["description"], "paper jam");
    assert_eq!(body["status"], "pending");

    // Status changes go through the transition endpoints, not PATCH
    let resp = app
        .call(json_request("PATCH", &uri, Some(&token), &json!({"status": "resolved"})))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "pending");

    let resp = app
        .call(json_request("PATCH", &uri, Some(&token), &json!({"status": "done"})))
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.call(bare_request("DELETE", &uri, &token)).await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app.call(bare_request("GET", &uri, &token)).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_transitions_are_unguarded() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let media = tempfile::tempdir()?;
    let mut app = build_app(media.path().to_path_buf()).await?;
    let (_, token) = register_user(&mut app, "trans").await?;

    let created = create_request_via_api(&mut app, &token, "Fix printer", "jammed").await?;
    let id = created["id"].as_str().expect("id").to_string();

    let resp = app
        .call(bare_request("PATCH", &format!("/api/v1/service-requests/{id}/resolve/"), &token))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"status": "resolved"}));

    // resolved is not terminal; any state reaches any other
    let resp = app
        .call(bare_request(
            "PATCH",
            &format!("/api/v1/service-requests/{id}/mark_in_progress/"),
            &token,
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"status": "in_progress"}));

    let resp = app
        .call(bare_request("PATCH", &format!("/api/v1/service-requests/{id}/cancel/"), &token))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"status": "cancelled"}));

    let resp = app
        .call(bare_request("GET", &format!("/api/v1/service-requests/{id}/"), &token))
        .await?;
    assert_eq!(body_json(resp).await["status"], "cancelled");
    Ok(())
}

#[tokio::test]
async fn test_list_pagination_and_search() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let media = tempfile::tempdir()?;
    let mut app = build_app(media.path().to_path_buf()).await?;
    let (_, token) = register_user(&mut app, "list").await?;
    let (_, other_token) = register_user(&mut app, "listother").await?;

    for i in 0..11 {
        create_request_via_api(&mut app, &token, &format!("Printer issue {i}"), "desc").await?;
    }
    create_request_via_api(&mut app, &token, "Network outage", "switch down").await?;
    create_request_via_api(&mut app, &other_token, "Printer elsewhere", "foreign").await?;

    // Default page size is 10, newest first, only the caller's rows
    let resp = app.call(bare_request("GET", "/api/v1/service-requests/", &token)).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["count"], 12);
    assert_eq!(body["results"].as_array().expect("results").len(), 10);
    assert!(body["next"].as_str().expect("next").contains("page=2"));
    assert!(body["previous"].is_null());
    assert_eq!(body["results"][0]["request_type"], "Network outage");

    // Second page holds the remainder
    let resp = app
        .call(bare_request("GET", "/api/v1/service-requests/?page=2", &token))
        .await?;
    let body = body_json(resp).await;
    assert_eq!(body["results"].as_array().expect("results").len(), 2);
    assert!(body["next"].is_null());
    assert!(body["previous"].as_str().expect("previous").contains("page=1"));

    // page_size is honored and echoed in the links
    let resp = app
        .call(bare_request("GET", "/api/v1/service-requests/?page_size=5", &token))
        .await?;
    let body = body_json(resp).await;
    assert_eq!(body["results"].as_array().expect("results").len(), 5);
    assert!(body["next"].as_str().expect("next").contains("page_size=5"));

    // Case-insensitive search across type and description
    let resp = app
        .call(bare_request("GET", "/api/v1/service-requests/?search=PRINTER", &token))
        .await?;
    let body = body_json(resp).await;
    assert_eq!(body["count"], 11);
    let resp = app
        .call(bare_request("GET", "/api/v1/service-requests/?search=switch", &token))
        .await?;
    let body = body_json(resp).await;
    assert_eq!(body["count"], 1);

    // Explicit ascending order flips the default
    let resp = app
        .call(bare_request("GET", "/api/v1/service-requests/?ordering=created_at", &token))
        .await?;
    let body = body_json(resp).await;
    assert_eq!(body["results"][0]["request_type"], "Printer issue 0");
    Ok(())
}

#[tokio::test]
async fn test_upload_attachment_validates_size() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let media = tempfile::tempdir()?;
    let mut app = build_app(media.path().to_path_buf()).await?;
    let (_, token) = register_user(&mut app, "upload").await?;

    let created = create_request_via_api(&mut app, &token, "Fix printer", "jammed").await?;
    let id = created["id"].as_str().expect("id").to_string();
    let uri = format!("/api/v1/service-requests/{id}/upload_attachment/");

    // Small file is stored and the filename is the basename of the path
    let resp = app
        .call(multipart_request(&uri, &token, "report.txt", b"printer log"))
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["filename"], "report.txt");
    let stored_path = body["file"].as_str().expect("file").to_string();
    assert!(stored_path.ends_with("report.txt"));
    let on_disk = tokio::fs::read(media.path().join(&stored_path)).await?;
    assert_eq!(on_disk, b"printer log");

    // The attachment shows up nested and read-only on the request
    let resp = app
        .call(bare_request("GET", &format!("/api/v1/service-requests/{id}/"), &token))
        .await?;
    let body = body_json(resp).await;
    assert_eq!(body["attachments"].as_array().expect("attachments").len(), 1);
    assert_eq!(body["attachments"][0]["filename"], "report.txt");

    // Over 5MB fails with a field error and persists nothing
    let oversize = vec![0u8; 5 * 1024 * 1024 + 1];
    let resp = app.call(multipart_request(&uri, &token, "big.bin", &oversize)).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["file"][0], "File size must not exceed 5MB.");

    // Multipart without a file part is rejected
    let resp = app
        .call(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header("content-type", "multipart/form-data; boundary=XTESTBOUNDARY")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from("--XTESTBOUNDARY--\r\n"))?,
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

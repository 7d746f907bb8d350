//! Router-level tests
//!
//! These exercise the HTTP surface up to the first database access: route
//! matching, the auth extractors and request validation. The MongoDB client
//! connects lazily, so no server needs to be running.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::util::ServiceExt;

use threddit::realtime::UserEventBroadcast;
use threddit::routes::create_router;
use threddit::server::config::Config;
use threddit::server::state::AppState;

async fn test_app() -> Router {
    let media_dir = tempfile::tempdir().unwrap().into_path();
    let config = Config {
        port: 0,
        mongodb_uri: "mongodb://127.0.0.1:27017".to_string(),
        mongodb_db: "threddit-test".to_string(),
        jwt_secret: "test-secret".to_string(),
        google_client_id: None,
        smtp_relay: None,
        email: None,
        app_password: None,
        media_dir,
    };

    let client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .unwrap();
    let db = client.database(&config.mongodb_db);

    let state = AppState {
        db,
        realtime: UserEventBroadcast::new(),
        mailer: None,
        config: Arc::new(config),
    };
    create_router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unknown_route_returns_404_envelope() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn protected_route_requires_bearer_token() {
    let app = test_app().await;
    let response = app
        .oneshot(
            Request::post("/api/posts")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Missing bearer token");
}

#[tokio::test]
async fn garbage_token_is_rejected_before_any_lookup() {
    let app = test_app().await;
    let response = app
        .oneshot(
            Request::get("/api/auth/me")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_search_query_is_a_bad_request() {
    let app = test_app().await;
    let response = app
        .oneshot(
            Request::get("/api/search?q=%20%20")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Search query is required");
}

#[tokio::test]
async fn media_upload_requires_auth() {
    let app = test_app().await;
    let response = app
        .oneshot(
            Request::post("/api/media")
                .header(header::CONTENT_TYPE, "image/png")
                .body(Body::from(vec![0u8; 16]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

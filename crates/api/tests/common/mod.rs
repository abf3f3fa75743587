//! Shared helpers for API integration tests.
//!
//! Tests drive the real router (same middleware stack as production) with
//! `tower::ServiceExt::oneshot`. Callers authenticate with JWTs minted from
//! the test configuration.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tandem_api::auth::jwt::{generate_access_token, JwtConfig};
use tandem_api::config::ServerConfig;
use tandem_api::router::build_app_router;
use tandem_api::state::AppState;
use tandem_api::voice::{HmacVoiceTokenIssuer, VoiceTokenConfig};
use tandem_core::roles::{ROLE_ADMIN, ROLE_PARTICIPANT};
use tandem_core::session::SessionPolicy;
use tandem_core::types::DbId;
use tandem_events::EventBus;
use tandem_worker::JobConfig;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-jwt-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 15,
        },
        session: SessionPolicy::default(),
        voice: VoiceTokenConfig {
            secret: "test-voice-secret".to_string(),
            ttl_secs: 600,
        },
        jobs: JobConfig::default(),
        run_jobs_in_process: false,
        notify_webhook_url: None,
    }
}

/// Build the full application router using the given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_bus(pool, Arc::new(EventBus::default()))
}

/// Like [`build_test_app`] but with a caller-supplied bus, so tests can
/// observe published events.
pub fn build_test_app_with_bus(pool: PgPool, event_bus: Arc<EventBus>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus,
        voice: Arc::new(HmacVoiceTokenIssuer::new(config.voice.clone())),
    };
    build_app_router(state, &config)
}

/// Access token for a participant.
pub fn token(participant_id: DbId) -> String {
    generate_access_token(participant_id, ROLE_PARTICIPANT, &test_config().jwt)
        .expect("token generation should succeed")
}

/// Access token carrying the admin role.
pub fn admin_token(participant_id: DbId) -> String {
    generate_access_token(participant_id, ROLE_ADMIN, &test_config().jwt)
        .expect("token generation should succeed")
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

/// POST with no body.
pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be valid JSON")
}

/// Enqueue `participant_id` through the API and assert it was accepted.
pub async fn enqueue(app: Router, participant_id: DbId, gender: &str, want_gender: &str) {
    let response = post_json_auth(
        app,
        "/api/v1/queue",
        serde_json::json!({ "gender": gender, "want_gender": want_gender }),
        &token(participant_id),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
}

/// Pair two compatible participants via the admin drain and return the
/// new room's id.
pub async fn pair(pool: &PgPool, a: DbId, b: DbId) -> DbId {
    enqueue(build_test_app(pool.clone()), a, "m", "any").await;
    enqueue(build_test_app(pool.clone()), b, "f", "any").await;

    let response = post_auth(
        build_test_app(pool.clone()),
        "/api/v1/admin/match/drain",
        &admin_token(999),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["rooms_created"], 1);
    json["data"]["room_ids"][0].as_i64().expect("room id")
}

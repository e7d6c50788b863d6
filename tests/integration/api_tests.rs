//! HTTP surface tests
//!
//! These build the router over lazy database and Redis handles, so they only
//! cover requests answered before any store is touched.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use libris_server::{
    api,
    config::AppConfig,
    models::user::{Role, UserClaims},
    repository::Repository,
    services::{clock::SystemClock, email::EmailService, redis::RedisService, Services},
    AppState,
};

fn app() -> (Router, AppConfig) {
    let config = AppConfig::load().expect("Failed to load configuration");
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("Invalid database url");
    let redis = RedisService::lazy(&config.redis.url).expect("Invalid redis url");
    let notifier = Arc::new(EmailService::new(config.email.clone()));
    let services = Services::new(Repository::new(pool), &config, redis, Arc::new(SystemClock), notifier);

    let state = AppState {
        config: Arc::new(config.clone()),
        services: Arc::new(services),
    };
    (api::router(state), config)
}

fn token(config: &AppConfig, role: Role) -> String {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: "reader".to_string(),
        user_id: 42,
        role,
        exp: now + 3600,
        iat: now,
    }
    .create_token(&config.auth.jwt_secret)
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/api/v1/books").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("authorization header"));
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/api/v1/borrows")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_readers() {
    let (app, config) = app();
    let reader = token(&config, Role::User);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/books")
                .header(header::AUTHORIZATION, format!("Bearer {}", reader))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"title": "Kindred", "author": "Octavia E. Butler", "isbn": "9780807083697"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(
            Request::post("/api/v1/overdue/send")
                .header(header::AUTHORIZATION, format!("Bearer {}", reader))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_backdated_return_requires_admin() {
    let (app, config) = app();
    let reader = token(&config, Role::User);

    let response = app
        .oneshot(
            Request::post("/api/v1/borrows/1/return")
                .header(header::AUTHORIZATION, format!("Bearer {}", reader))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"returned_at": "2000-01-01T00:00:00Z"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_rejects_available_copies() {
    let (app, config) = app();
    let admin = token(&config, Role::Admin);

    let response = app
        .oneshot(
            Request::put("/api/v1/books/1")
                .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"available_copies": 3}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/borrows"].is_object());
}

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use chrono::Duration;
use http_body_util::BodyExt;
use proposta_api::auth::jwt::JwtConfig;
use proposta_api::auth::password::{hash_password, PasswordConfig};
use proposta_api::config::{RegistrationConfig, ServerConfig};
use proposta_api::router::build_app_router;
use proposta_api::state::AppState;
use proposta_core::rate_limit::RateLimitConfig;
use proposta_db::models::user::{CreateUser, User};
use proposta_db::store::{CredentialStore, MemoryCredentialStore};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
pub const TEST_PASSWORD: &str = "senha-forte-123";

/// Build a test `ServerConfig` with safe defaults and cheap password hashing.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            ttl: Duration::days(7),
        },
        password: fast_passwords(),
        rate_limit: RateLimitConfig::default(),
        registration: RegistrationConfig::default(),
    }
}

pub fn fast_passwords() -> PasswordConfig {
    PasswordConfig {
        cost: 1,
        memory_kib: 1024,
    }
}

/// A router over an in-memory store, plus handles for assertions.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryCredentialStore>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same [`build_app_router`] as `main.rs`, so integration tests
/// exercise the production middleware stack.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config(), |state| state)
}

/// Like [`build_test_app`] with a custom config and a hook to adjust state.
pub fn build_test_app_with(
    config: ServerConfig,
    customize: impl FnOnce(AppState) -> AppState,
) -> TestApp {
    let store = Arc::new(MemoryCredentialStore::new());
    let state = customize(AppState::new(config.clone(), store.clone()));
    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        store,
    }
}

/// Insert a user whose password is [`TEST_PASSWORD`].
pub async fn create_user(app: &TestApp, email: &str, role: &str) -> User {
    let password_hash =
        hash_password(TEST_PASSWORD, &fast_passwords()).expect("hashing should succeed");
    insert_raw(app, email, role, &password_hash).await
}

/// Insert a user with an arbitrary stored `password_hash` value.
pub async fn insert_raw(app: &TestApp, email: &str, role: &str, password_hash: &str) -> User {
    app.store
        .insert(&CreateUser {
            name: format!("User {email}"),
            email: email.to_string(),
            cnpj_access: "12345678000190".to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
        })
        .await
        .expect("user creation should succeed")
}

/// Log in and return the session token. Panics unless the login succeeds.
pub async fn login_token(app: &TestApp, email: &str, password: &str) -> String {
    let body = serde_json::json!({ "email": email, "password": password });
    let response = post_json(app.router(), "/api/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["data"]["token"]
        .as_str()
        .expect("login response must contain a token")
        .to_string()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Request::builder().method(Method::GET).uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    post_json_from(app, uri, body, "203.0.113.10").await
}

/// POST JSON as if forwarded for client `ip`.
pub async fn post_json_from(app: Router, uri: &str, body: Value, ip: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body must be JSON")
}

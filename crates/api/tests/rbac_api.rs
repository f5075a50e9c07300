//! Integration tests for the bearer-token gate and role checks.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use common::{
    body_json, build_test_app, build_test_app_with, create_user, get, get_auth, login_token,
    post_json_auth, put_json_auth, send, test_config, TEST_PASSWORD,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use proposta_api::auth::account_status::AccountStatus;
use proposta_api::auth::jwt::Claims;
use proposta_core::roles::{ROLE_ADMIN, ROLE_EMPLOYEE};
use proposta_db::models::user::User;
use proposta_db::store::CredentialStore;
use serde_json::json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Marks one email as inactive.
struct Deactivated(&'static str);

impl AccountStatus for Deactivated {
    fn is_inactive(&self, user: &User) -> bool {
        user.email == self.0
    }
}

fn expired_token(user: &User) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role.clone(),
        cnpj_access: user.cnpj_access.clone(),
        iat: now - 600,
        exp: now - 300,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(common::TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Auth gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_or_non_bearer_header_is_401() {
    let app = build_test_app();

    let response = get(app.router(), "/api/auth/me").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/auth/me")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = send(app.router(), request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_or_expired_token_is_403() {
    let app = build_test_app();
    let user = create_user(&app, "ana@empresa.com", ROLE_EMPLOYEE).await;

    let response = get_auth(app.router(), "/api/auth/me", "not.a.token").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let invalid = body_json(response).await;

    let response = get_auth(app.router(), "/api/auth/me", &expired_token(&user)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let expired = body_json(response).await;

    assert_eq!(invalid["error"], expired["error"]);
}

#[tokio::test]
async fn deleted_user_token_is_401() {
    let app = build_test_app();
    let user = create_user(&app, "ana@empresa.com", ROLE_EMPLOYEE).await;
    let token = login_token(&app, "ana@empresa.com", TEST_PASSWORD).await;

    assert!(app.store.remove(user.id).await);

    let response = get_auth(app.router(), "/api/auth/me", &token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "User not found");
}

#[tokio::test]
async fn inactive_account_is_refused_at_login_and_gate() {
    let app = build_test_app();
    create_user(&app, "ana@empresa.com", ROLE_EMPLOYEE).await;
    let token = login_token(&app, "ana@empresa.com", TEST_PASSWORD).await;

    // Same store, now with the account flagged inactive.
    let store: Arc<dyn CredentialStore> = app.store.clone();
    let inactive = build_test_app_with(test_config(), |state| {
        let mut state = state.with_account_status(Arc::new(Deactivated("ana@empresa.com")));
        state.store = store;
        state
    });

    let response = get_auth(inactive.router(), "/api/auth/me", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = common::post_json(
        inactive.router(),
        "/api/auth/login",
        json!({ "email": "ana@empresa.com", "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(inactive.state.rate_limiter.metrics().snapshot().failures, 1);
}

// ---------------------------------------------------------------------------
// Role checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_routes_reject_employees() {
    let app = build_test_app();
    create_user(&app, "ana@empresa.com", ROLE_EMPLOYEE).await;
    let token = login_token(&app, "ana@empresa.com", TEST_PASSWORD).await;

    let response = get_auth(app.router(), "/api/users", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Admin user management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_can_manage_users() {
    let app = build_test_app();
    create_user(&app, "chefe@empresa.com", ROLE_ADMIN).await;
    let token = login_token(&app, "chefe@empresa.com", TEST_PASSWORD).await;

    // Create.
    let response = post_json_auth(
        app.router(),
        "/api/users",
        json!({
            "name": "Bruno",
            "email": "Bruno@Empresa.com",
            "cnpj_access": "98.765.432/0001-10",
            "password": "primeira-senha",
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["data"]["email"], "bruno@empresa.com");
    assert_eq!(created["data"]["role"], "employee");
    assert_eq!(created["data"]["cnpj_access"], "98765432000110");
    let id = created["data"]["id"].as_str().unwrap().to_string();

    // List, sorted by name, no hashes.
    let response = get_auth(app.router(), "/api/users", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    let users = list["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    // Get.
    let response = get_auth(app.router(), &format!("/api/users/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Password update, then the new password logs in.
    let response = put_json_auth(
        app.router(),
        &format!("/api/users/{id}/password"),
        json!({ "password": "segunda-senha" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    login_token(&app, "bruno@empresa.com", "segunda-senha").await;
}

#[tokio::test]
async fn admin_create_validates_input() {
    let app = build_test_app();
    create_user(&app, "chefe@empresa.com", ROLE_ADMIN).await;
    let token = login_token(&app, "chefe@empresa.com", TEST_PASSWORD).await;

    let short_password = json!({
        "name": "Bruno",
        "email": "bruno@empresa.com",
        "cnpj_access": "98765432000110",
        "password": "curta",
    });
    let response = post_json_auth(app.router(), "/api/users", short_password, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bad_email = json!({
        "name": "Bruno",
        "email": "not-an-email",
        "cnpj_access": "98765432000110",
        "password": "senha-longa-o-bastante",
    });
    let response = post_json_auth(app.router(), "/api/users", bad_email, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bad_role = json!({
        "name": "Bruno",
        "email": "bruno@empresa.com",
        "cnpj_access": "98765432000110",
        "password": "senha-longa-o-bastante",
        "role": "superuser",
    });
    let response = post_json_auth(app.router(), "/api/users", bad_role, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let duplicate = json!({
        "name": "Outro chefe",
        "email": "CHEFE@empresa.com",
        "cnpj_access": "98765432000110",
        "password": "senha-longa-o-bastante",
    });
    let response = post_json_auth(app.router(), "/api/users", duplicate, &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_user_id_is_404() {
    let app = build_test_app();
    create_user(&app, "chefe@empresa.com", ROLE_ADMIN).await;
    let token = login_token(&app, "chefe@empresa.com", TEST_PASSWORD).await;

    let response = get_auth(
        app.router(),
        &format!("/api/users/{}", Uuid::new_v4()),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = put_json_auth(
        app.router(),
        &format!("/api/users/{}/password", Uuid::new_v4()),
        json!({ "password": "segunda-senha" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

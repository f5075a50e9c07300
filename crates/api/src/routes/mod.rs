pub mod auth;
pub mod health;
pub mod users;

use axum::http::Uri;
use axum::response::IntoResponse;
use axum::Router;

use crate::middleware::auth::AuthUser;
use crate::router::not_found;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                     service and store health (public)
/// /health/db                  503 when the store is down (public)
///
/// /auth/login                 login (public)
/// /auth/register              self registration (public)
/// /auth/me                    current user (requires auth)
/// /auth/metrics               login counters (admin only)
///
/// /users                      list, create (admin only)
/// /users/{id}                 get (admin only)
/// /users/{id}/password        replace password (admin only)
///
/// anything else               404 (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .fallback(authenticated_not_found)
}

async fn authenticated_not_found(_auth_user: AuthUser, uri: Uri) -> impl IntoResponse {
    not_found(uri).await
}

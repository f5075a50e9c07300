use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Public login and registration, mounted at `/auth` and `/api/auth`.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
}

/// Everything under `/api/auth`: the public routes plus the authenticated ones.
pub fn router() -> Router<AppState> {
    public_router()
        .route("/me", get(auth::me))
        .route("/metrics", get(auth::metrics))
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the credential store is reachable.
    pub db_healthy: bool,
}

/// GET /health -- returns service and store health. Always 200.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(report(&state).await)
}

/// GET /health/db -- 503 when the store is unreachable.
async fn health_db(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = report(&state).await;
    let status = if report.db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn report(state: &AppState) -> HealthResponse {
    let db_healthy = match state.store.health_check().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Store health check failed");
            false
        }
    };

    HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
    }
}

/// Health routes, mounted both at the root and under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(health_db))
}

//! Handlers for the `/users` resource (admin user management).
//!
//! All handlers require the `admin` role via [`RequireAdmin`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use proposta_core::access_tag::normalize_access_tag;
use proposta_core::error::CoreError;
use proposta_core::roles::{is_known_role, DEFAULT_ROLE};
use proposta_core::types::UserId;
use proposta_db::models::user::{CreateUser, UserResponse};
use serde::Deserialize;
use validator::Validate;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/users`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    #[validate(length(min = 1, message = "cnpj_access is required"))]
    pub cnpj_access: String,
    pub password: String,
    /// Defaults to `employee`.
    #[serde(default)]
    pub role: Option<String>,
}

/// Request body for `PUT /api/users/{id}/password`.
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/users
///
/// All users ordered by name, without password hashes.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = state.store.list().await?;
    Ok(Json(DataResponse {
        data: users.iter().map(UserResponse::from).collect(),
    }))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;

    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// POST /api/users
///
/// Create a user on someone's behalf. Validates the input and password
/// strength, hashes at the configured cost, and returns 201.
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let role = input.role.as_deref().unwrap_or(DEFAULT_ROLE);
    if !is_known_role(role) {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Unknown role: {role}"
        ))));
    }

    let access_tag = normalize_access_tag(&input.cnpj_access);
    if access_tag.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "cnpj_access must contain digits".into(),
        )));
    }

    let password_hash = hash_password(&input.password, &state.config.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = state
        .store
        .insert(&CreateUser {
            name: input.name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            cnpj_access: access_tag,
            password_hash,
            role: role.to_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, created_by = %admin.user_id, "User created by admin");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from(&user),
        }),
    ))
}

/// PUT /api/users/{id}/password
///
/// Replace a user's password. Returns 204 No Content.
pub async fn update_password(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(input): Json<UpdatePasswordRequest>,
) -> AppResult<StatusCode> {
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let password_hash = hash_password(&input.password, &state.config.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    if !state.store.update_password(id, &password_hash).await? {
        return Err(user_not_found(id));
    }

    tracing::info!(user_id = %id, updated_by = %admin.user_id, "Password updated by admin");
    Ok(StatusCode::NO_CONTENT)
}

fn user_not_found(id: UserId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

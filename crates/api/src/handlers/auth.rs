//! Handlers for the `/auth` resource (login, registration, current user,
//! rate-limit metrics).
//!
//! Login and registration read the raw body instead of a typed `Json<T>`:
//! clients send credentials as JSON in several historical shapes or as an
//! HTML form, sometimes with a wrong `Content-Type`, and a malformed body
//! must still be counted as a failed attempt rather than rejected by the
//! extractor.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use proposta_core::access_tag::normalize_access_tag;
use proposta_core::auth_payload::{
    is_body_empty, parse_body, AuthPayload, NormalizedCredentials, RegistrationPayload,
};
use proposta_core::error::CoreError;
use proposta_core::rate_limit::{
    AuthMetricsSnapshot, FailureReason, RateLimitDecision, RateLimitKeys,
};
use proposta_core::roles::DEFAULT_ROLE;
use proposta_db::models::user::{CreateUser, User, UserResponse};
use serde::Serialize;

use crate::auth::jwt::{issue_token, TokenSubject};
use crate::auth::password::{hash_password, is_recognized_format, needs_rehash, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::client_ip::ClientIp;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

const INVITE_HEADER: &str = "x-invite-token";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Successful login payload.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Successful registration payload.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub token: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /auth/login, POST /api/auth/login
///
/// Accepts `{email, password}` plus the legacy shapes understood by
/// [`AuthPayload`]. Every outcome other than success counts as a failure
/// against both the caller's IP and the submitted email.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<DataResponse<LoginResponse>>> {
    let limiter = &state.rate_limiter;
    limiter.record_attempt();

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let parsed = parse_body(content_type, &body);
    let payload = AuthPayload::from_body(&parsed);
    let credentials = payload.normalize();
    if !credentials.deprecated_keys.is_empty() {
        tracing::info!(
            shape = payload.shape(),
            deprecated_keys = ?credentials.deprecated_keys,
            "Login payload uses deprecated keys"
        );
    }

    let keys = RateLimitKeys::new(&ip, &credentials.email);

    if let RateLimitDecision::Locked { retry_after_secs } = limiter.check(&keys) {
        return Err(CoreError::RateLimited { retry_after_secs }.into());
    }

    if !credentials.is_complete() {
        limiter.record_failure(&keys, FailureReason::MissingCredentials);
        return Err(AppError::MissingCredentials {
            content_type: content_type.map(str::to_string),
            body_empty: is_body_empty(&parsed),
        });
    }

    let user = match authenticate(&state, &credentials).await {
        Ok(user) => user,
        Err(rejection) => {
            limiter.record_failure(&keys, rejection.reason);
            return Err(rejection.error);
        }
    };

    let token = issue_token(&TokenSubject::from(&user), &state.config.jwt).map_err(|err| {
        limiter.record_failure(&keys, FailureReason::ServerError);
        AppError::from(err)
    })?;

    limiter.record_success(&keys);
    tracing::info!(user_id = %user.id, "Login succeeded");

    Ok(Json(DataResponse {
        data: LoginResponse {
            token,
            user: UserResponse::from(&user),
        },
    }))
}

/// POST /auth/register, POST /api/auth/register
///
/// Self-service account creation with role `employee`. Returns 201 with the
/// new user and a session token.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<DataResponse<RegisterResponse>>)> {
    let gate = &state.config.registration;
    if gate.is_disabled() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Registration is disabled".into(),
        )));
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let payload = RegistrationPayload::from_body(&parse_body(content_type, &body));

    if let Some(expected) = gate.required_invite() {
        let provided = payload.invite_token.as_deref().or_else(|| {
            headers
                .get(INVITE_HEADER)
                .and_then(|value| value.to_str().ok())
        });
        if provided != Some(expected) {
            tracing::warn!(invite_present = provided.is_some(), "Registration rejected: invite token mismatch");
            return Err(AppError::Core(CoreError::Forbidden(
                "Registration not authorized".into(),
            )));
        }
    }

    let access_tag = normalize_access_tag(&payload.cnpj_access);
    if !payload.is_complete() || access_tag.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Missing required fields: name, email, cnpj_access, password".into(),
        )));
    }

    if state.store.find_by_email(&payload.email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "Email already registered".into(),
        )));
    }

    let password_hash = hash_password(&payload.password, &state.config.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    // A concurrent insert of the same email surfaces as StoreError::DuplicateEmail (409).
    let user = state
        .store
        .insert(&CreateUser {
            name: payload.name,
            email: payload.email,
            cnpj_access: access_tag,
            password_hash,
            role: DEFAULT_ROLE.to_string(),
        })
        .await?;

    let token = issue_token(&TokenSubject::from(&user), &state.config.jwt)?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: RegisterResponse {
                user: UserResponse::from(&user),
                token,
            },
        }),
    ))
}

/// GET /api/auth/me
///
/// The authenticated user's current record.
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .store
        .find_by_id(auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User not found".into())))?;

    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// GET /api/auth/metrics
///
/// Login counters since process start (admin only).
pub async fn metrics(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Json<DataResponse<AuthMetricsSnapshot>> {
    Json(DataResponse {
        data: state.rate_limiter.metrics().snapshot(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A failed credential check: what to record and what to return.
struct LoginRejection {
    reason: FailureReason,
    error: AppError,
}

impl LoginRejection {
    /// Unknown email, unusable stored hash and wrong password are
    /// indistinguishable to the caller.
    fn invalid_credentials() -> Self {
        Self {
            reason: FailureReason::InvalidCredentials,
            error: AppError::Core(CoreError::Unauthorized("Invalid credentials".into())),
        }
    }

    fn server_error(error: AppError) -> Self {
        Self {
            reason: FailureReason::ServerError,
            error,
        }
    }
}

async fn authenticate(
    state: &AppState,
    credentials: &NormalizedCredentials,
) -> Result<User, LoginRejection> {
    let user = state
        .store
        .find_by_email(&credentials.email)
        .await
        .map_err(|err| LoginRejection::server_error(err.into()))?
        .ok_or_else(LoginRejection::invalid_credentials)?;

    if state.account_status.is_inactive(&user) {
        return Err(LoginRejection {
            reason: FailureReason::InactiveAccount,
            error: AppError::Core(CoreError::Forbidden("Account is inactive".into())),
        });
    }

    let stored_hash = user.password_hash.trim();
    if !is_recognized_format(stored_hash) {
        tracing::warn!(
            user_id = %user.id,
            "Stored password hash is not in a recognized format; run hash-legacy-passwords"
        );
        return Err(LoginRejection::invalid_credentials());
    }

    let matches = verify_password(&credentials.password, stored_hash).map_err(|e| {
        LoginRejection::server_error(AppError::InternalError(format!(
            "Password verification error: {e}"
        )))
    })?;
    if !matches {
        return Err(LoginRejection::invalid_credentials());
    }

    if needs_rehash(stored_hash) {
        upgrade_password_hash(state, &user, &credentials.password).await;
    }

    Ok(user)
}

/// Replace a verified legacy hash with a fresh Argon2id hash. Failures are
/// logged and the login proceeds; the old hash keeps working.
async fn upgrade_password_hash(state: &AppState, user: &User, password: &str) {
    let password_hash = match hash_password(password, &state.config.password) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::warn!(user_id = %user.id, error = %err, "Failed to rehash legacy password");
            return;
        }
    };

    match state.store.update_password(user.id, &password_hash).await {
        Ok(_) => tracing::info!(user_id = %user.id, "Upgraded legacy bcrypt hash to argon2id"),
        Err(err) => {
            tracing::warn!(user_id = %user.id, error = %err, "Failed to store rehashed password")
        }
    }
}

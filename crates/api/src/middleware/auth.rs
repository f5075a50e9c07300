//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use proposta_core::access_tag::normalize_access_tag;
use proposta_core::error::CoreError;
use proposta_core::types::UserId;

use crate::auth::jwt::{verify_token, TokenError};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the `Authorization` header.
///
/// The token only proves who the caller was when it was issued. The user row
/// is re-read on every request, so deleted users are rejected immediately and
/// `role` reflects the current record rather than the token claim.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub email: String,
    /// `"admin"` or `"employee"`.
    pub role: String,
    /// Digits-only access tag.
    pub access_tag: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Missing bearer token".into()))
        })?;

        let claims = verify_token(token, &state.config.jwt).map_err(|err| match err {
            TokenError::MissingSecret => AppError::from(TokenError::MissingSecret),
            other => {
                tracing::debug!(error = %other, "Rejected bearer token");
                AppError::Core(CoreError::Forbidden("Invalid or expired token".into()))
            }
        })?;

        let user = state
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User not found".into())))?;

        if state.account_status.is_inactive(&user) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Account is inactive".into(),
            )));
        }

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            role: user.role,
            access_tag: normalize_access_tag(&user.cnpj_access),
        })
    }
}

/// The token from `Authorization: Bearer <token>`. The scheme is matched
/// case-insensitively; any other scheme yields `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

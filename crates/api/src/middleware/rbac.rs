//! Role-based access control (RBAC).
//!
//! [`RequireAdmin`] wraps [`AuthUser`] and rejects requests whose current
//! role is not `admin`. [`AuthUser::require_role`] covers ad-hoc role sets.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use proposta_core::error::CoreError;
use proposta_core::roles::ROLE_ADMIN;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

impl AuthUser {
    /// Reject with 403 unless the user's role is one of `allowed`.
    pub fn require_role(&self, allowed: &[&str]) -> Result<(), AppError> {
        if allowed.contains(&self.role.as_str()) {
            Ok(())
        } else {
            Err(AppError::Core(CoreError::Forbidden(
                "Insufficient role".into(),
            )))
        }
    }
}

/// Requires the `admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
///     // user is guaranteed to be an admin here
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_role(&[ROLE_ADMIN])?;
        Ok(RequireAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proposta_core::roles::ROLE_EMPLOYEE;
    use uuid::Uuid;

    use super::*;

    fn user(role: &str) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: "ana@empresa.com".into(),
            role: role.into(),
            access_tag: "12345678000190".into(),
        }
    }

    #[test]
    fn role_membership() {
        assert!(user(ROLE_ADMIN).require_role(&[ROLE_ADMIN]).is_ok());
        assert!(user(ROLE_EMPLOYEE)
            .require_role(&[ROLE_ADMIN, ROLE_EMPLOYEE])
            .is_ok());
        assert_matches!(
            user(ROLE_EMPLOYEE).require_role(&[ROLE_ADMIN]),
            Err(AppError::Core(CoreError::Forbidden(_)))
        );
        assert!(user(ROLE_ADMIN).require_role(&[]).is_err());
    }
}

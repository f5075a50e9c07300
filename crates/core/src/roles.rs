//! Well-known role name constants.
//!
//! These must match the check constraint in `20260101000001_create_users_table.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EMPLOYEE: &str = "employee";

/// Role assigned to self-registered accounts and to admin-created users that
/// do not specify one.
pub const DEFAULT_ROLE: &str = ROLE_EMPLOYEE;

/// Every role the `users.role` column accepts.
pub const ALL_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_EMPLOYEE];

/// Whether `role` is one of [`ALL_ROLES`].
pub fn is_known_role(role: &str) -> bool {
    ALL_ROLES.contains(&role)
}

//! Request extractors for authentication, authorization and client identity.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`client_ip::ClientIp`] -- The caller's address as seen by the rate limiter.

pub mod auth;
pub mod client_ip;
pub mod rbac;

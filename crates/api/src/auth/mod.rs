//! Authentication and authorization primitives.
//!
//! - [`password`] -- Argon2id password hashing, verification, and format checks.
//! - [`jwt`] -- Session token issuance and verification.
//! - [`account_status`] -- Hook deciding whether an account may authenticate.

pub mod account_status;
pub mod jwt;
pub mod password;

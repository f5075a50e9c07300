//! Domain building blocks shared by the store and the HTTP layer.
//!
//! Everything here is free of I/O: error taxonomy, role names, access-tag
//! normalization, the credential payload normalizer, and the brute-force
//! rate limiter.

pub mod access_tag;
pub mod auth_payload;
pub mod error;
pub mod rate_limit;
pub mod roles;
pub mod types;

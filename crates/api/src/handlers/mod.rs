//! Request handlers.
//!
//! Each submodule provides async handler functions for one resource and
//! maps failures via [`AppError`](crate::error::AppError).

pub mod auth;
pub mod users;

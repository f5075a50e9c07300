//! HTTP service for the proposta platform: credential login, registration,
//! bearer-token auth and admin user management.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod telemetry;

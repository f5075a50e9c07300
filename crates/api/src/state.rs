use std::sync::Arc;

use proposta_core::rate_limit::AuthRateLimiter;
use proposta_db::store::CredentialStore;

use crate::auth::account_status::{AccountStatus, AllAccountsActive};
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (token secret, hash cost, registration gating).
    pub config: Arc<ServerConfig>,
    /// User records.
    pub store: Arc<dyn CredentialStore>,
    /// Login brute-force protection. Per process: replicas keep separate
    /// counters. Keys come from `X-Forwarded-For` and the submitted email, so
    /// the store grows with recent distinct callers; idle entries are pruned
    /// periodically.
    pub rate_limiter: Arc<AuthRateLimiter>,
    /// Active/inactive decision for existing accounts.
    pub account_status: Arc<dyn AccountStatus>,
}

impl AppState {
    /// Build state with a fresh in-memory rate limiter and every account active.
    pub fn new(config: ServerConfig, store: Arc<dyn CredentialStore>) -> Self {
        let rate_limiter = Arc::new(AuthRateLimiter::new(config.rate_limit.clone()));
        Self {
            config: Arc::new(config),
            store,
            rate_limiter,
            account_status: Arc::new(AllAccountsActive),
        }
    }

    /// Replace the account status hook.
    pub fn with_account_status(mut self, account_status: Arc<dyn AccountStatus>) -> Self {
        self.account_status = account_status;
        self
    }
}

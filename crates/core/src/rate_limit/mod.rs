//! Brute-force protection for the login endpoint.
//!
//! Failures are tracked along two independent dimensions, the client IP
//! (`ip:<address>`) and the target account (`user:<email>`). Each key moves
//! through three states:
//!
//! ```text
//! clear ──failure──> accumulating ──count reaches max──> locked
//!   ^                     │                                │
//!   └──── success ────────┴───── success / window reset ───┘
//! ```
//!
//! A request is rejected while *either* of its keys is locked. Each lockout
//! doubles the next one (`base * 2^level`, capped at `max`) until a success
//! deletes the entry.
//!
//! State lives in a [`RateLimitStore`]; the default [`MemoryRateLimitStore`]
//! is per process, so several instances behind a load balancer do not share
//! lockouts. Entries that are neither locked nor touched within
//! `max(window, lockout_max)` are pruned every [`PRUNE_EVERY_FAILURES`]
//! failures, which bounds the store by recent traffic rather than by every
//! key ever seen.

mod metrics;
mod store;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::types::Timestamp;

pub use metrics::{AuthMetrics, AuthMetricsSnapshot};
pub use store::{MemoryRateLimitStore, RateLimitStore};

/// Default failure-counting window (15 minutes).
pub const DEFAULT_WINDOW_MS: i64 = 15 * 60 * 1000;
/// Default failures allowed per window before a lockout.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default first lockout duration (5 minutes).
pub const DEFAULT_LOCKOUT_BASE_MS: i64 = 5 * 60 * 1000;
/// Default lockout ceiling (1 hour).
pub const DEFAULT_LOCKOUT_MAX_MS: i64 = 60 * 60 * 1000;
/// Failures recorded between two sweeps of stale entries.
pub const PRUNE_EVERY_FAILURES: u32 = 1024;
/// Largest window or lockout duration a deployment may configure (365 days).
pub const MAX_CONFIGURED_DURATION_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Tunables for [`AuthRateLimiter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Failures older than this no longer count.
    pub window: Duration,
    /// Failures within `window` that trigger a lockout.
    pub max_attempts: u32,
    /// Duration of the first lockout.
    pub lockout_base: Duration,
    /// Upper bound for any single lockout.
    pub lockout_max: Duration,
    /// Disables enforcement and wipes state on every check. Never on by default.
    pub test_mode: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::milliseconds(DEFAULT_WINDOW_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_base: Duration::milliseconds(DEFAULT_LOCKOUT_BASE_MS),
            lockout_max: Duration::milliseconds(DEFAULT_LOCKOUT_MAX_MS),
            test_mode: false,
        }
    }
}

impl RateLimitConfig {
    /// Lockout length after `lockout_level` previous lockouts:
    /// `base * 2^lockout_level`, capped at `lockout_max`.
    pub fn lockout_duration(&self, lockout_level: u32) -> Duration {
        let max_ms = self.lockout_max.num_milliseconds();
        let backoff_ms = 2_i64
            .checked_pow(lockout_level)
            .and_then(|factor| self.lockout_base.num_milliseconds().checked_mul(factor))
            .unwrap_or(max_ms);
        Duration::milliseconds(backoff_ms.min(max_ms))
    }
}

/// The pair of keys one login request is tracked under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitKeys {
    /// `ip:<address>`.
    pub ip: String,
    /// `user:<email>`, absent when the request carried no email.
    pub account: Option<String>,
}

impl RateLimitKeys {
    /// Build keys from a client address and an already-normalized email.
    pub fn new(ip: &str, email: &str) -> Self {
        Self {
            ip: format!("ip:{ip}"),
            account: (!email.is_empty()).then(|| format!("user:{email}")),
        }
    }

    /// IP key first, then the account key when present.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.ip.as_str()).chain(self.account.as_deref())
    }
}

/// Outcome of [`AuthRateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// At least one key is locked; the caller may retry after this many seconds.
    Locked { retry_after_secs: u64 },
}

/// Why a failure was recorded. Logged, never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    MissingCredentials,
    InvalidCredentials,
    InactiveAccount,
    ServerError,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InactiveAccount => "user_inactive",
            Self::ServerError => "server_error",
        }
    }
}

/// Failure bookkeeping for a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Failures in the current window.
    pub count: u32,
    pub first_attempt_at: Timestamp,
    pub lockout_until: Option<Timestamp>,
    /// Number of lockouts triggered since the last success.
    pub lockout_level: u32,
    pub last_failure_at: Option<Timestamp>,
}

impl RateLimitEntry {
    pub fn new(now: Timestamp) -> Self {
        Self {
            count: 0,
            first_attempt_at: now,
            lockout_until: None,
            lockout_level: 0,
            last_failure_at: None,
        }
    }

    pub fn is_locked_at(&self, now: Timestamp) -> bool {
        self.lockout_until.is_some_and(|until| now < until)
    }

    fn last_activity(&self) -> Timestamp {
        self.last_failure_at.unwrap_or(self.first_attempt_at)
    }

    fn restart_window_if_elapsed(&mut self, now: Timestamp, window: Duration) {
        if now - self.first_attempt_at > window {
            self.count = 0;
            self.first_attempt_at = now;
        }
    }
}

/// Adaptive lockout over a [`RateLimitStore`], with process-wide metrics.
pub struct AuthRateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
    metrics: AuthMetrics,
    /// Serializes read-modify-write sequences against `store`. Holds the
    /// number of failures since the last stale-entry sweep.
    gate: Mutex<u32>,
}

impl std::fmt::Debug for AuthRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRateLimiter")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

impl AuthRateLimiter {
    /// Limiter backed by a fresh [`MemoryRateLimitStore`].
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryRateLimitStore::new()))
    }

    pub fn with_store(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        if config.test_mode {
            tracing::warn!("Auth rate limiting is in TEST MODE: lockouts are not enforced");
        }
        Self {
            config,
            store,
            metrics: AuthMetrics::default(),
            gate: Mutex::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AuthMetrics {
        &self.metrics
    }

    /// Current entry for a prefixed key.
    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.store.get(key)
    }

    /// Count one login attempt.
    pub fn record_attempt(&self) {
        self.metrics.record_attempt();
    }

    pub fn check(&self, keys: &RateLimitKeys) -> RateLimitDecision {
        self.check_at(keys, Utc::now())
    }

    /// Reject when either key is locked at `now`.
    pub fn check_at(&self, keys: &RateLimitKeys, now: Timestamp) -> RateLimitDecision {
        let _guard = self.lock_gate();

        if self.config.test_mode {
            self.metrics.reset_attempts_and_failures();
            self.store.clear();
            return RateLimitDecision::Allowed;
        }

        let Some(lockout_until) = keys
            .iter()
            .filter_map(|key| self.store.get(key))
            .find(|entry| entry.is_locked_at(now))
            .and_then(|entry| entry.lockout_until)
        else {
            return RateLimitDecision::Allowed;
        };

        self.metrics.record_blocked();
        let remaining_ms = u64::try_from((lockout_until - now).num_milliseconds()).unwrap_or(0);
        let retry_after_secs = remaining_ms.div_ceil(1000);

        tracing::warn!(
            ip_key = %keys.ip,
            user_key = keys.account.as_deref(),
            retry_after_secs,
            metrics = ?self.metrics.snapshot(),
            "Login attempt blocked by rate limit",
        );

        RateLimitDecision::Locked { retry_after_secs }
    }

    pub fn record_failure(&self, keys: &RateLimitKeys, reason: FailureReason) {
        self.record_failure_at(keys, reason, Utc::now());
    }

    /// Register one failure against every key in `keys`.
    pub fn record_failure_at(&self, keys: &RateLimitKeys, reason: FailureReason, now: Timestamp) {
        let mut failures_since_prune = self.lock_gate();
        self.metrics.record_failure();

        *failures_since_prune += 1;
        if *failures_since_prune >= PRUNE_EVERY_FAILURES {
            *failures_since_prune = 0;
            self.remove_stale(now);
        }

        for key in keys.iter() {
            let mut entry = self
                .store
                .get(key)
                .unwrap_or_else(|| RateLimitEntry::new(now));

            entry.restart_window_if_elapsed(now, self.config.window);
            entry.count += 1;
            entry.last_failure_at = Some(now);

            if entry.count >= self.config.max_attempts {
                // Saturate instead of overflowing so the lockout is always stored.
                let lockout_until = now
                    .checked_add_signed(self.config.lockout_duration(entry.lockout_level))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                entry.lockout_until = Some(lockout_until);
                entry.lockout_level += 1;
                entry.count = 0;
                entry.first_attempt_at = now;
                self.metrics.record_lockout();

                tracing::warn!(
                    key,
                    lockout_until = %lockout_until,
                    lockout_level = entry.lockout_level,
                    reason = reason.as_str(),
                    "Login lockout applied",
                );
            }

            self.store.put(key, entry);
        }

        tracing::info!(
            ip_key = %keys.ip,
            user_key = keys.account.as_deref(),
            reason = reason.as_str(),
            metrics = ?self.metrics.snapshot(),
            "Login failure recorded",
        );
    }

    /// Forget both keys entirely, lockout level included.
    pub fn record_success(&self, keys: &RateLimitKeys) {
        let _guard = self.lock_gate();
        self.metrics.record_success();
        for key in keys.iter() {
            self.store.delete(key);
        }

        tracing::info!(
            ip_key = %keys.ip,
            user_key = keys.account.as_deref(),
            metrics = ?self.metrics.snapshot(),
            "Login succeeded, rate-limit state reset",
        );
    }

    /// Drop entries that are unlocked and idle for longer than
    /// `max(window, lockout_max)`. Their lockout level is forgotten.
    pub fn prune_stale_at(&self, now: Timestamp) {
        let _guard = self.lock_gate();
        self.remove_stale(now);
    }

    fn remove_stale(&self, now: Timestamp) {
        let retention = self.config.window.max(self.config.lockout_max);
        self.store.retain(&mut |entry| {
            entry.is_locked_at(now) || now - entry.last_activity() <= retention
        });
    }

    fn lock_gate(&self) -> MutexGuard<'_, u32> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

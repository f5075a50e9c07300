//! Process-wide authentication counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters for the login path.
///
/// Values only grow during the process lifetime, except that the rate-limit
/// test mode zeroes `attempts` and `failures` on every check.
#[derive(Debug, Default)]
pub struct AuthMetrics {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    blocked: AtomicU64,
    lockouts: AtomicU64,
}

/// Point-in-time copy of [`AuthMetrics`], suitable for logging and JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthMetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub blocked: u64,
    pub lockouts: u64,
}

impl AuthMetrics {
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lockout(&self) {
        self.lockouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset_attempts_and_failures(&self) {
        self.attempts.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AuthMetricsSnapshot {
        AuthMetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            lockouts: self.lockouts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = AuthMetrics::default();
        metrics.record_attempt();
        metrics.record_attempt();
        metrics.record_failure();
        metrics.record_lockout();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.lockouts, 1);
        assert_eq!(snapshot.successes, 0);
        assert_eq!(snapshot.blocked, 0);
    }

    #[test]
    fn reset_only_touches_attempts_and_failures() {
        let metrics = AuthMetrics::default();
        metrics.record_attempt();
        metrics.record_failure();
        metrics.record_success();
        metrics.record_blocked();

        metrics.reset_attempts_and_failures();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attempts, 0);
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.blocked, 1);
    }
}

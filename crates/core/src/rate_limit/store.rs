//! Storage backends for rate-limit entries.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::RateLimitEntry;

/// Key/value capability the limiter needs from its backing store.
///
/// Keys are already prefixed (`ip:<address>` or `user:<email>`). The limiter
/// serializes its own read-modify-write sequences, so implementations only
/// need each call to be individually atomic. A shared backend (one visible to
/// several processes) can implement this to get cluster-wide lockouts; the
/// in-memory default is per process.
pub trait RateLimitStore: Send + Sync {
    fn get(&self, key: &str) -> Option<RateLimitEntry>;
    fn put(&self, key: &str, entry: RateLimitEntry);
    fn delete(&self, key: &str);
    fn clear(&self);
    /// Drop every entry for which `keep` returns `false`.
    fn retain(&self, keep: &mut dyn FnMut(&RateLimitEntry) -> bool);
}

/// Process-local store. Cleared on restart.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        // Entries are plain data; a panic mid-update cannot leave them torn.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: &str, entry: RateLimitEntry) {
        self.lock().insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn retain(&self, keep: &mut dyn FnMut(&RateLimitEntry) -> bool) {
        self.lock().retain(|_, entry| keep(entry));
    }
}

//! In-memory response cache with lazy TTL expiry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// A cached value with the time it was stored and how long it stays fresh.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Keyed TTL store shared between a client and its background refreshes.
///
/// Cloning is cheap and yields a handle to the same entries. Expired entries
/// are evicted when read; there is no background sweep.
pub struct CacheStore<V = serde_json::Value> {
    entries: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("size", &self.size())
            .finish()
    }
}

impl<V> CacheStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a plain map operation, so a poisoned lock
    // still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or overwrites `key`, stamped with the current time.
    ///
    /// A zero `ttl` keeps the entry readable only at the instant it was
    /// stored; [`CacheOptions::validate`](crate::CacheOptions::validate)
    /// rejects it for client requests.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Removes `key`, returning whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Deletes every key containing `pattern` and returns how many were removed.
    pub fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        let removed = before - entries.len();

        #[cfg(feature = "tracing")]
        tracing::debug!(pattern, removed, "invalidated cache entries");

        removed
    }
}

impl<V: Clone> CacheStore<V> {
    /// Returns the value for `key` unless it is missing or expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }
}

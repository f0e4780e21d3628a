//! In-memory response cache keyed by request fingerprint
//!
//! Provides a `ResponseCache` that stores JSON payloads with the time they were
//! written. Reads take a maximum age; an entry older than that is evicted on the
//! spot and reported as absent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::clock::{Clock, SystemClock};

/// Default validity window for cached payloads in seconds (10 minutes)
pub const DEFAULT_MAX_AGE_SECS: i64 = 600;

/// A stored payload and the moment it was written
///
/// Entries are replaced wholesale on every write and never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The cached response body
    pub payload: Value,
    /// When the payload was stored
    pub stored_at: DateTime<Utc>,
}

/// Stores previously fetched payloads, bounded by a per-read validity window
///
/// Two concurrent misses for the same key both fetch and both write; the last
/// write wins. The internal lock only guards the map itself.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Creates an empty cache backed by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty cache that reads time from `clock`
    ///
    /// Useful for testing freshness boundaries with a `ManualClock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// The default validity window
    pub fn default_max_age() -> Duration {
        Duration::seconds(DEFAULT_MAX_AGE_SECS)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up a fresh entry, evicting it if it is older than `max_age`
    fn fresh_entry(&self, key: &str, max_age: Duration) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut entries = self.entries();
        let entry = entries.get(key)?.clone();

        if now - entry.stored_at > max_age {
            entries.remove(key);
            return None;
        }

        Some(entry)
    }

    /// Reads the payload stored under `key`
    ///
    /// # Returns
    /// * `Some(payload)` if an entry exists and `now - stored_at <= max_age`
    /// * `None` if there is no entry, or the entry was stale (it is removed)
    pub fn get(&self, key: &str, max_age: Duration) -> Option<Value> {
        self.fresh_entry(key, max_age).map(|entry| entry.payload)
    }

    /// Same freshness check as `get`, including eviction, without cloning the payload out
    pub fn has(&self, key: &str, max_age: Duration) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries();
        let stale = match entries.get(key) {
            Some(entry) => now - entry.stored_at > max_age,
            None => return false,
        };

        if stale {
            entries.remove(key);
        }
        !stale
    }

    /// Stores `payload` under `key`, overwriting any previous entry
    ///
    /// Returns the payload so callers can write `return Ok(cache.set(key, data))`.
    pub fn set(&self, key: &str, payload: Value) -> Value {
        let entry = CacheEntry {
            payload: payload.clone(),
            stored_at: self.clock.now(),
        };
        self.entries().insert(key.to_string(), entry);
        payload
    }

    /// Removes a single entry, or every entry when `key` is `None`
    pub fn clear(&self, key: Option<&str>) {
        let mut entries = self.entries();
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
    }

    /// Returns the raw entry for `key` without any freshness check
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries().get(key).cloned()
    }

    /// Number of entries currently held, stale or not
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

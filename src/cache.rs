//! Answer cache with TTL-based expiration.

use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::dns::{Record, RecordType, canonical_name};

struct CacheEntry {
    records: Vec<Record>,
    expires_at: Instant,
}

/// Build the key an answer for `name`/`rtype` is stored under.
pub fn cache_key(name: &str, rtype: RecordType) -> String {
    format!("{}:{rtype}", canonical_name(name))
}

/// TTL-based answer cache.
///
/// Readers share the lock; an insert excludes everyone else. Expired entries
/// are never returned and are dropped the next time a lookup trips over them.
pub struct AnswerCache {
    entries: RwLock<FxHashMap<String, CacheEntry>>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Look up a live entry.
    pub fn get(&self, key: &str) -> Option<Vec<Record>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Vec<Record>> {
        {
            let entries = self.entries.read().ok()?;
            let entry = entries.get(key)?;
            if now < entry.expires_at {
                return Some(entry.records.clone());
            }
        }

        // Expired: reclaim it unless a writer refreshed it meanwhile.
        if let Ok(mut entries) = self.entries.write() {
            if entries.get(key).is_some_and(|e| now >= e.expires_at) {
                entries.remove(key);
            }
        }
        None
    }

    /// Store `records` under `key` until `ttl` from now.
    pub fn set(&self, key: String, records: Vec<Record>, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        entries.insert(
            key,
            CacheEntry {
                records,
                expires_at,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new()
    }
}

//! In-memory memoization of extraction results.
//!
//! Entries are never swept: staleness is only evaluated when a key is read,
//! and the map grows until `clear` is called. Two requests that miss on the
//! same key both run the extractor and the later `insert` wins.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;

use crate::post_url::PostUrl;
use crate::video::VideoSummary;

/// One hour, after which a cached extraction is treated as stale.
pub const DEFAULT_CACHE_TTL: TimeDelta = TimeDelta::seconds(3600);

/// BLAKE3 digest (hex) of a normalized post URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn cache_key(url: &PostUrl) -> CacheKey {
    CacheKey(blake3::hash(url.as_str().as_bytes()).to_hex().to_string())
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub summary: VideoSummary,
    pub inserted_at: DateTime<Utc>,
}

/// True while `now - inserted_at < ttl`.
pub fn is_valid(entry: &CacheEntry, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
    now.signed_duration_since(entry.inserted_at) < ttl
}

#[derive(Debug)]
pub struct VideoCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: TimeDelta,
}

impl Default for VideoCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl VideoCache {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Raw read, stale entries included.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Lookup that hides entries older than the configured TTL.
    pub fn fresh(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.lookup(key)
            .filter(|entry| is_valid(entry, now, self.ttl))
    }

    pub fn insert(&self, key: CacheKey, summary: VideoSummary) {
        self.insert_at(key, summary, Utc::now());
    }

    pub fn insert_at(&self, key: CacheKey, summary: VideoSummary, inserted_at: DateTime<Utc>) {
        self.entries.write().insert(
            key,
            CacheEntry {
                summary,
                inserted_at,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry and reports how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        removed
    }
}

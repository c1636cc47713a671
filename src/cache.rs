use crate::Metadata;
use lru::LruCache;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
pub const DEFAULT_MAX_BYTES: usize = 8 * 1024 * 1024;

/// Serialized form of the negative marker, used for size accounting.
const NEGATIVE_MARKER: &str = "true";

/// Outcome remembered for a target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    Metadata(Metadata),
    /// The last attempt failed; do not retry until the entry expires.
    Negative,
}

impl CacheEntry {
    fn serialized_len(&self) -> usize {
        match self {
            CacheEntry::Metadata(metadata) => serde_json::to_vec(metadata)
                .map(|bytes| bytes.len())
                .unwrap_or(0),
            CacheEntry::Negative => NEGATIVE_MARKER.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    /// Budget for the sum of key and serialized value sizes.
    pub max_bytes: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_bytes: DEFAULT_MAX_BYTES,
            ttl: DEFAULT_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

struct Slot {
    entry: CacheEntry,
    size: usize,
    expires_at: Instant,
}

struct Inner {
    entries: LruCache<String, Slot>,
    total_bytes: usize,
    stats: CacheStats,
}

impl Inner {
    fn remove(&mut self, key: &str) -> Option<Slot> {
        let slot = self.entries.pop(key)?;
        self.total_bytes -= slot.size;
        Some(slot)
    }
}

/// Size and count bounded LRU cache whose entries expire after a fixed TTL.
///
/// All bookkeeping happens under one lock, so concurrent callers never see
/// the recency order and the byte total disagree.
pub struct Cache {
    inner: Mutex<Inner>,
    config: CacheConfig,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let config = CacheConfig {
            max_entries: config.max_entries.max(1),
            ..config
        };
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                total_bytes: 0,
                stats: CacheStats::default(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// A poisoned lock only means another caller panicked mid-request; the
    /// accounting is updated before any code that could panic, so keep going.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up `url`, refreshing its recency. Expired entries are dropped
    /// and reported as a miss.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        let mut inner = self.lock();
        let now = Instant::now();

        let lookup = inner
            .entries
            .get(url)
            .map(|slot| (now < slot.expires_at).then(|| slot.entry.clone()));

        match lookup {
            Some(Some(entry)) => {
                inner.stats.hits += 1;
                return Some(entry);
            }
            Some(None) => {
                inner.remove(url);
                inner.stats.expirations += 1;
                trace!(url = %url, "Cache entry expired");
            }
            None => {}
        }
        inner.stats.misses += 1;
        None
    }

    /// Inserts or replaces `url`, then evicts least recently used entries
    /// until both budgets hold again. An entry that alone exceeds the byte
    /// budget is not stored.
    pub fn set(&self, url: impl Into<String>, entry: CacheEntry) {
        let url = url.into();
        let size = url.len() + entry.serialized_len();
        let mut inner = self.lock();

        inner.remove(&url);

        if size > self.config.max_bytes {
            debug!(url = %url, size, max_bytes = self.config.max_bytes, "Entry exceeds cache byte budget, not cached");
            return;
        }

        let slot = Slot {
            entry,
            size,
            expires_at: Instant::now() + self.config.ttl,
        };
        inner.entries.put(url, slot);
        inner.total_bytes += size;

        // The entry just inserted is most recent, so it is never popped while
        // another one remains.
        while inner.entries.len() > 1
            && (inner.total_bytes > self.config.max_bytes
                || inner.entries.len() > self.config.max_entries)
        {
            let Some((key, slot)) = inner.entries.pop_lru() else {
                break;
            };
            inner.total_bytes -= slot.size;
            inner.stats.evictions += 1;
            debug!(url = %key, size = slot.size, "Evicted least recently used cache entry");
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, slot)| now >= slot.expires_at)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        inner.stats.expirations += expired.len() as u64;

        if !expired.is_empty() {
            debug!(purged = expired.len(), "Purged expired cache entries");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.lock().total_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            bytes: inner.total_bytes,
            ..inner.stats
        }
    }
}

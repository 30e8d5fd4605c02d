use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use super::format::{MAX_HITS, format_hits};
use crate::tavily::{SearchHit, WebSearch, WebSearchError};

/// Formatted search results for one sub-question.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDigest {
    pub text: String,
    /// Result URLs in provider rank order.
    pub urls: Vec<String>,
}

impl SearchDigest {
    pub fn from_hits(hits: &[SearchHit]) -> Self {
        Self {
            text: format_hits(hits),
            urls: hits.iter().take(MAX_HITS).map(|hit| hit.url.clone()).collect(),
        }
    }
}

/// Key-value store for search digests, keyed by the exact sub-question text.
pub trait SearchStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<SearchDigest>>;
    fn put(&self, key: String, digest: Arc<SearchDigest>);
    fn len(&self) -> usize;
}

struct Entry {
    digest: Arc<SearchDigest>,
    inserted_at: Instant,
}

/// LRU store with an optional time-to-live per entry.
pub struct LruStore {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Option<Duration>,
}

impl LruStore {
    pub fn new(capacity: NonZeroUsize, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.inserted_at) >= ttl)
    }
}

impl SearchStore for LruStore {
    fn get(&self, key: &str) -> Option<Arc<SearchDigest>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let expired = self.is_expired(entries.get(key)?, now);
        if expired {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| Arc::clone(&entry.digest))
    }

    fn put(&self, key: String, digest: Arc<SearchDigest>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(
            key,
            Entry {
                digest,
                inserted_at: Instant::now(),
            },
        );
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Returns the cached digest for `key`, searching and storing it on a miss.
pub async fn get_or_fetch(
    store: &dyn SearchStore,
    web: &impl WebSearch,
    key: &str,
) -> Result<Arc<SearchDigest>, WebSearchError> {
    if let Some(digest) = store.get(key) {
        debug!(query = key, "search cache hit");
        return Ok(digest);
    }

    let hits = web.search(key).await?;
    let digest = Arc::new(SearchDigest::from_hits(&hits));
    store.put(key.to_string(), Arc::clone(&digest));
    debug!(query = key, results = hits.len(), entries = store.len(), "search cached");
    Ok(digest)
}

//! Response cache keyed by (canonical query, top_k, fusion params).
//!
//! Eviction is FIFO by insertion, not access recency; profiling has not
//! shown recency to matter for this workload. Entries are replaced
//! wholesale, never updated in place.

use std::collections::{HashMap, VecDeque};
use std::hash::Hasher;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use twox_hash::XxHash64;

use guidedb_core::types::FusedResponse;

/// Deterministic cache key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub canonical_query: String,
    pub top_k: usize,
    /// Fingerprint of the fusion parameters in effect (method, rrf_k,
    /// weights), so a config change never serves stale rankings.
    pub params: String,
}

impl CacheKey {
    fn digest(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(self.canonical_query.as_bytes());
        hasher.write_u8(0);
        hasher.write_usize(self.top_k);
        hasher.write_u8(0);
        hasher.write(self.params.as_bytes());
        hasher.finish()
    }
}

struct Entry {
    response: FusedResponse,
    inserted_at: Instant,
}

struct Inner {
    map: HashMap<u64, Entry>,
    order: VecDeque<u64>,
}

/// Bounded FIFO cache of full responses. The one mutable shared
/// structure in the engine; all access goes through the mutex.
pub struct RetrievalCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl RetrievalCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        RetrievalCache {
            inner: Mutex::new(Inner { map: HashMap::new(), order: VecDeque::new() }),
            capacity,
            ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<FusedResponse> {
        let digest = key.digest();
        let mut inner = self.lock();
        if let Some(ttl) = self.ttl {
            let expired = inner
                .map
                .get(&digest)
                .is_some_and(|entry| entry.inserted_at.elapsed() > ttl);
            if expired {
                inner.map.remove(&digest);
                inner.order.retain(|&d| d != digest);
                return None;
            }
        }
        inner.map.get(&digest).map(|entry| entry.response.clone())
    }

    pub fn put(&self, key: &CacheKey, response: FusedResponse) {
        if self.capacity == 0 {
            return;
        }
        let digest = key.digest();
        let mut inner = self.lock();
        let replaced = inner
            .map
            .insert(digest, Entry { response, inserted_at: Instant::now() })
            .is_some();
        if !replaced {
            inner.order.push_back(digest);
        }
        while inner.map.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.map.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidedb_core::types::{
        FusionMethod, IntentWeights, QueryContext, ResponseMetadata,
    };

    fn response(tag: &str) -> FusedResponse {
        FusedResponse {
            results: Vec::new(),
            query: QueryContext::fallback(tag),
            metadata: ResponseMetadata {
                fusion_method: FusionMethod::Rrf,
                weights: IntentWeights::default(),
                lexical_candidates: 0,
                vector_candidates: 0,
                degraded: Vec::new(),
                from_cache: false,
            },
        }
    }

    fn key(q: &str) -> CacheKey {
        CacheKey { canonical_query: q.to_string(), top_k: 5, params: "rrf|60".to_string() }
    }

    #[test]
    fn get_returns_what_was_put() {
        let cache = RetrievalCache::new(10, None);
        cache.put(&key("q1"), response("q1"));
        let hit = cache.get(&key("q1")).expect("hit");
        assert_eq!(hit.query.original_query, "q1");
        assert!(cache.get(&key("q2")).is_none());
    }

    #[test]
    fn distinct_params_are_distinct_entries() {
        let cache = RetrievalCache::new(10, None);
        cache.put(&key("q"), response("a"));
        let mut other = key("q");
        other.params = "weighted|60".to_string();
        assert!(cache.get(&other).is_none());
    }

    #[test]
    fn evicts_oldest_inserted_first() {
        let cache = RetrievalCache::new(2, None);
        cache.put(&key("first"), response("first"));
        cache.put(&key("second"), response("second"));
        cache.put(&key("third"), response("third"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("first")).is_none());
        assert!(cache.get(&key("second")).is_some());
        assert!(cache.get(&key("third")).is_some());
    }

    #[test]
    fn overwrite_replaces_wholesale_without_growing() {
        let cache = RetrievalCache::new(2, None);
        cache.put(&key("q"), response("old"));
        cache.put(&key("q"), response("new"));
        assert_eq!(cache.len(), 1);
        let hit = cache.get(&key("q")).expect("hit");
        assert_eq!(hit.query.original_query, "new");
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = RetrievalCache::new(0, None);
        cache.put(&key("q"), response("q"));
        assert!(cache.is_empty());
        assert!(cache.get(&key("q")).is_none());
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = RetrievalCache::new(10, Some(Duration::from_millis(0)));
        cache.put(&key("q"), response("q"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key("q")).is_none());
    }
}

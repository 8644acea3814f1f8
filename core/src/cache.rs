//! `ResponseCache`: a bounded, age-evicted memoization layer for the small
//! fixed set of cacheable HTTP paths (`/health`, `/metrics`).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use http::HeaderMap;

use crate::fingerprint::Fingerprint;

/// A captured response, ready to be replayed byte-for-byte on a cache hit.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub body: Vec<u8>,
    pub headers: HeaderMap,
    pub status: u16,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }

    pub fn age_secs(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.inserted_at).as_secs()
    }
}

/// Fixed per-path TTLs; anything else cacheable defaults to 60s.
pub fn ttl_for_path(path: &str) -> Duration {
    match path {
        "/health" => Duration::from_secs(30),
        "/metrics" => Duration::from_secs(10),
        _ => Duration::from_secs(60),
    }
}

/// Only safe-method GETs on the fixed allow-set are cacheable; POST paths
/// are never cached in this core design.
pub fn is_cacheable(method: &str, path: &str) -> bool {
    method.eq_ignore_ascii_case("GET") && matches!(path, "/health" | "/metrics")
}

/// Bounded fingerprint → `CacheEntry` map with single-pass oldest-out eviction,
/// chosen over LRU because the cacheable path set is tiny and the churn
/// pathological-LRU guards against doesn't arise here.
pub struct ResponseCache {
    max_size: usize,
    entries: DashMap<Fingerprint, CacheEntry>,
}

impl ResponseCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: DashMap::new(),
        }
    }

    /// Returns a live entry iff present and unexpired. Expired entries are removed
    /// on the way out (fire-and-forget).
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let now = Instant::now();
        let hit = self.entries.get(fingerprint).map(|e| e.clone());
        match hit {
            Some(entry) if !entry.is_expired(now) => Some(entry),
            Some(_) => {
                self.entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    /// Evicts the entry with the smallest `inserted_at` before inserting, if the
    /// cache is already at `max_size` (age-based eviction, not LRU).
    pub fn set(&self, fingerprint: Fingerprint, entry: CacheEntry) {
        if self.entries.len() >= self.max_size && !self.entries.contains_key(&fingerprint) {
            self.evict_oldest();
        }
        self.entries.insert(fingerprint, entry);
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.inserted_at)
            .map(|e| *e.key());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    /// Removes all entries whose `now - inserted_at > ttl`.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let stale: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter(|e| e.is_expired(now))
            .map(|e| *e.key())
            .collect();
        let removed = stale.len();
        for key in stale {
            self.entries.remove(&key);
        }
        removed
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

/// A periodic sweeper task for `ResponseCache::sweep_expired`, spawned once at
/// startup.
pub async fn run_sweeper(cache: std::sync::Arc<ResponseCache>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let removed = cache.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, "swept expired cache entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl_secs: u64) -> CacheEntry {
        CacheEntry {
            body: b"hi".to_vec(),
            headers: HeaderMap::new(),
            status: 200,
            inserted_at: Instant::now(),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    #[test]
    fn cacheability_predicate() {
        assert!(is_cacheable("GET", "/health"));
        assert!(is_cacheable("get", "/metrics"));
        assert!(!is_cacheable("POST", "/health"));
        assert!(!is_cacheable("GET", "/v1/command"));
    }

    #[test]
    fn ttl_per_path() {
        assert_eq!(ttl_for_path("/health"), Duration::from_secs(30));
        assert_eq!(ttl_for_path("/metrics"), Duration::from_secs(10));
        assert_eq!(ttl_for_path("/other"), Duration::from_secs(60));
    }

    #[test]
    fn get_set_round_trip() {
        let cache = ResponseCache::new(10);
        let fp = Fingerprint::compute("GET", "/health", "", "t", b"");
        assert!(cache.get(&fp).is_none());
        cache.set(fp, entry(30));
        assert!(cache.get(&fp).is_some());
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn oldest_eviction_under_size_pressure() {
        let cache = ResponseCache::new(2);
        let fp_a = Fingerprint::compute("GET", "/health", "a", "t", b"");
        let fp_b = Fingerprint::compute("GET", "/health", "b", "t", b"");
        let fp_c = Fingerprint::compute("GET", "/health", "c", "t", b"");

        cache.set(fp_a, entry(30));
        std::thread::sleep(Duration::from_millis(5));
        cache.set(fp_b, entry(30));
        assert_eq!(cache.size(), 2);

        cache.set(fp_c, entry(30));
        assert_eq!(cache.size(), 2);
        assert!(cache.get(&fp_a).is_none(), "oldest entry should be evicted");
        assert!(cache.get(&fp_b).is_some());
        assert!(cache.get(&fp_c).is_some());
    }

    #[test]
    fn sweep_removes_only_expired() {
        let cache = ResponseCache::new(10);
        let fp = Fingerprint::compute("GET", "/health", "", "t", b"");
        let mut e = entry(30);
        e.ttl = Duration::from_millis(1);
        cache.set(fp, e);
        std::thread::sleep(Duration::from_millis(10));
        let removed = cache.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(cache.size(), 0);
    }
}

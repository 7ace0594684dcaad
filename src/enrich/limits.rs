//! Politeness controls toward third-party sites: a concurrency cap per host
//! and a short-lived memory of websites that produced no image.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

const PRUNE_THRESHOLD: usize = 1024;

/// Bounds simultaneous fetches per host.
pub struct HostLimiter {
    per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimiter {
    pub fn new(per_host: usize) -> Self {
        Self {
            per_host: per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for a fetch slot toward the host of `url`.
    ///
    /// URLs without a parseable host share a slot pool keyed by the raw string.
    pub async fn acquire(&self, url: &str) -> Option<OwnedSemaphorePermit> {
        let key = host_key(url);
        let semaphore = {
            let mut hosts = lock(&self.hosts);
            if hosts.len() > PRUNE_THRESHOLD {
                let per_host = self.per_host;
                hosts.retain(|_, s| {
                    Arc::strong_count(s) > 1 || s.available_permits() < per_host
                });
            }
            hosts
                .entry(key)
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
                .clone()
        };
        semaphore.acquire_owned().await.ok()
    }
}

pub fn host_key(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_else(|| url.trim().to_lowercase())
}

/// Remembers (website, name) pairs whose website strategy recently failed.
///
/// Only misses are stored; a hit is always re-fetched so edits to the
/// agent's page show up.
pub struct NegativeCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), Instant>>,
}

impl NegativeCache {
    /// A zero TTL disables the cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn contains(&self, website: &str, full_name: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let key = cache_key(website, full_name);
        let mut entries = lock(&self.entries);
        match entries.get(&key) {
            Some(at) if at.elapsed() < self.ttl => true,
            Some(_) => {
                entries.remove(&key);
                false
            }
            None => false,
        }
    }

    pub fn remember(&self, website: &str, full_name: &str) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = lock(&self.entries);
        if entries.len() > PRUNE_THRESHOLD {
            let ttl = self.ttl;
            entries.retain(|_, at| at.elapsed() < ttl);
        }
        entries.insert(cache_key(website, full_name), Instant::now());
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cache_key(website: &str, full_name: &str) -> (String, String) {
    (website.trim().to_string(), full_name.trim().to_lowercase())
}

// A poisoned map only means another enrichment panicked mid-insert; the
// data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key_normalizes_case() {
        assert_eq!(host_key("https://Example.COM/agents"), "example.com");
        assert_eq!(host_key("not a url"), "not a url");
    }

    #[test]
    fn test_negative_cache_expires() {
        let cache = NegativeCache::new(Duration::from_millis(30));
        cache.remember("https://a.example", "Jane Smith");
        assert!(cache.contains("https://a.example", "jane smith"));
        assert!(!cache.contains("https://a.example", "John Doe"));
        std::thread::sleep(Duration::from_millis(60));
        assert!(!cache.contains("https://a.example", "Jane Smith"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = NegativeCache::new(Duration::ZERO);
        cache.remember("https://a.example", "Jane");
        assert!(!cache.contains("https://a.example", "Jane"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_host_limiter_caps_permits() {
        let limiter = HostLimiter::new(1);
        let first = limiter.acquire("https://a.example/x").await;
        assert!(first.is_some());

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            limiter.acquire("https://A.example/y"),
        )
        .await;
        assert!(blocked.is_err(), "second permit for same host should wait");

        let other = tokio::time::timeout(
            Duration::from_millis(50),
            limiter.acquire("https://b.example/"),
        )
        .await;
        assert!(other.is_ok(), "other hosts are independent");

        drop(first);
        let after = tokio::time::timeout(
            Duration::from_millis(50),
            limiter.acquire("https://a.example/z"),
        )
        .await;
        assert!(after.is_ok());
    }
}

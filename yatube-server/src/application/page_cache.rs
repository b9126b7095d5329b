use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedPage {
    body: Bytes,
    expires_at: Instant,
}

/// Whole-response cache for one page, keyed by a fixed prefix and a caller-chosen variant.
///
/// Entries expire after the TTL; writes to the store never invalidate them.
/// Expired entries are purged on every insert and the map never grows past
/// its capacity.
#[derive(Debug)]
pub struct PageCache {
    prefix: &'static str,
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<String, CachedPage>>,
}

impl PageCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(prefix: &'static str, ttl: Duration) -> Self {
        Self::with_capacity(prefix, ttl, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(prefix: &'static str, ttl: Duration, capacity: usize) -> Self {
        Self {
            prefix,
            ttl,
            capacity,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(&self, variant: &str) -> String {
        format!("{}:{}", self.prefix, variant)
    }

    pub async fn get(&self, variant: &str) -> Option<Bytes> {
        let key = self.key(variant);
        let entries = self.entries.read().await;
        match entries.get(&key) {
            Some(page) if page.expires_at > Instant::now() => {
                debug!(key = %key, "page cache hit");
                Some(page.body.clone())
            }
            _ => None,
        }
    }

    /// A zero TTL disables caching.
    pub async fn put(&self, variant: &str, body: Bytes) {
        if self.ttl.is_zero() {
            return;
        }
        let key = self.key(variant);
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, page| page.expires_at > now);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            debug!(key = %key, capacity = self.capacity, "page cache full, not caching");
            return;
        }
        debug!(key = %key, ttl_secs = self.ttl.as_secs(), "page cached");
        entries.insert(
            key,
            CachedPage {
                body,
                expires_at: now + self.ttl,
            },
        );
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

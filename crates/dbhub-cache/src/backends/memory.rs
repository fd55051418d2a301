//! In-process cache backend
//!
//! Each entry carries its own deadline. Expired entries are dropped when
//! read, and the whole map is swept every `SWEEP_EVERY` writes so entries
//! nobody reads again do not pile up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::CacheBackend;
use crate::error::CacheError;

const SWEEP_EVERY: usize = 256;

struct Entry {
    expires_at: Instant,
    value: Vec<u8>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    writes: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Entries physically held, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop every expired entry
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let dropped = before - entries.len();
        if dropped > 0 {
            debug!("Swept {} expired cache entries", dropped);
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Re-check under the write lock; a fresh value may have replaced it
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            expires_at: Instant::now() + ttl,
            value,
        };
        self.entries.write().await.insert(key.to_string(), entry);

        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.sweep().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_removed_on_read() {
        let cache = MemoryCache::new();
        cache
            .set_raw("k", b"v".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(cache.get_raw("k").await.unwrap(), None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unread_entries_are_swept_by_later_writes() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            cache
                .set_raw(&format!("short-{}", i), vec![0; 16], Duration::from_secs(1))
                .await
                .unwrap();
        }

        tokio::time::advance(Duration::from_millis(2100)).await;

        for i in 0..SWEEP_EVERY {
            cache
                .set_raw(&format!("fresh-{}", i), vec![1], Duration::from_secs(60))
                .await
                .unwrap();
        }

        let keys = cache.keys().await;
        assert!(keys.iter().all(|k| k.starts_with("fresh-")), "{} stale keys left", keys.len());
        assert_eq!(keys.len(), SWEEP_EVERY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_refreshes_deadline() {
        let cache = MemoryCache::new();
        cache
            .set_raw("k", b"old".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(900)).await;
        cache
            .set_raw("k", b"new".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;

        assert_eq!(cache.get_raw("k").await.unwrap(), Some(b"new".to_vec()));
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backends::CacheBackend;
use crate::error::CacheError;
use crate::keys::CacheKey;

/// What is physically stored for every entry. The creation time travels
/// with the payload so expiry holds even if the backend keeps the value
/// longer than asked.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    created_at: i64,
    ttl_secs: u64,
    payload: T,
}

#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Look up an entry. Backend failures, undecodable entries and expired
    /// entries are all misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = key.to_string();
        let raw = match self.backend.get_raw(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", key, e);
                return None;
            }
        };

        let envelope: Envelope<T> = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", key, e);
                return None;
            }
        };

        let age = Utc::now().timestamp() - envelope.created_at;
        if age < 0 || age as u64 >= envelope.ttl_secs {
            debug!("Cache entry {} expired ({}s old)", key, age);
            return None;
        }

        debug!("Cache hit for {}", key);
        Some(envelope.payload)
    }

    /// Store an entry. Callers log the error and carry on.
    pub async fn put<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let envelope = Envelope {
            created_at: Utc::now().timestamp(),
            ttl_secs: ttl.as_secs(),
            payload: value,
        };
        let raw = serde_json::to_vec(&envelope)?;
        self.backend.set_raw(&key.to_string(), raw, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryCache;
    use crate::keys::Namespace;
    use async_trait::async_trait;

    fn key() -> CacheKey {
        CacheKey::public(Namespace::TableView)
            .owner("alice")
            .database("test.db")
            .build()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = ResultCache::new(Arc::new(MemoryCache::new()));
        cache
            .put(&key(), &vec!["a".to_string(), "b".to_string()], Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<Vec<String>> = cache.get(&key()).await;
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn test_miss_on_unknown_key() {
        let cache = ResultCache::new(Arc::new(MemoryCache::new()));
        let value: Option<String> = cache.get(&key()).await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_while_still_stored() {
        let backend = Arc::new(MemoryCache::new());
        let cache = ResultCache::new(backend.clone());

        let stale = serde_json::json!({
            "created_at": Utc::now().timestamp() - 121,
            "ttl_secs": 120,
            "payload": "old",
        });
        backend
            .set_raw(
                &key().to_string(),
                serde_json::to_vec(&stale).unwrap(),
                Duration::from_secs(120),
            )
            .await
            .unwrap();

        assert!(backend.get_raw(&key().to_string()).await.unwrap().is_some());
        let value: Option<String> = cache.get(&key()).await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let backend = Arc::new(MemoryCache::new());
        let cache = ResultCache::new(backend.clone());
        backend
            .set_raw(&key().to_string(), b"{not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<String> = cache.get(&key()).await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_wrong_payload_shape_is_a_miss() {
        let cache = ResultCache::new(Arc::new(MemoryCache::new()));
        cache
            .put(&key(), &"a string", Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<Vec<i64>> = cache.get(&key()).await;
        assert!(value.is_none());
    }

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn get_raw(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::ConnectionFailed("down".into()))
        }

        async fn set_raw(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::ConnectionFailed("down".into()))
        }
    }

    #[tokio::test]
    async fn test_backend_failure_is_a_miss_on_read_and_an_error_on_write() {
        let cache = ResultCache::new(Arc::new(FailingBackend));
        let value: Option<String> = cache.get(&key()).await;
        assert!(value.is_none());
        assert!(cache
            .put(&key(), &"x", Duration::from_secs(60))
            .await
            .is_err());
    }
}

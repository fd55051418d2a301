//! Redis cache backend

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error, info};

use super::CacheBackend;
use crate::error::CacheError;

/// Prefix isolating cache entries from other uses of the same Redis
const KEY_PREFIX: &str = "dbhub:cache:";

pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis (e.g. "redis://localhost:6379")
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            CacheError::ConnectionFailed(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            CacheError::ConnectionFailed(format!("Failed to connect to Redis: {}", e))
        })?;

        // Same liveness probe the server has always done on startup
        let mut conn = connection.clone();
        let _: () = conn.set_ex(format!("{}connecttest", KEY_PREFIX), "1", 10).await?;

        info!("Connected to Redis cache");
        Ok(Self { connection })
    }

    fn namespaced_key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection.clone();
        let namespaced = Self::namespaced_key(key);
        debug!("CACHE GET {}", namespaced);

        let value: Option<Vec<u8>> = conn.get(&namespaced).await?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let namespaced = Self::namespaced_key(key);
        // Redis rejects EX 0
        let seconds = ttl.as_secs().max(1);
        debug!("CACHE SET {} ({} bytes, EX {})", namespaced, value.len(), seconds);

        let _: () = conn.set_ex(&namespaced, value, seconds).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(
            RedisCache::namespaced_key("tbl-pub-abc"),
            "dbhub:cache:tbl-pub-abc"
        );
    }
}

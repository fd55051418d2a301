use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

mod memory;
mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

/// Raw key-value storage underneath [`crate::ResultCache`]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value. `ttl` is a hint for physical eviction; expiry is
    /// enforced on read regardless of whether the backend honours it.
    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

//! dbhub-cache: result cache for resolved locations and rendered responses
//!
//! Caching is an optimization only: lookups that fail or hit a corrupt or
//! expired entry are misses, and failed writes are reported to the caller
//! for logging but never abort a request.
//!
//! Cache keys encode viewer identity and visibility and are therefore part
//! of the access-control boundary; see [`keys`].

pub mod backends;
pub mod error;
pub mod keys;
mod result_cache;

pub use backends::{CacheBackend, MemoryCache, RedisCache};
pub use error::CacheError;
pub use keys::{Audience, CacheKey, CacheKeyBuilder, Namespace};
pub use result_cache::ResultCache;

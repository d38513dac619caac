//! Response cache: content-addressed keys over a pluggable TTL store.
//!
//! Two interchangeable backends implement [`CacheStore`]:
//! - [`InMemoryCache`] for development and single-instance deployments.
//! - [`RedisCache`] for deployments where several processes share one cache.
//!
//! Which one runs is decided once at startup from `USE_REDIS`; callers only ever see
//! `Arc<dyn CacheStore>`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::Config;

pub mod key;
pub mod memory;
pub mod redis_store;

pub use key::{derive_cache_key, CacheKey};
pub use memory::InMemoryCache;
pub use redis_store::RedisCache;

/// TTL applied when a caller does not supply one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value store with per-entry TTL.
///
/// `get` and `set` never fail: a backend outage degrades to "always miss" and is reported
/// through a warning log. `clear` is administrative and reports outages to its caller.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored value, or `None` if absent or expired.
    async fn get(&self, key: &CacheKey) -> Option<Value>;

    /// Stores `value`, replacing any existing entry and resetting its TTL.
    /// `None` uses the store's default TTL.
    async fn set(&self, key: &CacheKey, value: &Value, ttl: Option<Duration>);

    /// Drops every entry in the namespace the store occupies. Irreversible.
    async fn clear(&self) -> Result<(), CacheError>;

    /// Short backend label for logs and the health endpoint.
    fn name(&self) -> &'static str;
}

/// Builds the cache backend selected by configuration.
pub fn build_cache_store(config: &Config) -> anyhow::Result<Arc<dyn CacheStore>> {
    let ttl = Duration::from_secs(config.cache_ttl_secs);

    if config.use_redis {
        let store = RedisCache::new(&config.redis_url, ttl)?;
        info!("Cache backend: redis (default ttl={}s)", ttl.as_secs());
        Ok(Arc::new(store))
    } else {
        info!("Cache backend: in-memory (default ttl={}s)", ttl.as_secs());
        Ok(Arc::new(InMemoryCache::with_default_ttl(ttl)))
    }
}

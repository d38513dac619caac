use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{CacheError, CacheKey, CacheStore, DEFAULT_TTL};

/// Longer TTLs are stored without expiry so the deadline never overflows the clock.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    /// `None` never expires.
    ttl: Option<Duration>,
}

/// Expiry counted from the latest `set`; reads do not extend it.
struct SetTimeTtl;

impl Expiry<String, CacheEntry> for SetTimeTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// Process-local store. Lost on restart; not shared between instances.
pub struct InMemoryCache {
    entries: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        info!("InMemoryCache initialized (single-process mode)");
        Self {
            entries: Cache::builder().expire_after(SetTimeTtl).build(),
            default_ttl,
        }
    }

    /// Number of live entries.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count() as usize
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn bounded(ttl: Duration) -> Option<Duration> {
    (ttl <= MAX_TTL).then_some(ttl)
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Value> {
        match self.entries.get(key.as_str()).await {
            Some(entry) => {
                debug!(cache_key = %key, "[CACHE HIT] memory");
                Some(entry.value)
            }
            None => {
                debug!(cache_key = %key, "[CACHE MISS] memory");
                None
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.entries
            .insert(
                key.as_str().to_string(),
                CacheEntry {
                    value: value.clone(),
                    ttl: bounded(ttl),
                },
            )
            .await;
        debug!(cache_key = %key, ttl_secs = ttl.as_secs(), "[CACHE SET] memory");
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.invalidate_all();
        info!("[CACHE CLEAR] memory");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::CacheKey;

type Slot = Arc<AsyncMutex<()>>;

/// Per-key in-flight guard: at most one task per cache key runs the backend at a time.
///
/// Later arrivals wait on the same slot and, once they get it, find the cache already
/// filled by the first task. Slots are removed when their last holder lets go.
#[derive(Default)]
pub struct InFlight {
    slots: Mutex<HashMap<String, Slot>>,
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: String,
    slot: Slot,
    _permit: OwnedMutexGuard<()>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn acquire(&self, key: &CacheKey) -> InFlightGuard<'_> {
        let slot = {
            let mut slots = self.lock_slots();
            // Slots only the map still references belong to cancelled waiters.
            slots.retain(|_, s| Arc::strong_count(s) > 1);
            slots.entry(key.as_str().to_string()).or_default().clone()
        };
        let permit = slot.clone().lock_owned().await;
        InFlightGuard {
            owner: self,
            key: key.as_str().to_string(),
            slot,
            _permit: permit,
        }
    }

    /// Keys currently held or awaited.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.owner.lock_slots();
        // Map + this guard + the permit: nobody else is waiting.
        if Arc::strong_count(&self.slot) <= 3 {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::derive_cache_key;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_is_removed_after_release() {
        let inflight = InFlight::new();
        let key = derive_cache_key("resume A");
        {
            let _guard = inflight.acquire(&key).await;
            assert_eq!(inflight.len(), 1);
        }
        assert_eq!(inflight.len(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block_each_other() {
        let inflight = InFlight::new();
        let _a = inflight.acquire(&derive_cache_key("resume A")).await;
        let _b = inflight.acquire(&derive_cache_key("resume B")).await;
        assert_eq!(inflight.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_holders_are_serialized() {
        let inflight = Arc::new(InFlight::new());
        let active = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let (inflight, active, max_seen) = (inflight.clone(), active.clone(), max_seen.clone());
            handles.push(tokio::spawn(async move {
                let _guard = inflight.acquire(&derive_cache_key("resume A")).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(inflight.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_leaves_no_slot_behind() {
        let inflight = InFlight::new();
        let key = derive_cache_key("resume A");
        let guard = inflight.acquire(&key).await;

        let waited = tokio::time::timeout(Duration::from_millis(5), inflight.acquire(&key)).await;
        assert!(waited.is_err());

        drop(guard);
        assert_eq!(inflight.len(), 0);
    }
}

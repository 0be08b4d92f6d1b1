use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cache::MemoryCache;

/// Signal raised when the host is running low on memory.
///
/// Subscribed memory caches are cleared on every `notify`. Clones share the
/// same subscriber list.
#[derive(Clone, Default)]
pub struct MemoryPressure {
    inner: Arc<Subscribers>,
}

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    caches: Mutex<HashMap<u64, Weak<MemoryCache>>>,
}

/// Keeps a cache subscribed; dropping it unsubscribes.
pub struct PressureSubscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl MemoryPressure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, cache: &Arc<MemoryCache>) -> PressureSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.caches.lock().insert(id, Arc::downgrade(cache));
        log::debug!("Memory pressure subscriber {} registered", id);

        PressureSubscription {
            id,
            subscribers: Arc::downgrade(&self.inner),
        }
    }

    /// Clear every live subscribed cache, returning how many were cleared.
    pub fn notify(&self) -> usize {
        let caches: Vec<Arc<MemoryCache>> = {
            let mut caches = self.inner.caches.lock();
            caches.retain(|_, cache| cache.strong_count() > 0);
            caches.values().filter_map(Weak::upgrade).collect()
        };

        log::warn!("Memory pressure signalled, clearing {} caches", caches.len());
        for cache in &caches {
            cache.clear();
        }
        caches.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.caches.lock().len()
    }
}

impl Drop for PressureSubscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.caches.lock().remove(&self.id);
            log::debug!("Memory pressure subscriber {} removed", self.id);
        }
    }
}

impl std::fmt::Debug for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPressure")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl std::fmt::Debug for PressureSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PressureSubscription").field("id", &self.id).finish()
    }
}

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::cache::CacheKey;
use crate::images::FetchedImage;

// Decoded images kept in memory, least recently used evicted first
pub struct MemoryCache {
    images: Mutex<LruCache<CacheKey, FetchedImage>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            images: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<FetchedImage> {
        self.images.lock().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, image: FetchedImage) {
        if let Some((evicted, _)) = self.images.lock().push(key, image) {
            log::trace!("Dropped {} from memory cache", evicted);
        }
    }

    pub fn clear(&self) {
        let mut images = self.images.lock();
        let dropped = images.len();
        images.clear();
        log::info!("Memory cache cleared ({} images dropped)", dropped);
    }

    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.images.lock().cap().get()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

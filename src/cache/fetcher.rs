use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::cache::{CacheKey, DiskStore, MemoryCache, MemoryPressure, PressureSubscription};
use crate::images::{self, FetchError, FetchResult, FetchedImage, Transport, TransportError};

/// Completion callback for a single `fetch` call.
pub type Waiter = Box<dyn FnOnce(FetchResult) + Send + 'static>;

// Callers waiting on the one network operation running for a key
struct PendingRequest {
    url: String,
    waiters: Vec<Waiter>,
    // set if any waiter asked for the result to be cached
    save_to_cache: bool,
}

impl PendingRequest {
    fn new(url: String, leader: Waiter, save_to_cache: bool) -> Self {
        Self {
            url,
            waiters: vec![leader],
            save_to_cache,
        }
    }
}

// Held by the leader between admission and delivery. If the leader unwinds
// before delivering, the pending request is removed and its waiters failed.
struct LeaderGuard<'a> {
    fetcher: &'a ImageFetcher,
    key: Option<CacheKey>,
}

impl LeaderGuard<'_> {
    // Remove the pending request, caching a successful outcome while the
    // pending lock is still held.
    fn finish(mut self, outcome: &FetchResult) -> Option<PendingRequest> {
        let key = self.key.take()?;
        let mut pending = self.fetcher.pending.lock();
        let request = pending.remove(&key)?;

        if let Ok(image) = outcome {
            if request.save_to_cache {
                self.fetcher.memory.put(key.clone(), image.clone());
                drop(pending);
                self.fetcher.disk.write(key, image.shared_data());
            }
        }

        Some(request)
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        let request = self.fetcher.pending.lock().remove(&key);
        if let Some(request) = request {
            log::error!(
                "Fetch for {} abandoned, failing {} waiters",
                request.url,
                request.waiters.len()
            );
            let error = FetchError::Transport(TransportError::Other(
                "fetch abandoned before completing".to_string(),
            ));
            for waiter in request.waiters {
                waiter(Err(error.clone()));
            }
        }
    }
}

enum Admission {
    Leader,
    Joined,
    Cached(FetchedImage, Waiter),
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    network_fetches: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub network_fetches: u64,
    pub coalesced: u64,
    pub failures: u64,
    pub in_flight: usize,
    pub memory_entries: usize,
}

/// Three-tier image lookup (memory, disk, network) with per-key request
/// coalescing.
///
/// At most one network operation runs per key; every caller that arrives
/// while it is running is queued and receives the same outcome, in the order
/// it registered.
pub struct ImageFetcher {
    memory: Arc<MemoryCache>,
    disk: DiskStore,
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<CacheKey, PendingRequest>>,
    counters: Counters,
    purge_corrupt_entries: bool,
    _pressure: PressureSubscription,
}

impl ImageFetcher {
    pub fn new(
        memory: Arc<MemoryCache>,
        disk: DiskStore,
        transport: Arc<dyn Transport>,
        pressure: &MemoryPressure,
    ) -> Arc<Self> {
        Self::with_purge(memory, disk, transport, pressure, true)
    }

    /// Like [`ImageFetcher::new`], choosing whether undecodable disk entries
    /// are deleted when found.
    pub fn with_purge(
        memory: Arc<MemoryCache>,
        disk: DiskStore,
        transport: Arc<dyn Transport>,
        pressure: &MemoryPressure,
        purge_corrupt_entries: bool,
    ) -> Arc<Self> {
        let subscription = pressure.subscribe(&memory);
        Arc::new(Self {
            memory,
            disk,
            transport,
            pending: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            purge_corrupt_entries,
            _pressure: subscription,
        })
    }

    /// Fetch the image for `url`, delivering the outcome to `completion`.
    ///
    /// A memory hit completes inline. Everything else runs on the tokio
    /// runtime, so this must be called from within one.
    pub fn fetch<F>(self: &Arc<Self>, url: &str, save_to_cache: bool, completion: F)
    where
        F: FnOnce(FetchResult) + Send + 'static,
    {
        let key = CacheKey::from_url(url);

        if let Some(image) = self.memory.get(&key) {
            log::debug!("Using cached image for {}", key);
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            completion(Ok(image));
            return;
        }

        let this = Arc::clone(self);
        let url = url.to_string();
        tokio::spawn(async move {
            this.resolve(url, key, save_to_cache, Box::new(completion)).await;
        });
    }

    /// Future-returning form of [`ImageFetcher::fetch`].
    pub async fn fetch_image(self: &Arc<Self>, url: &str, save_to_cache: bool) -> FetchResult {
        let (tx, rx) = oneshot::channel();
        self.fetch(url, save_to_cache, move |result| {
            let _ = tx.send(result);
        });

        rx.await.unwrap_or_else(|_| {
            Err(FetchError::Transport(TransportError::Other(
                "fetch task dropped before completing".to_string(),
            )))
        })
    }

    pub fn clear_memory_cache(&self) {
        self.memory.clear();
    }

    pub fn clear_disk_cache(&self) -> usize {
        match self.disk.clear() {
            Ok(removed) => removed,
            Err(e) => {
                log::warn!("Could not clear disk cache: {}", e);
                0
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.counters.disk_hits.load(Ordering::Relaxed),
            network_fetches: self.counters.network_fetches.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            memory_entries: self.memory.len(),
        }
    }

    async fn resolve(self: Arc<Self>, url: String, key: CacheKey, save_to_cache: bool, completion: Waiter) {
        if let Some(image) = self.load_from_disk(&key).await {
            log::debug!("Using cached image on disk for {}", key);
            self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
            self.memory.put(key, image.clone());
            completion(Ok(image));
            return;
        }

        match self.admit(&key, &url, save_to_cache, completion) {
            Admission::Joined => return,
            Admission::Cached(image, completion) => {
                self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
                completion(Ok(image));
                return;
            }
            Admission::Leader => {}
        }

        let guard = LeaderGuard {
            fetcher: self.as_ref(),
            key: Some(key),
        };

        let outcome = self.download(&url).await;

        match &outcome {
            Ok(_) => log::info!("Image downloaded with url: {}", url),
            Err(e) => {
                log::warn!("Image download failed for {}: {}", url, e);
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(request) = guard.finish(&outcome) {
            log::debug!(
                "Delivering {} result to {} waiters",
                request.url,
                request.waiters.len()
            );
            for waiter in request.waiters {
                waiter(outcome.clone());
            }
        }
    }

    // Register interest in `key`. Memory is checked again under the lock so a
    // caller arriving just after a leader finished does not refetch.
    fn admit(&self, key: &CacheKey, url: &str, save_to_cache: bool, completion: Waiter) -> Admission {
        let mut pending = self.pending.lock();

        if let Some(request) = pending.get_mut(key) {
            request.waiters.push(completion);
            request.save_to_cache |= save_to_cache;
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            log::debug!("Joined in-flight request for {} ({} waiting)", key, request.waiters.len());
            return Admission::Joined;
        }

        if let Some(image) = self.memory.get(key) {
            return Admission::Cached(image, completion);
        }

        pending.insert(
            key.clone(),
            PendingRequest::new(url.to_string(), completion, save_to_cache),
        );
        Admission::Leader
    }

    async fn load_from_disk(&self, key: &CacheKey) -> Option<FetchedImage> {
        if !self.disk.is_enabled() {
            return None;
        }

        let disk = self.disk.clone();
        let key = key.clone();
        let purge = self.purge_corrupt_entries;

        let loaded = tokio::task::spawn_blocking(move || {
            let data = disk.read(&key)?;
            match images::tools::decode(data) {
                Ok(image) => Some(image),
                Err(e) => {
                    log::warn!("Cached image for {} is corrupt: {}", key, e);
                    if purge {
                        if let Err(e) = disk.remove(&key) {
                            log::warn!("Could not delete corrupt cache entry {}: {}", key, e);
                        }
                    }
                    None
                }
            }
        })
        .await;

        match loaded {
            Ok(image) => image,
            Err(e) => {
                log::error!("Disk lookup task failed: {}", e);
                None
            }
        }
    }

    async fn download(&self, url: &str) -> FetchResult {
        self.counters.network_fetches.fetch_add(1, Ordering::Relaxed);

        let transport = Arc::clone(&self.transport);
        let target = url.to_string();
        let response = match tokio::spawn(async move { transport.get(&target).await }).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Image transfer task failed: {}", e);
                return Err(FetchError::Transport(TransportError::Other(e.to_string())));
            }
        };

        // Decoding is CPU bound, keep it off the async workers
        match tokio::task::spawn_blocking(move || images::classify(response)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Image decode task failed: {}", e);
                Err(FetchError::Decode(e.to_string()))
            }
        }
    }
}

impl fmt::Debug for ImageFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFetcher")
            .field("memory", &self.memory)
            .field("disk", &self.disk)
            .field("in_flight", &self.in_flight())
            .field("purge_corrupt_entries", &self.purge_corrupt_entries)
            .finish()
    }
}

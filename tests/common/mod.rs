#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imgcache::cache::{DiskStore, ImageFetcher, MemoryCache, MemoryPressure};
use imgcache::images::{RawResponse, Transport};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 30) as u8, (y * 30) as u8, 200])
    }));
    let mut output = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .unwrap();
    output
}

/// Transport that serves canned responses, counts calls and can hold every
/// response until released.
#[derive(Default)]
pub struct FakeTransport {
    calls: AtomicUsize,
    responses: Mutex<HashMap<String, RawResponse>>,
    gate: Option<Arc<Notify>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn respond(self, url: &str, response: RawResponse) -> Self {
        self.responses.lock().insert(url.to_string(), response);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RawResponse> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.responses.lock().get(url).cloned().unwrap_or_default()
        }
        .boxed()
    }
}

pub struct Harness {
    pub fetcher: Arc<ImageFetcher>,
    pub transport: Arc<FakeTransport>,
    pub memory: Arc<MemoryCache>,
    pub disk: DiskStore,
    pub pressure: MemoryPressure,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(transport: FakeTransport) -> Self {
        Self::with_purge(transport, true)
    }

    pub fn with_purge(transport: FakeTransport, purge: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let disk = DiskStore::new(dir.path().join("images"));
        let memory = Arc::new(MemoryCache::new(32));
        let transport = Arc::new(transport);
        let pressure = MemoryPressure::new();
        let fetcher = ImageFetcher::with_purge(
            Arc::clone(&memory),
            disk.clone(),
            transport.clone(),
            &pressure,
            purge,
        );

        Self {
            fetcher,
            transport,
            memory,
            disk,
            pressure,
            dir,
        }
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

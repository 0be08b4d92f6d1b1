pub mod disk;
pub mod fetcher;
pub mod key;
pub mod memory;
pub mod pressure;

pub use disk::{DiskError, DiskStore};
pub use fetcher::{FetchStats, ImageFetcher, Waiter};
pub use key::CacheKey;
pub use memory::MemoryCache;
pub use pressure::{MemoryPressure, PressureSubscription};

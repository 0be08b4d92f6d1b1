use std::path::PathBuf;

use rocket::figment::{providers::Serialized, Figment};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub address: String,
    pub timeout: u64,
    pub user_agent: String,
    pub cache_dir: Option<String>,
    #[serde(default = "default_memory_cache_capacity")]
    pub memory_cache_capacity: usize,
    #[serde(default = "default_purge_corrupt_entries")]
    pub purge_corrupt_entries: bool,
}

fn default_memory_cache_capacity() -> usize {
    256
}

fn default_purge_corrupt_entries() -> bool {
    true
}

impl AppConfig {
    /// Apply environment overrides so they win over every profile, including
    /// a selected non-default one.
    pub fn with_overrides(
        mut figment: Figment,
        cache_dir: Option<String>,
        memory_cache_capacity: Option<usize>,
    ) -> Figment {
        if let Some(dir) = cache_dir {
            figment = figment.merge(Serialized::global("cache_dir", dir));
        }
        if let Some(capacity) = memory_cache_capacity {
            figment = figment.merge(Serialized::global("memory_cache_capacity", capacity));
        }
        figment
    }

    /// Directory holding the disk tier, under the system temp dir unless configured.
    pub fn cache_root(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::temp_dir().join("imgcache").join("images"),
        }
    }
}

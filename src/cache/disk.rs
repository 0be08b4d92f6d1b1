use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::cache::CacheKey;

#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Disk cache is disabled")]
    Disabled,

    #[error("Disk cache I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Flat directory of raw encoded images, one file per cache key.
///
/// Files are written to a temporary sibling and renamed into place, so a
/// reader either sees a complete file or nothing.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: Option<PathBuf>,
}

impl DiskStore {
    /// Open the store at `root`, creating the directory if needed.
    ///
    /// If the directory cannot be created the store runs disabled and every
    /// lookup is a miss.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        match fs::create_dir_all(&root) {
            Ok(()) => {
                log::info!("Disk image cache at {}", root.display());
                Self { root: Some(root) }
            }
            Err(e) => {
                log::warn!(
                    "Failed to create image cache directory {}: {}. Continuing with memory-only caching",
                    root.display(),
                    e
                );
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { root: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn path_for(&self, key: &CacheKey) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(key.as_str()))
    }

    pub fn read(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => {
                log::debug!("Read {} bytes from disk for {}", data.len(), key);
                Some(data)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Failed to read cached image {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write `data` for `key`, replacing any previous entry atomically.
    pub fn store(&self, key: &CacheKey, data: &[u8]) -> Result<PathBuf, DiskError> {
        let root = self.root.as_ref().ok_or(DiskError::Disabled)?;
        let path = root.join(key.as_str());

        let mut temp = NamedTempFile::new_in(root)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| DiskError::Io(e.error))?;

        Ok(path)
    }

    /// Fire-and-forget write on the blocking pool. Failures are only logged.
    pub fn write(&self, key: CacheKey, data: Arc<[u8]>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || match store.store(&key, &data) {
            Ok(path) => log::debug!("Image saved on disk at {}", path.display()),
            Err(DiskError::Disabled) => {}
            Err(e) => log::warn!("Image for {} cannot be saved on disk: {}", key, e),
        })
    }

    pub fn remove(&self, key: &CacheKey) -> Result<bool, DiskError> {
        let path = self.path_for(key).ok_or(DiskError::Disabled)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every cached file, returning how many were removed.
    pub fn clear(&self) -> Result<usize, DiskError> {
        let root = self.root.as_ref().ok_or(DiskError::Disabled)?;
        let mut removed = 0;

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        log::info!("Deleted {} images from disk cache {}", removed, root.display());
        Ok(removed)
    }
}

use crate::error::LoadError;
use crate::load::load_cache;
use crate::structs::Cache;
use log::{error, info};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Shared reference to the current cache generation.
///
/// Readers clone the `Arc` and keep working on that generation for as long as they need it.
/// A refresh builds the next generation without touching the published one and swaps the
/// pointer under a write lock held only for the store.
#[derive(Debug, Default)]
pub struct CacheHandle {
    current: RwLock<Option<Arc<Cache>>>,
    loading: Mutex<()>,
    /// Set while a background refresh is queued or running
    background: AtomicBool,
}

impl CacheHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: Cache) -> Self {
        let handle = Self::new();
        handle.publish(cache);
        handle
    }

    /// Currently published generation, `None` until the first successful load.
    pub fn current(&self) -> Option<Arc<Cache>> {
        self.current.read().clone()
    }

    pub fn publish(&self, cache: Cache) -> Arc<Cache> {
        let cache = Arc::new(cache);
        *self.current.write() = Some(cache.clone());
        cache
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_locked() || self.background.load(Ordering::Acquire)
    }

    /// Runs [`refresh`](Self::refresh) on a new thread. Returns `None` without starting
    /// anything while an earlier background refresh has not finished.
    pub fn spawn_refresh(self: &Arc<Self>, path: impl Into<PathBuf>) -> Option<JoinHandle<()>> {
        if self.background.swap(true, Ordering::AcqRel) {
            return None;
        }
        let handle = self.clone();
        let path = path.into();
        Some(thread::spawn(move || {
            handle.refresh(&path).ok();
            handle.background.store(false, Ordering::Release);
        }))
    }

    /// Loads `path` and publishes it. At most one refresh runs at a time; on failure the
    /// previous generation stays published.
    pub fn refresh(&self, path: impl AsRef<Path>) -> Result<Arc<Cache>, LoadError> {
        let path = path.as_ref();
        let _loading = self.loading.lock();
        match load_cache(path) {
            Ok(cache) => {
                let cache = self.publish(cache);
                info!("Published cache exported at {}", cache.dbchange.exported);
                Ok(cache)
            }
            Err(e) => {
                error!("Cache refresh from {:?} failed: {}", path, e);
                Err(e)
            }
        }
    }
}

//! In-process cache of generated modules, keyed by template path.
//!
//! Entries live for the lifetime of the process. Freshness is decided by
//! comparing the file's modification time with the time the entry was
//! produced; there is no eviction by count or size.

mod entry;

pub use entry::{CacheEntry, Freshness};

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::debug;

use crate::fs::FileSystem;

/// Counters for cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// Freshness-validated cache shared by all transform invocations.
///
/// The lock only guards map access; it is never held across file I/O or
/// compilation.
#[derive(Debug, Default)]
pub struct FreshnessCache {
    entries: Mutex<FxHashMap<PathBuf, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl FreshnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, FxHashMap<PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lookup(&self, path: &Path) -> Option<CacheEntry> {
        self.entries().get(path).cloned()
    }

    pub fn validate<E>(&self, entry: &CacheEntry, current_mod_time: Result<SystemTime, E>) -> Freshness {
        entry.validate(current_mod_time)
    }

    pub fn store(&self, path: impl Into<PathBuf>, contents: impl Into<String>, timestamp: SystemTime) {
        self.entries()
            .insert(path.into(), CacheEntry::new(contents, timestamp));
    }

    /// Removes the entry for `path`, returning whether one existed.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries().remove(path).is_some()
    }

    /// Returns the cached module for `path` if it is still fresh.
    ///
    /// A stale entry is removed before returning, so the caller's
    /// recompilation starts from an empty slot.
    pub fn get_fresh(&self, path: &Path, fs: &dyn FileSystem) -> Option<String> {
        let Some(entry) = self.lookup(path) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss for {}", path.display());
            return None;
        };

        match self.validate(&entry, fs.modified(path)) {
            Freshness::Valid => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", path.display());
                Some(entry.contents)
            }
            Freshness::Stale => {
                self.invalidate(path);
                self.invalidations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache entry for {} is stale, recompiling", path.display());
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

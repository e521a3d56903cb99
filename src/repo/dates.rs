//! repo::dates
//!
//! Keyed store of commit dates per (version, path).
//!
//! Entries are invalidated when the path is mutated in that version
//! ([`DateCache::evict`]), when the version is evicted
//! ([`DateCache::evict_version`]), or wholesale after a trunk refresh
//! ([`DateCache::clear`]). Concurrent first population is last-write-wins.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::core::types::{FileDates, VersionId};

type Key = (VersionId, String);

/// Cache of derived file dates.
#[derive(Debug, Default)]
pub struct DateCache {
    entries: RwLock<HashMap<Key, FileDates>>,
}

impl DateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &VersionId, path: &str) -> Option<FileDates> {
        self.read().get(&(id.clone(), path.to_string())).copied()
    }

    pub fn put(&self, id: &VersionId, path: &str, dates: FileDates) {
        self.write().insert((id.clone(), path.to_string()), dates);
    }

    /// Return the cached dates or compute and store them.
    pub fn get_or_try_insert<E>(
        &self,
        id: &VersionId,
        path: &str,
        compute: impl FnOnce() -> Result<FileDates, E>,
    ) -> Result<FileDates, E> {
        if let Some(dates) = self.get(id, path) {
            return Ok(dates);
        }
        let dates = compute()?;
        self.put(id, path, dates);
        Ok(dates)
    }

    /// Invalidate one path of one version.
    pub fn evict(&self, id: &VersionId, path: &str) {
        if self.write().remove(&(id.clone(), path.to_string())).is_some() {
            debug!(version = %id, path, "date cache entry evicted");
        }
    }

    /// Invalidate every path of one version.
    pub fn evict_version(&self, id: &VersionId) {
        self.write().retain(|(version, _), _| version != id);
    }

    /// Invalidate everything.
    pub fn clear(&self) {
        let mut entries = self.write();
        debug!(entries = entries.len(), "date cache cleared");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Key, FileDates>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Key, FileDates>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

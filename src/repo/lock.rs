//! repo::lock
//!
//! Per-version mutual exclusion.
//!
//! # Architecture
//!
//! The registry is a keyed arena of reference-counted async mutexes, one per
//! [`VersionId`], created lazily on first touch. Operations on the same
//! version are serialized; operations on distinct versions never contend.
//!
//! # Invariants
//!
//! - At most one [`VersionGuard`] per version exists at any time
//! - The guard is released on drop (RAII pattern)
//! - Locks are not re-entrant: acquire once per public operation
//! - An entry is only removed by [`LockRegistry::sweep`] while nobody holds
//!   or waits for it
//!
//! # Example
//!
//! ```
//! use regstore::core::types::VersionId;
//! use regstore::repo::LockRegistry;
//!
//! # tokio_test::block_on(async {
//! let locks = LockRegistry::new();
//! let id = VersionId::new("42").unwrap();
//!
//! let guard = locks.acquire(&id).await;
//! // ... work on the clone of version 42 ...
//! drop(guard);
//!
//! assert!(locks.sweep(&id));
//! assert!(locks.is_empty());
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::core::types::VersionId;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Registry of per-version locks.
#[derive(Debug, Default)]
pub struct LockRegistry {
    entries: Mutex<HashMap<VersionId, Slot>>,
}

/// Exclusive access to one version. Released on drop.
#[derive(Debug)]
pub struct VersionGuard {
    id: VersionId,
    _guard: OwnedMutexGuard<()>,
}

impl VersionGuard {
    /// The locked version.
    pub fn id(&self) -> &VersionId {
        &self.id
    }
}

impl Drop for VersionGuard {
    fn drop(&mut self) {
        debug!(version = %self.id, "version lock released");
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: &VersionId) -> VersionGuard {
        let slot = {
            let mut entries = self.entries();
            entries.entry(id.clone()).or_default().clone()
        };

        let guard = slot.lock_owned().await;
        debug!(version = %id, "version lock acquired");

        VersionGuard {
            id: id.clone(),
            _guard: guard,
        }
    }

    /// Remove the entry for `id` if it is idle.
    ///
    /// Returns `true` if no entry remains for `id`. A held or awaited lock
    /// keeps its entry.
    pub fn sweep(&self, id: &VersionId) -> bool {
        let mut entries = self.entries();
        match entries.get(id) {
            Some(slot) if Arc::strong_count(slot) == 1 => {
                entries.remove(id);
                debug!(version = %id, "version lock swept");
                true
            }
            Some(_) => false,
            None => true,
        }
    }

    /// Number of registered versions.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<VersionId, Slot>> {
        // The map stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

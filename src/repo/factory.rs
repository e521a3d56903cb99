//! repo::factory
//!
//! Cache of facades by version id.
//!
//! # Invariants
//!
//! - At most one [`VersionedRepository`] is constructed per id, and its
//!   first `update_repository` runs once, even under concurrent first access
//! - A failed first update leaves no facade behind; a `NotFound` failure
//!   also drops the slot so unknown ids do not accumulate
//! - A cached facade whose clone has disappeared is updated again, which
//!   produces a fresh clone
//!
//! # Example
//!
//! ```ignore
//! use regstore::repo::RepositoryFactory;
//!
//! let factory = RepositoryFactory::new(settings, review);
//! let repo = factory.get_repo_by_version(&"1042".parse()?).await?;
//! let forms = repo.file_list("forms").await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::versioned::{RepoContext, VersionedRepository};
use super::{RepoError, RepoSettings};
use crate::core::types::VersionId;
use crate::review::ReviewAdapter;

type Slot = Arc<OnceCell<Arc<VersionedRepository>>>;

/// Atomic get-or-create cache of facades.
#[derive(Debug)]
pub struct RepositoryFactory {
    ctx: Arc<RepoContext>,
    repos: Mutex<HashMap<VersionId, Slot>>,
}

impl RepositoryFactory {
    pub fn new(settings: RepoSettings, review: Arc<dyn ReviewAdapter>) -> Self {
        Self {
            ctx: Arc::new(RepoContext::new(settings, review)),
            repos: Mutex::new(HashMap::new()),
        }
    }

    /// Shared state of every facade.
    pub fn context(&self) -> &Arc<RepoContext> {
        &self.ctx
    }

    /// Id of the trunk version.
    pub fn head_id(&self) -> VersionId {
        self.ctx.settings().head_id()
    }

    /// Return the facade for `id`, constructing and updating it on first use.
    ///
    /// # Errors
    ///
    /// Whatever the first `update_repository` reports; `NotFound` for a
    /// candidate id without a change.
    pub async fn get_repo_by_version(
        &self,
        id: &VersionId,
    ) -> Result<Arc<VersionedRepository>, RepoError> {
        let slot = Arc::clone(self.repos().entry(id.clone()).or_default());

        let constructed = AtomicBool::new(false);
        let flag = &constructed;
        let result = slot
            .get_or_try_init(|| async move {
                flag.store(true, Ordering::SeqCst);
                let repo = Arc::new(VersionedRepository::new(id.clone(), Arc::clone(&self.ctx)));
                repo.update_repository().await?;
                info!(version = %id, kind = %repo.kind(), "repository ready");
                Ok::<_, RepoError>(repo)
            })
            .await;

        let repo = match result {
            Ok(repo) => Arc::clone(repo),
            Err(err) => {
                if matches!(err, RepoError::NotFound(_)) {
                    self.forget_slot(id, &slot);
                }
                return Err(err);
            }
        };

        if !constructed.load(Ordering::SeqCst) && !repo.local_path().exists() {
            debug!(version = %id, "clone missing, updating again");
            repo.update_repository().await?;
        }

        Ok(repo)
    }

    /// Point-in-time snapshot of versions with a ready facade, sorted.
    pub fn get_available_repos(&self) -> Vec<VersionId> {
        let mut ids: Vec<VersionId> = self
            .repos()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Forget the facade of `id`. Returns whether one was cached.
    pub fn evict(&self, id: &VersionId) -> bool {
        self.repos().remove(id).is_some()
    }

    /// Reset the trunk clone to the remote and drop every cached date.
    pub async fn refresh_head(&self) -> Result<(), RepoError> {
        let head = self.get_repo_by_version(&self.head_id()).await?;
        head.pull_repository().await?;
        self.ctx.dates().clear();
        info!("trunk refreshed");
        Ok(())
    }

    fn forget_slot(&self, id: &VersionId, slot: &Slot) {
        let mut repos = self.repos();
        if repos.get(id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            repos.remove(id);
        }
    }

    fn repos(&self) -> MutexGuard<'_, HashMap<VersionId, Slot>> {
        self.repos.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

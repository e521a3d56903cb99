//! repo::versioned
//!
//! The per-version facade.
//!
//! # Variants
//!
//! One [`VersionedRepository`] type serves both variants, selected once at
//! construction by [`VersionKind`]:
//!
//! - **Head** (the trunk): read-only. Writes fail with
//!   [`RepoError::Unsupported`]. Updating clones if absent; pulling resets
//!   the clone to the remote trunk.
//! - **Candidate** (an open change): read-write. Updating resolves the
//!   change on the review server first, then clones if absent and checks
//!   out the change's current ref. Listings carry per-file status relative
//!   to the trunk.
//!
//! # Locking
//!
//! Every public operation takes the version's lock exactly once and moves
//! the guard into the blocking task that does the git work, so the lock is
//! held until that work has finished even if the caller goes away. A
//! candidate listing reads the trunk listing under the trunk's lock first
//! and releases it before taking its own.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::dates::DateCache;
use super::lock::LockRegistry;
use super::mutation::{self, Mutation, MutationOutcome};
use super::status;
use super::sync::CloneSynchronizer;
use super::{run_blocking, RepoError, RepoSettings};
use crate::core::paths::{confine, normalize_dir_path, normalize_file_path};
use crate::core::types::{FileDates, FileEntry, FileStatus, VersionId, VersionKind};
use crate::git::Git;
use crate::review::{ChangeInfo, ReviewAdapter};

/// State shared by every facade of one store.
pub struct RepoContext {
    sync: CloneSynchronizer,
    locks: LockRegistry,
    dates: DateCache,
    review: Arc<dyn ReviewAdapter>,
}

impl std::fmt::Debug for RepoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoContext")
            .field("root", &self.sync.settings().root)
            .field("review", &self.review.name())
            .finish_non_exhaustive()
    }
}

impl RepoContext {
    pub fn new(settings: RepoSettings, review: Arc<dyn ReviewAdapter>) -> Self {
        Self {
            sync: CloneSynchronizer::new(settings),
            locks: LockRegistry::new(),
            dates: DateCache::new(),
            review,
        }
    }

    pub fn settings(&self) -> &RepoSettings {
        self.sync.settings()
    }

    pub fn sync(&self) -> &CloneSynchronizer {
        &self.sync
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn dates(&self) -> &DateCache {
        &self.dates
    }

    pub fn review(&self) -> &Arc<dyn ReviewAdapter> {
        &self.review
    }

    /// Dates of `path` in the checked-out clone of `id`, through the cache.
    fn file_dates(&self, git: &Git, id: &VersionId, path: &str) -> Result<FileDates, RepoError> {
        self.dates
            .get_or_try_insert(id, path, || git.file_dates(path).map_err(RepoError::from))
    }

    /// Trunk listing under `prefix`, every entry `CURRENT`.
    async fn trunk_listing(
        self: &Arc<Self>,
        prefix: String,
        with_dates: bool,
    ) -> Result<Vec<FileEntry>, RepoError> {
        let head = self.settings().head_id();
        let guard = self.locks.acquire(&head).await;
        let ctx = Arc::clone(self);

        run_blocking(move || {
            let _guard = guard;
            let git = ctx.sync.clone_if_absent(&head)?;
            git.list_files(&prefix)?
                .into_iter()
                .map(|path| -> Result<FileEntry, RepoError> {
                    if with_dates {
                        let dates = ctx.file_dates(&git, &head, &path)?;
                        Ok(FileEntry::current(path, dates))
                    } else {
                        Ok(FileEntry::new(path, FileStatus::Current))
                    }
                })
                .collect()
        })
        .await
    }
}

/// A versioned view of the registry repository.
#[derive(Debug, Clone)]
pub struct VersionedRepository {
    id: VersionId,
    kind: VersionKind,
    ctx: Arc<RepoContext>,
}

impl VersionedRepository {
    /// Create the facade for `id`; the kind follows from the trunk name.
    pub fn new(id: VersionId, ctx: Arc<RepoContext>) -> Self {
        let kind = id.kind(&ctx.settings().trunk);
        Self { id, kind, ctx }
    }

    pub fn version_id(&self) -> &VersionId {
        &self.id
    }

    pub fn kind(&self) -> VersionKind {
        self.kind
    }

    /// Working directory of this version's clone.
    pub fn local_path(&self) -> PathBuf {
        self.ctx.sync.version_dir(&self.id)
    }

    fn unsupported(&self, operation: &'static str) -> RepoError {
        RepoError::Unsupported {
            operation,
            kind: self.kind,
            id: self.id.clone(),
        }
    }

    async fn current_change(&self) -> Result<ChangeInfo, RepoError> {
        Ok(self.ctx.review.get_change(self.id.as_str()).await?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Make the working directory usable.
    ///
    /// # Errors
    ///
    /// - `NotFound` for a candidate without a change on the review server;
    ///   no directory is created in that case
    pub async fn update_repository(&self) -> Result<(), RepoError> {
        let change = match self.kind {
            VersionKind::Head => None,
            VersionKind::Candidate => Some(self.current_change().await?),
        };

        let guard = self.ctx.locks.acquire(&self.id).await;
        let ctx = Arc::clone(&self.ctx);
        let id = self.id.clone();

        run_blocking(move || {
            let _guard = guard;
            match change {
                None => ctx.sync.clone_if_absent(&id).map(drop),
                Some(change) => ctx.sync.fetch_and_checkout(&id, &change.ref_spec).map(drop),
            }
        })
        .await
    }

    /// Reset the trunk clone to the remote trunk branch.
    ///
    /// # Errors
    ///
    /// - `Unsupported` on candidate versions
    pub async fn pull_repository(&self) -> Result<(), RepoError> {
        if self.kind == VersionKind::Candidate {
            return Err(self.unsupported("pull_repository"));
        }

        let guard = self.ctx.locks.acquire(&self.id).await;
        let ctx = Arc::clone(&self.ctx);

        run_blocking(move || {
            let _guard = guard;
            ctx.sync.reset_trunk_to_remote().map(drop)
        })
        .await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Files under `path` with status and commit dates, sorted by name.
    pub async fn file_list(&self, path: &str) -> Result<Vec<FileEntry>, RepoError> {
        let prefix = normalize_dir_path(path)?;
        match self.kind {
            VersionKind::Head => self.ctx.trunk_listing(prefix, true).await,
            VersionKind::Candidate => self.candidate_listing(prefix, true).await,
        }
    }

    async fn candidate_listing(
        &self,
        prefix: String,
        with_dates: bool,
    ) -> Result<Vec<FileEntry>, RepoError> {
        let trunk = self.ctx.trunk_listing(prefix.clone(), with_dates).await?;
        let change = self.current_change().await?;
        let diff = self.ctx.review.change_files(self.id.as_str()).await?;

        let mut entries = status::reconcile(trunk, &diff, &prefix);
        debug!(version = %self.id, prefix = %prefix, entries = entries.len(), "reconciled listing");
        if !with_dates {
            return Ok(entries);
        }

        let guard = self.ctx.locks.acquire(&self.id).await;
        let ctx = Arc::clone(&self.ctx);
        let id = self.id.clone();

        run_blocking(move || {
            let _guard = guard;
            let git = ctx.sync.fetch_and_checkout(&id, &change.ref_spec)?;
            let work_dir = git.work_dir()?.to_path_buf();

            for entry in entries
                .iter_mut()
                .filter(|e| matches!(e.status, FileStatus::New | FileStatus::Changed))
            {
                if work_dir.join(&entry.path).is_file() {
                    let dates = ctx.file_dates(&git, &id, &entry.path)?;
                    entry.created_at = Some(dates.created_at);
                    entry.updated_at = Some(dates.updated_at);
                }
            }
            Ok(entries)
        })
        .await
    }

    /// Contents of `path`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the file does not exist in this version
    pub async fn read_file(&self, path: &str) -> Result<String, RepoError> {
        let path = normalize_file_path(path)?;
        let change = match self.kind {
            VersionKind::Head => None,
            VersionKind::Candidate => Some(self.current_change().await?),
        };

        let guard = self.ctx.locks.acquire(&self.id).await;
        let ctx = Arc::clone(&self.ctx);
        let id = self.id.clone();

        run_blocking(move || {
            let _guard = guard;
            let git = match change {
                None => ctx.sync.clone_if_absent(&id)?,
                Some(change) => ctx.sync.fetch_and_checkout(&id, &change.ref_spec)?,
            };

            let (relative, absolute) = confine(git.work_dir()?, &path)?;
            fs::read_to_string(&absolute).map_err(|e| match e.kind() {
                IoErrorKind::NotFound => {
                    RepoError::NotFound(format!("file '{}' in version {}", relative, id))
                }
                _ => RepoError::CommandFailure(format!("cannot read {}: {}", relative, e)),
            })
        })
        .await
    }

    /// Whether `path` exists in this version.
    ///
    /// For candidates a file the change deletes does not exist, even though
    /// the trunk still has it.
    pub async fn is_file_exists(&self, path: &str) -> Result<bool, RepoError> {
        let path = normalize_file_path(path)?;

        match self.kind {
            VersionKind::Head => {
                let guard = self.ctx.locks.acquire(&self.id).await;
                let ctx = Arc::clone(&self.ctx);
                let id = self.id.clone();

                run_blocking(move || {
                    let _guard = guard;
                    let git = ctx.sync.clone_if_absent(&id)?;
                    let (_, absolute) = confine(git.work_dir()?, &path)?;
                    Ok(absolute.is_file())
                })
                .await
            }
            VersionKind::Candidate => {
                let parent = path
                    .rsplit_once('/')
                    .map(|(dir, _)| dir.to_string())
                    .unwrap_or_default();
                let entries = self.candidate_listing(parent, false).await?;
                Ok(entries
                    .iter()
                    .any(|e| e.path == path && e.status != FileStatus::Deleted))
            }
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write `content` to `path` and push a new patch set.
    ///
    /// # Errors
    ///
    /// - `Unsupported` on the head version
    /// - `Conflict` if the change is closed or the push is refused
    pub async fn write_file(&self, path: &str, content: &str) -> Result<MutationOutcome, RepoError> {
        if self.kind == VersionKind::Head {
            return Err(self.unsupported("write_file"));
        }
        let path = normalize_file_path(path)?;
        self.mutate(Mutation::Write {
            path,
            content: content.to_string(),
        })
        .await
    }

    /// Delete `path` and push a new patch set.
    ///
    /// # Errors
    ///
    /// - `Unsupported` on the head version
    /// - `NotFound` if the file does not exist
    pub async fn delete_file(&self, path: &str) -> Result<MutationOutcome, RepoError> {
        if self.kind == VersionKind::Head {
            return Err(self.unsupported("delete_file"));
        }
        let path = normalize_file_path(path)?;
        self.mutate(Mutation::Delete { path }).await
    }

    async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome, RepoError> {
        let guard = self.ctx.locks.acquire(&self.id).await;

        // Resolved under the lock so the pipeline starts from the newest patch set
        let change = self.current_change().await?;
        if change.status.is_closed() {
            return Err(RepoError::Conflict(format!(
                "change {} is {}",
                change.number, change.status
            )));
        }

        let ctx = Arc::clone(&self.ctx);
        let id = self.id.clone();

        run_blocking(move || {
            let _guard = guard;
            let result = mutation::apply(&ctx.sync, &id, &change.ref_spec, &mutation);
            ctx.dates.evict(&id, mutation.path());
            result
        })
        .await
    }
}

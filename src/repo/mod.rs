//! repo
//!
//! Versioned-file access layer: one working directory per version, guarded
//! by a per-version lock.
//!
//! # Architecture
//!
//! ```text
//! RepositoryFactory ──► VersionedRepository (Head | Candidate)
//!        │                    │
//!        │                    ├─ LockRegistry      per-version exclusion
//!        │                    ├─ CloneSynchronizer clone / fetch / reset
//!        │                    ├─ DateCache         (version, path) → dates
//!        │                    ├─ status::reconcile trunk listing + change diff
//!        │                    └─ mutation          stage → amend → push
//!        │
//! EvictionSweeper ──► removes clones of closed changes
//! ```
//!
//! All `git2` work runs on the blocking pool while the version's lock guard
//! is held, so operations on one version are serialized and different
//! versions proceed in parallel.
//!
//! # Modules
//!
//! - [`lock`]: Per-version lock registry
//! - [`dates`]: Commit date cache
//! - [`sync`]: Clone synchronizer and retry policy
//! - [`status`]: Status reconciliation of candidate listings
//! - [`mutation`]: Write/delete pipeline
//! - [`versioned`]: The per-version facade
//! - [`factory`]: Facade cache
//! - [`sweeper`]: Eviction of closed changes

pub mod dates;
pub mod factory;
pub mod lock;
pub mod mutation;
pub mod status;
pub mod sweeper;
pub mod sync;
pub mod versioned;

pub use dates::DateCache;
pub use factory::RepositoryFactory;
pub use lock::{LockRegistry, VersionGuard};
pub use sweeper::{EvictionSweeper, SweepReport};
pub use sync::{CloneSynchronizer, RetryPolicy};
pub use versioned::VersionedRepository;

use std::path::PathBuf;

use thiserror::Error;

use crate::core::config::{Config, ConfigError};
use crate::core::paths::PathError;
use crate::core::types::{BranchName, VersionId, VersionKind};
use crate::git::{Credentials, GitError};
use crate::review::ReviewError;

/// Errors surfaced by the repository layer.
///
/// The variants are the error kinds callers map to their own status codes;
/// see [`RepoError::kind`].
#[derive(Debug, Error)]
pub enum RepoError {
    /// Version, file or change absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Recoverable VCS or review failure.
    #[error("command failed: {0}")]
    CommandFailure(String),

    /// Non-fast-forward push or blocked review action.
    #[error("conflict: {0}")]
    Conflict(String),

    /// State the VCS contract says cannot occur.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Transport failure talking to the review server.
    #[error("review server unreachable: {0}")]
    Communication(String),

    /// Operation not offered by this version kind.
    #[error("{operation} is not supported on {kind} version {id}")]
    Unsupported {
        operation: &'static str,
        kind: VersionKind,
        id: VersionId,
    },

    /// Caller-supplied path rejected.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
}

/// Coarse error kind, stable across the layer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    CommandFailure,
    Conflict,
    InvariantViolation,
    Communication,
    Unsupported,
    InvalidPath,
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::NotFound(_) => ErrorKind::NotFound,
            RepoError::CommandFailure(_) => ErrorKind::CommandFailure,
            RepoError::Conflict(_) => ErrorKind::Conflict,
            RepoError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            RepoError::Communication(_) => ErrorKind::Communication,
            RepoError::Unsupported { .. } => ErrorKind::Unsupported,
            RepoError::InvalidPath(_) => ErrorKind::InvalidPath,
        }
    }
}

impl From<GitError> for RepoError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NonFastForward { .. } => RepoError::Conflict(err.to_string()),
            GitError::Invariant { message } => RepoError::InvariantViolation(message),
            other => RepoError::CommandFailure(other.to_string()),
        }
    }
}

impl From<ReviewError> for RepoError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::NotFound(message) => RepoError::NotFound(message),
            ReviewError::Conflict(message) => RepoError::Conflict(message),
            ReviewError::Communication(message) => RepoError::Communication(message),
        }
    }
}

/// Settings of the repository layer, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct RepoSettings {
    /// Canonical repository URL
    pub url: String,
    pub credentials: Option<Credentials>,
    pub trunk: BranchName,
    /// Remote name inside each clone
    pub remote: String,
    /// Directory holding one clone per version
    pub root: PathBuf,
    pub retry: RetryPolicy,
    /// Committer identity used when amending
    pub committer_name: String,
    pub committer_email: String,
}

impl RepoSettings {
    /// Resolve settings from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Fails if `vcs.url` is missing or no clone root can be determined.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let (committer_name, committer_email) = config.committer();
        Ok(Self {
            url: config.vcs_url()?.to_string(),
            credentials: config
                .vcs_credentials()
                .map(|(user, password)| Credentials::new(user, password)),
            trunk: config.trunk().clone(),
            remote: config.remote().to_string(),
            root: config.repositories_root()?,
            retry: RetryPolicy::new(config.retry_attempts(), config.retry_backoff()),
            committer_name,
            committer_email,
        })
    }

    /// Id of the trunk version.
    pub fn head_id(&self) -> VersionId {
        VersionId::head(&self.trunk)
    }
}

/// Run synchronous git work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, RepoError>
where
    F: FnOnce() -> Result<T, RepoError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RepoError::CommandFailure(format!("blocking task failed: {}", e)))?
}

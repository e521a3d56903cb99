//! repo::sync
//!
//! Clone synchronizer: brings a version's working directory in line with
//! the remote.
//!
//! # Operations
//!
//! - [`CloneSynchronizer::clone_if_absent`]: full clone on first touch
//! - [`CloneSynchronizer::fetch_and_checkout`]: fetch a change ref and detach
//!   at `FETCH_HEAD`
//! - [`CloneSynchronizer::reset_trunk_to_remote`]: fetch and hard-reset the
//!   trunk clone
//!
//! Every method is synchronous and must run under the version's lock on the
//! blocking pool. Clone, fetch and push are wrapped in [`RetryPolicy`], which
//! retries transient transport failures only.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use super::{RepoError, RepoSettings};
use crate::core::paths::StorePaths;
use crate::core::types::VersionId;
use crate::git::{remote_url_with_credentials, Git, GitError};

/// Bounded retry of transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `attempts` is clamped to at least one.
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `op`, retrying while it fails with a transient error.
    ///
    /// The wait before attempt `n + 1` is `n * backoff`.
    pub fn run<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> Result<T, GitError>,
    ) -> Result<T, GitError> {
        let mut attempt = 1;
        loop {
            match op() {
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    warn!(operation, attempt, error = %err, "transient git failure, retrying");
                    std::thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

/// Clone lifecycle of per-version working directories.
#[derive(Debug, Clone)]
pub struct CloneSynchronizer {
    settings: RepoSettings,
    paths: StorePaths,
}

impl CloneSynchronizer {
    pub fn new(settings: RepoSettings) -> Self {
        let paths = StorePaths::new(settings.root.clone());
        Self { settings, paths }
    }

    pub fn settings(&self) -> &RepoSettings {
        &self.settings
    }

    /// Working directory of `id`.
    pub fn version_dir(&self, id: &VersionId) -> PathBuf {
        self.paths.version_dir(id)
    }

    /// URL with embedded credentials, as configured on every clone's remote.
    pub fn remote_url(&self) -> String {
        remote_url_with_credentials(&self.settings.url, self.settings.credentials.as_ref())
    }

    /// Clone the remote into the directory of `id` unless a clone exists.
    ///
    /// A directory that is not a usable repository (for example left over
    /// from an interrupted clone) is removed and cloned again.
    pub fn clone_if_absent(&self, id: &VersionId) -> Result<Git, RepoError> {
        let dir = self.version_dir(id);

        if dir.exists() {
            match Git::open(&dir) {
                Ok(git) => return Ok(git),
                Err(err) => {
                    warn!(version = %id, dir = %dir.display(), error = %err, "discarding unusable clone");
                    remove_dir(&dir)?;
                }
            }
        }

        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RepoError::CommandFailure(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let settings = &self.settings;
        let url = self.remote_url();
        let result = settings.retry.run("clone", || {
            if dir.exists() {
                let _ = fs::remove_dir_all(&dir);
            }
            Git::clone(
                &url,
                &dir,
                settings.trunk.as_str(),
                &settings.remote,
                settings.credentials.as_ref(),
            )
        });

        match result {
            Ok(git) => {
                info!(version = %id, dir = %dir.display(), "cloned repository");
                Ok(git)
            }
            Err(err) => {
                if dir.exists() {
                    let _ = fs::remove_dir_all(&dir);
                }
                Err(err.into())
            }
        }
    }

    /// Fetch `ref_spec` into the clone of `id` and check out `FETCH_HEAD`.
    ///
    /// Clones first if needed.
    pub fn fetch_and_checkout(&self, id: &VersionId, ref_spec: &str) -> Result<Git, RepoError> {
        let git = self.clone_if_absent(id)?;
        let settings = &self.settings;

        settings.retry.run("fetch", || {
            git.fetch(&settings.remote, &[ref_spec], settings.credentials.as_ref())
        })?;
        let commit = git.checkout_fetch_head()?;

        info!(version = %id, ref_spec, commit = %commit, "checked out change");
        Ok(git)
    }

    /// Fetch all branches and hard-reset the trunk clone to the remote trunk.
    pub fn reset_trunk_to_remote(&self) -> Result<Git, RepoError> {
        let id = self.settings.head_id();
        let git = self.clone_if_absent(&id)?;
        let settings = &self.settings;

        settings.retry.run("fetch", || {
            git.fetch(&settings.remote, &[], settings.credentials.as_ref())
        })?;
        let target = format!("refs/remotes/{}/{}", settings.remote, settings.trunk);
        let commit = git.reset_hard(&target)?;

        info!(version = %id, commit = %commit, "trunk reset to remote");
        Ok(git)
    }

    /// Remove the clone of `id`. Returns `false` if there was none.
    pub fn remove_clone(&self, id: &VersionId) -> Result<bool, RepoError> {
        let dir = self.version_dir(id);
        if !dir.exists() {
            return Ok(false);
        }
        remove_dir(&dir)?;
        info!(version = %id, dir = %dir.display(), "removed clone");
        Ok(true)
    }
}

fn remove_dir(dir: &std::path::Path) -> Result<(), RepoError> {
    fs::remove_dir_all(dir)
        .map_err(|e| RepoError::CommandFailure(format!("cannot remove {}: {}", dir.display(), e)))
}

//! repo::mutation
//!
//! Write path of candidate versions.
//!
//! # Pipeline
//!
//! 1. Fetch the change's current ref and check out `FETCH_HEAD`
//! 2. Write (or remove) the file inside the working directory
//! 3. Stage the path
//! 4. Stop if the index matches HEAD; otherwise amend the tip commit,
//!    keeping its message and `Change-Id` trailer
//! 5. Point the remote at the canonical URL with embedded credentials
//! 6. Push `HEAD` to `refs/for/<trunk>` so the review server records a new
//!    patch set
//!
//! The whole pipeline runs under the version's lock, so no other caller
//! observes the working tree between staging and pushing.

use std::fs;

use tracing::info;

use super::sync::CloneSynchronizer;
use super::RepoError;
use crate::core::paths::confine;
use crate::core::types::VersionId;

/// A change to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Write { path: String, content: String },
    Delete { path: String },
}

impl Mutation {
    pub fn path(&self) -> &str {
        match self {
            Mutation::Write { path, .. } | Mutation::Delete { path } => path,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Mutation::Write { .. } => "write",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The content already matched; nothing was committed or pushed.
    Unchanged,
    /// A new patch set was pushed.
    Pushed { commit: String },
}

/// Magic ref that creates a new patch set on the trunk's review queue.
pub fn review_refspec(trunk: &str) -> String {
    format!("+HEAD:refs/for/{}", trunk)
}

/// Run the pipeline for `mutation` against the candidate `id`.
///
/// Must be called with the version's lock held.
///
/// # Errors
///
/// - `NotFound` when deleting a file that does not exist
/// - `InvalidPath` when the path leaves the working directory
/// - `Conflict` when the push is refused as non-fast-forward
/// - `CommandFailure` for any other git failure
pub fn apply(
    sync: &CloneSynchronizer,
    id: &VersionId,
    ref_spec: &str,
    mutation: &Mutation,
) -> Result<MutationOutcome, RepoError> {
    let settings = sync.settings();
    let git = sync.fetch_and_checkout(id, ref_spec)?;

    let (relative, absolute) = confine(git.work_dir()?, mutation.path())?;
    match mutation {
        Mutation::Write { content, .. } => {
            if let Some(parent) = absolute.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    RepoError::CommandFailure(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
            fs::write(&absolute, content).map_err(|e| {
                RepoError::CommandFailure(format!("cannot write {}: {}", relative, e))
            })?;
        }
        Mutation::Delete { .. } => {
            if !absolute.is_file() {
                return Err(RepoError::NotFound(format!(
                    "file '{}' in version {}",
                    relative, id
                )));
            }
            fs::remove_file(&absolute).map_err(|e| {
                RepoError::CommandFailure(format!("cannot delete {}: {}", relative, e))
            })?;
        }
    }

    git.stage_path(&relative)?;
    if git.index_matches_head()? {
        info!(version = %id, path = %relative, "{} left the tree unchanged", mutation.verb());
        return Ok(MutationOutcome::Unchanged);
    }

    let commit = git.amend_head(&settings.committer_name, &settings.committer_email)?;
    git.ensure_remote(&settings.remote, &sync.remote_url())?;

    let refspec = review_refspec(settings.trunk.as_str());
    settings.retry.run("push", || {
        git.push(&settings.remote, &refspec, settings.credentials.as_ref())
    })?;

    info!(version = %id, path = %relative, commit = %commit, "{} pushed for review", mutation.verb());
    Ok(MutationOutcome::Pushed { commit })
}

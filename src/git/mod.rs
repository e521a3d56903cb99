//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Every clone, fetch, checkout,
//! history walk, amend and push flows through [`Git`]. No other module
//! imports `git2`, and nothing shells out to the git CLI.
//!
//! # Responsibilities
//!
//! - Cloning and opening per-version working directories
//! - Fetching refs and checking out `FETCH_HEAD`
//! - Hard reset to a remote-tracking branch
//! - Listing working tree files
//! - Deriving file dates from history
//! - Staging, amending and pushing to the review magic ref
//!
//! # Invariants
//!
//! - Callers hold the version lock for the working directory they touch
//! - Transient transport failures are reported as [`GitError::Transport`]
//!   so the caller's retry wrapper can distinguish them

mod interface;

pub use interface::{
    classify_push_rejection, remote_url_with_credentials, CommitInfo, Credentials, Git, GitError,
};

//! review::traits
//!
//! Review adapter trait definition for interacting with the code-review
//! server that owns candidate changes.
//!
//! # Design
//!
//! The `ReviewAdapter` trait is async because review operations involve
//! network I/O. All methods return `Result` so callers can translate
//! failures into their own error kinds. Transport-specific errors never
//! cross this boundary: every failure is one of the three
//! [`ReviewError`] variants.
//!
//! # Example
//!
//! ```ignore
//! use regstore::review::{ChangeQuery, QueryStatus, ReviewAdapter, ReviewError};
//!
//! async fn closed(review: &dyn ReviewAdapter) -> Result<Vec<u64>, ReviewError> {
//!     let changes = review
//!         .query_changes(&ChangeQuery::new("registry").with_status(QueryStatus::Closed))
//!         .await?;
//!     Ok(changes.into_iter().map(|c| c.number).collect())
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from review operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReviewError {
    /// The change (or other resource) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server refused the operation because of the change's state
    /// (merge conflict, already merged, blocked submit).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other failure talking to the server.
    #[error("review server communication failed: {0}")]
    Communication(String),
}

/// Lifecycle status of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    /// Open and under review
    New,
    /// Submitted into the trunk
    Merged,
    /// Closed without merging
    Abandoned,
}

impl ChangeStatus {
    /// Whether the change is merged or abandoned.
    pub fn is_closed(self) -> bool {
        !matches!(self, ChangeStatus::New)
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeStatus::New => write!(f, "new"),
            ChangeStatus::Merged => write!(f, "merged"),
            ChangeStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Status filter for change queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Open,
    /// Merged or abandoned
    Closed,
    Merged,
    Abandoned,
}

impl QueryStatus {
    /// Query operator value understood by the review server.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Open => "open",
            QueryStatus::Closed => "closed",
            QueryStatus::Merged => "merged",
            QueryStatus::Abandoned => "abandoned",
        }
    }

    /// Whether a change with `status` satisfies this filter.
    pub fn matches(self, status: ChangeStatus) -> bool {
        match self {
            QueryStatus::Open => status == ChangeStatus::New,
            QueryStatus::Closed => status.is_closed(),
            QueryStatus::Merged => status == ChangeStatus::Merged,
            QueryStatus::Abandoned => status == ChangeStatus::Abandoned,
        }
    }
}

/// Filter for [`ReviewAdapter::query_changes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQuery {
    pub project: String,
    pub owner: Option<String>,
    pub status: Option<QueryStatus>,
}

impl ChangeQuery {
    /// Query all changes of a project.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            owner: None,
            status: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_status(mut self, status: QueryStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Change metadata returned by the review server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    /// Change number (the candidate version id)
    pub number: u64,
    /// Value of the `Change-Id` commit trailer
    pub change_id: String,
    /// Subject line of the current revision
    pub subject: String,
    pub topic: Option<String>,
    pub status: ChangeStatus,
    /// Whether the change merges cleanly, if the server computed it
    pub mergeable: Option<bool>,
    /// Fetch ref of the current revision, e.g. `refs/changes/42/42/3`
    pub ref_spec: String,
    /// Owner account name
    pub owner: Option<String>,
}

/// Fetch ref of a change's patch set, e.g. `refs/changes/42/1042/3`.
///
/// # Example
///
/// ```
/// use regstore::review::change_ref;
///
/// assert_eq!(change_ref(1042, 3), "refs/changes/42/1042/3");
/// assert_eq!(change_ref(7, 1), "refs/changes/07/7/1");
/// ```
pub fn change_ref(number: u64, patch_set: u32) -> String {
    format!("refs/changes/{:02}/{}/{}", number % 100, number, patch_set)
}

/// How a change modifies one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileChangeKind {
    Added,
    Deleted,
    Modified,
    Renamed,
}

impl FileChangeKind {
    /// Map a review server status code; a missing code means modified.
    ///
    /// # Example
    ///
    /// ```
    /// use regstore::review::FileChangeKind;
    ///
    /// assert_eq!(FileChangeKind::from_code(Some("A")), FileChangeKind::Added);
    /// assert_eq!(FileChangeKind::from_code(None), FileChangeKind::Modified);
    /// ```
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("A") => FileChangeKind::Added,
            Some("D") => FileChangeKind::Deleted,
            Some("R") => FileChangeKind::Renamed,
            _ => FileChangeKind::Modified,
        }
    }
}

/// Request to create a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChangeRequest {
    pub project: String,
    /// Target branch
    pub branch: String,
    pub subject: String,
    pub topic: Option<String>,
}

/// The review adapter trait.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Identifiers
///
/// Methods taking `id` accept either a change number or a `Change-Id`.
///
/// # Error Handling
///
/// - `NotFound`: the change does not exist
/// - `Conflict`: the change's state refuses the operation
/// - `Communication`: anything else (transport, auth, server errors)
#[async_trait]
pub trait ReviewAdapter: Send + Sync {
    /// Get the adapter name (e.g., "gerrit", "mock").
    fn name(&self) -> &'static str;

    /// Query changes matching the filter.
    async fn query_changes(&self, query: &ChangeQuery) -> Result<Vec<ChangeInfo>, ReviewError>;

    /// Get one change with its current revision.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such change exists
    async fn get_change(&self, id: &str) -> Result<ChangeInfo, ReviewError>;

    /// Files touched by the current revision, keyed by repository path.
    async fn change_files(&self, id: &str)
        -> Result<BTreeMap<String, FileChangeKind>, ReviewError>;

    /// Get the change topic, `None` when unset.
    async fn get_topic(&self, id: &str) -> Result<Option<String>, ReviewError>;

    /// Set (or clear with `None`) the change topic.
    async fn set_topic(&self, id: &str, topic: Option<&str>) -> Result<(), ReviewError>;

    /// Submit the change into its target branch.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the change cannot be merged
    async fn submit(&self, id: &str) -> Result<ChangeInfo, ReviewError>;

    /// Abandon the change.
    async fn abandon(&self, id: &str) -> Result<ChangeInfo, ReviewError>;

    /// Rebase the change onto its target branch.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the rebase hits conflicts
    async fn rebase(&self, id: &str) -> Result<ChangeInfo, ReviewError>;

    /// Create a new change with an empty commit.
    async fn create_change(&self, request: CreateChangeRequest) -> Result<ChangeInfo, ReviewError>;

    /// Post a review comment on the current revision.
    async fn review(&self, id: &str, message: &str) -> Result<(), ReviewError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_status_closed() {
        assert!(!ChangeStatus::New.is_closed());
        assert!(ChangeStatus::Merged.is_closed());
        assert!(ChangeStatus::Abandoned.is_closed());
    }

    #[test]
    fn query_status_matching() {
        assert!(QueryStatus::Open.matches(ChangeStatus::New));
        assert!(QueryStatus::Closed.matches(ChangeStatus::Merged));
        assert!(QueryStatus::Closed.matches(ChangeStatus::Abandoned));
        assert!(!QueryStatus::Merged.matches(ChangeStatus::Abandoned));
        assert_eq!(QueryStatus::Closed.as_str(), "closed");
    }

    #[test]
    fn file_change_kind_codes() {
        assert_eq!(FileChangeKind::from_code(Some("D")), FileChangeKind::Deleted);
        assert_eq!(FileChangeKind::from_code(Some("R")), FileChangeKind::Renamed);
        assert_eq!(FileChangeKind::from_code(Some("M")), FileChangeKind::Modified);
        assert_eq!(FileChangeKind::from_code(Some("W")), FileChangeKind::Modified);
    }

    #[test]
    fn change_query_builder() {
        let query = ChangeQuery::new("regs")
            .with_owner("bot")
            .with_status(QueryStatus::Open);
        assert_eq!(query.project, "regs");
        assert_eq!(query.owner.as_deref(), Some("bot"));
        assert_eq!(query.status, Some(QueryStatus::Open));
    }

    #[test]
    fn review_error_display() {
        assert_eq!(
            ReviewError::NotFound("change 7".into()).to_string(),
            "not found: change 7"
        );
        assert_eq!(
            ReviewError::Conflict("merge conflict".into()).to_string(),
            "conflict: merge conflict"
        );
    }
}

//! review::mock
//!
//! Mock review adapter for deterministic testing.
//!
//! # Design
//!
//! The mock stores changes and their file maps in memory and allows
//! configuring failure scenarios. Every call is recorded so tests can assert
//! on the interaction with the review server.
//!
//! # Example
//!
//! ```
//! use regstore::review::mock::MockReview;
//! use regstore::review::{CreateChangeRequest, ReviewAdapter, ChangeStatus};
//!
//! # tokio_test::block_on(async {
//! let review = MockReview::new();
//!
//! let change = review.create_change(CreateChangeRequest {
//!     project: "regs".to_string(),
//!     branch: "master".to_string(),
//!     subject: "Add form".to_string(),
//!     topic: None,
//! }).await.unwrap();
//!
//! assert_eq!(change.number, 1);
//! assert_eq!(change.status, ChangeStatus::New);
//!
//! let fetched = review.get_change("1").await.unwrap();
//! assert_eq!(fetched.subject, "Add form");
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{
    change_ref, ChangeInfo, ChangeQuery, ChangeStatus, CreateChangeRequest, FileChangeKind,
    ReviewAdapter, ReviewError,
};

/// Mock review adapter for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockReview {
    inner: Arc<Mutex<MockReviewInner>>,
}

#[derive(Debug)]
struct MockReviewInner {
    /// Stored changes by number.
    changes: BTreeMap<u64, MockChange>,
    /// Next change number to assign.
    next_number: u64,
    /// Method to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

#[derive(Debug, Clone)]
struct MockChange {
    info: ChangeInfo,
    project: String,
    files: BTreeMap<String, FileChangeKind>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    QueryChanges(ReviewError),
    GetChange(ReviewError),
    ChangeFiles(ReviewError),
    GetTopic(ReviewError),
    SetTopic(ReviewError),
    Submit(ReviewError),
    Abandon(ReviewError),
    Rebase(ReviewError),
    CreateChange(ReviewError),
    Review(ReviewError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    QueryChanges { project: String },
    GetChange { id: String },
    ChangeFiles { id: String },
    GetTopic { id: String },
    SetTopic { id: String, topic: Option<String> },
    Submit { id: String },
    Abandon { id: String },
    Rebase { id: String },
    CreateChange { project: String, subject: String },
    Review { id: String, message: String },
}

impl MockReview {
    /// Create a new empty mock.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockReviewInner {
                changes: BTreeMap::new(),
                next_number: 1,
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Build an open change fetched from `ref_spec`.
    ///
    /// The `Change-Id` is derived from the number.
    pub fn open_change(number: u64, ref_spec: impl Into<String>) -> ChangeInfo {
        ChangeInfo {
            number,
            change_id: format!("I{:040x}", number),
            subject: format!("Change {}", number),
            topic: None,
            status: ChangeStatus::New,
            mergeable: Some(true),
            ref_spec: ref_spec.into(),
            owner: None,
        }
    }

    /// Register a change of `project` with its file map.
    pub fn insert(
        &self,
        project: impl Into<String>,
        info: ChangeInfo,
        files: BTreeMap<String, FileChangeKind>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_number = inner.next_number.max(info.number + 1);
        inner.changes.insert(
            info.number,
            MockChange {
                info,
                project: project.into(),
                files,
            },
        );
    }

    /// Replace the file map of a change.
    pub fn set_files(&self, number: u64, files: BTreeMap<String, FileChangeKind>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(change) = inner.changes.get_mut(&number) {
            change.files = files;
        }
    }

    /// Force the status of a change.
    pub fn set_status(&self, number: u64, status: ChangeStatus) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(change) = inner.changes.get_mut(&number) {
            change.info.status = status;
        }
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use regstore::review::mock::{FailOn, MockReview};
    /// use regstore::review::ReviewError;
    ///
    /// let review = MockReview::new()
    ///     .fail_on(FailOn::GetChange(ReviewError::Communication("down".into())));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.set_fail_on(fail_on);
        self
    }

    /// Configure failure on a shared mock.
    pub fn set_fail_on(&self, fail_on: FailOn) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = Some(fail_on);
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// Number of stored changes.
    pub fn change_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.changes.len()
    }

    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, expected: &str) -> Result<(), ReviewError> {
        let inner = self.inner.lock().unwrap();
        let error = match (&inner.fail_on, expected) {
            (Some(FailOn::QueryChanges(e)), "query_changes")
            | (Some(FailOn::GetChange(e)), "get_change")
            | (Some(FailOn::ChangeFiles(e)), "change_files")
            | (Some(FailOn::GetTopic(e)), "get_topic")
            | (Some(FailOn::SetTopic(e)), "set_topic")
            | (Some(FailOn::Submit(e)), "submit")
            | (Some(FailOn::Abandon(e)), "abandon")
            | (Some(FailOn::Rebase(e)), "rebase")
            | (Some(FailOn::CreateChange(e)), "create_change")
            | (Some(FailOn::Review(e)), "review") => e.clone(),
            _ => return Ok(()),
        };
        Err(error)
    }

    /// Apply `f` to the change behind `id` (number or Change-Id).
    fn with_change<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut MockChange) -> Result<T, ReviewError>,
    ) -> Result<T, ReviewError> {
        let mut inner = self.inner.lock().unwrap();
        let change = match id.parse::<u64>() {
            Ok(number) => inner.changes.get_mut(&number),
            Err(_) => inner
                .changes
                .values_mut()
                .find(|change| change.info.change_id == id),
        };
        match change {
            Some(change) => f(change),
            None => Err(ReviewError::NotFound(format!("change {}", id))),
        }
    }

    fn close(&self, id: &str, status: ChangeStatus) -> Result<ChangeInfo, ReviewError> {
        self.with_change(id, |change| {
            if change.info.status.is_closed() {
                return Err(ReviewError::Conflict(format!(
                    "change is {}",
                    change.info.status
                )));
            }
            if status == ChangeStatus::Merged && change.info.mergeable == Some(false) {
                return Err(ReviewError::Conflict("change cannot be merged".into()));
            }
            change.info.status = status;
            Ok(change.info.clone())
        })
    }
}

impl Default for MockReview {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewAdapter for MockReview {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn query_changes(&self, query: &ChangeQuery) -> Result<Vec<ChangeInfo>, ReviewError> {
        self.record(MockOperation::QueryChanges {
            project: query.project.clone(),
        });
        self.check_fail("query_changes")?;

        let inner = self.inner.lock().unwrap();
        Ok(inner
            .changes
            .values()
            .filter(|change| change.project == query.project)
            .filter(|change| {
                query
                    .owner
                    .as_ref()
                    .map_or(true, |owner| change.info.owner.as_ref() == Some(owner))
            })
            .filter(|change| {
                query
                    .status
                    .map_or(true, |status| status.matches(change.info.status))
            })
            .map(|change| change.info.clone())
            .collect())
    }

    async fn get_change(&self, id: &str) -> Result<ChangeInfo, ReviewError> {
        self.record(MockOperation::GetChange { id: id.to_string() });
        self.check_fail("get_change")?;
        self.with_change(id, |change| Ok(change.info.clone()))
    }

    async fn change_files(
        &self,
        id: &str,
    ) -> Result<BTreeMap<String, FileChangeKind>, ReviewError> {
        self.record(MockOperation::ChangeFiles { id: id.to_string() });
        self.check_fail("change_files")?;
        self.with_change(id, |change| Ok(change.files.clone()))
    }

    async fn get_topic(&self, id: &str) -> Result<Option<String>, ReviewError> {
        self.record(MockOperation::GetTopic { id: id.to_string() });
        self.check_fail("get_topic")?;
        self.with_change(id, |change| Ok(change.info.topic.clone()))
    }

    async fn set_topic(&self, id: &str, topic: Option<&str>) -> Result<(), ReviewError> {
        self.record(MockOperation::SetTopic {
            id: id.to_string(),
            topic: topic.map(str::to_string),
        });
        self.check_fail("set_topic")?;
        self.with_change(id, |change| {
            change.info.topic = topic.filter(|t| !t.is_empty()).map(str::to_string);
            Ok(())
        })
    }

    async fn submit(&self, id: &str) -> Result<ChangeInfo, ReviewError> {
        self.record(MockOperation::Submit { id: id.to_string() });
        self.check_fail("submit")?;
        self.close(id, ChangeStatus::Merged)
    }

    async fn abandon(&self, id: &str) -> Result<ChangeInfo, ReviewError> {
        self.record(MockOperation::Abandon { id: id.to_string() });
        self.check_fail("abandon")?;
        self.close(id, ChangeStatus::Abandoned)
    }

    async fn rebase(&self, id: &str) -> Result<ChangeInfo, ReviewError> {
        self.record(MockOperation::Rebase { id: id.to_string() });
        self.check_fail("rebase")?;
        self.with_change(id, |change| {
            if change.info.status.is_closed() {
                return Err(ReviewError::Conflict(format!(
                    "change is {}",
                    change.info.status
                )));
            }
            let next_patch_set = change
                .info
                .ref_spec
                .rsplit('/')
                .next()
                .and_then(|n| n.parse::<u32>().ok())
                .unwrap_or(1)
                + 1;
            change.info.ref_spec = change_ref(change.info.number, next_patch_set);
            Ok(change.info.clone())
        })
    }

    async fn create_change(&self, request: CreateChangeRequest) -> Result<ChangeInfo, ReviewError> {
        self.record(MockOperation::CreateChange {
            project: request.project.clone(),
            subject: request.subject.clone(),
        });
        self.check_fail("create_change")?;

        let mut inner = self.inner.lock().unwrap();
        let number = inner.next_number;
        inner.next_number += 1;

        let mut info = Self::open_change(number, change_ref(number, 1));
        info.subject = request.subject;
        info.topic = request.topic;

        inner.changes.insert(
            number,
            MockChange {
                info: info.clone(),
                project: request.project,
                files: BTreeMap::new(),
            },
        );
        Ok(info)
    }

    async fn review(&self, id: &str, message: &str) -> Result<(), ReviewError> {
        self.record(MockOperation::Review {
            id: id.to_string(),
            message: message.to_string(),
        });
        self.check_fail("review")?;
        self.with_change(id, |_| Ok(()))
    }
}

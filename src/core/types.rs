//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name (the trunk)
//! - [`VersionId`] - Identifier of a version: the trunk name or a change number
//! - [`VersionKind`] - Whether a version is the trunk or a candidate change
//! - [`FileStatus`] - Per-file status of a candidate relative to the trunk
//! - [`FileEntry`] - One listed file with status and commit dates
//! - [`FileDates`] - Created/updated timestamps derived from history
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented.
//!
//! # Examples
//!
//! ```
//! use regstore::core::types::{BranchName, VersionId, VersionKind};
//!
//! let trunk = BranchName::new("master").unwrap();
//! let head = VersionId::new("master").unwrap();
//! let change = VersionId::new("1234").unwrap();
//!
//! assert_eq!(head.kind(&trunk), VersionKind::Head);
//! assert_eq!(change.kind(&trunk), VersionKind::Candidate);
//! assert!(BranchName::new("invalid..name").is_err());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// File name used to keep otherwise-empty directories under version control.
pub const PLACEHOLDER_FILE: &str = ".gitkeep";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid version id: {0}")]
    InvalidVersionId(String),
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
/// - Cannot be exactly `@`
///
/// # Example
///
/// ```
/// use regstore::core::types::BranchName;
///
/// let name = BranchName::new("master").unwrap();
/// assert_eq!(name.as_str(), "master");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let reject = |msg: &str| Err(TypeError::InvalidBranchName(msg.to_string()));

        if name.is_empty() {
            return reject("branch name cannot be empty");
        }
        if name == "@" {
            return reject("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return reject("branch name cannot start with '.' or '-'");
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return reject("branch name cannot end with '.lock' or '/'");
        }
        for forbidden in ["..", "@{", "//"] {
            if name.contains(forbidden) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{forbidden}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return reject("branch name cannot contain control characters");
        }

        for component in name.split('/') {
            if component.starts_with('.') {
                return reject("path component cannot start with '.'");
            }
            if component.ends_with(".lock") {
                return reject("path component cannot end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a version.
///
/// Either the trunk branch name (the head version) or the number of a change
/// under review. The value is otherwise opaque; it is never used as a path
/// without going through [`VersionId::dir_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Create a version id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersionId` for empty or whitespace-only ids.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TypeError::InvalidVersionId(
                "version id cannot be empty".into(),
            ));
        }
        if id.chars().any(|c| c.is_control()) {
            return Err(TypeError::InvalidVersionId(
                "version id cannot contain control characters".into(),
            ));
        }
        Ok(Self(id))
    }

    /// The version id of the trunk.
    pub fn head(trunk: &BranchName) -> Self {
        Self(trunk.as_str().to_string())
    }

    /// Classify this id against the configured trunk.
    pub fn kind(&self, trunk: &BranchName) -> VersionKind {
        if self.0 == trunk.as_str() {
            VersionKind::Head
        } else {
            VersionKind::Candidate
        }
    }

    /// Directory name of this version's clone.
    ///
    /// Characters outside `[A-Za-z0-9_-]` are replaced with `_`. When the id
    /// had to be altered, a short hash of the original id is appended so
    /// that two distinct ids never share a directory.
    ///
    /// # Example
    ///
    /// ```
    /// use regstore::core::types::VersionId;
    ///
    /// assert_eq!(VersionId::new("1234").unwrap().dir_name(), "1234");
    ///
    /// let odd = VersionId::new("../etc").unwrap().dir_name();
    /// assert!(odd.starts_with("___etc-"));
    /// assert!(!odd.contains('/'));
    /// ```
    pub fn dir_name(&self) -> String {
        let sanitized: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if sanitized == self.0 {
            return sanitized;
        }

        let digest = Sha256::digest(self.0.as_bytes());
        format!("{}-{}", sanitized, &hex::encode(digest)[..12])
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VersionId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<VersionId> for String {
    fn from(id: VersionId) -> Self {
        id.0
    }
}

impl std::str::FromStr for VersionId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for VersionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two variants of a versioned repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionKind {
    /// The trunk; read-only.
    Head,
    /// An open change under review; read-write.
    Candidate,
}

impl std::fmt::Display for VersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionKind::Head => write!(f, "head"),
            VersionKind::Candidate => write!(f, "candidate"),
        }
    }
}

/// Status of a file in a candidate version relative to the trunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    /// Added by the change.
    New,
    /// Modified or renamed by the change.
    Changed,
    /// Removed by the change.
    Deleted,
    /// Untouched by the change.
    Current,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            FileStatus::New => "NEW",
            FileStatus::Changed => "CHANGED",
            FileStatus::Deleted => "DELETED",
            FileStatus::Current => "CURRENT",
        })
    }
}

/// Created/updated timestamps of a file, derived from commit history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDates {
    /// Time of the oldest commit touching the file.
    pub created_at: DateTime<Utc>,
    /// Time of the newest commit touching the file.
    pub updated_at: DateTime<Utc>,
}

/// A file listed in a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Repository-relative path, `/`-separated.
    pub path: String,
    /// Last path component.
    pub name: String,
    pub status: FileStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    /// Create an entry without dates.
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        let path = path.into();
        let name = basename(&path).to_string();
        Self {
            path,
            name,
            status,
            created_at: None,
            updated_at: None,
        }
    }

    /// Create a `CURRENT` entry carrying the given dates.
    pub fn current(path: impl Into<String>, dates: FileDates) -> Self {
        Self::new(path, FileStatus::Current).with_dates(dates)
    }

    /// Replace the entry's dates.
    pub fn with_dates(mut self, dates: FileDates) -> Self {
        self.created_at = Some(dates.created_at);
        self.updated_at = Some(dates.updated_at);
        self
    }
}

/// Last `/`-separated component of a repository-relative path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

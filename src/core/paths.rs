//! core::paths
//!
//! Centralized path routing for on-disk clones.
//!
//! # Storage Layout
//!
//! Every version gets exactly one clone under the configured root:
//! `<repositories_root>/<sanitized version id>/`. Directory names come from
//! [`VersionId::dir_name`], never from the raw id.
//!
//! File paths received from callers are repository-relative. They are
//! normalized here and must stay inside the clone: absolute paths, `..`
//! escaping the root, and anything under `.git` are rejected.
//!
//! Lexical checks are not enough once a clone is on disk: a change can
//! commit a symlink. [`confine`] therefore refuses any existing component
//! that is a symlink and requires the deepest existing ancestor to resolve
//! inside the canonical working directory.
//!
//! # Example
//!
//! ```
//! use regstore::core::paths::{normalize_file_path, StorePaths};
//! use regstore::core::types::VersionId;
//! use std::path::PathBuf;
//!
//! let paths = StorePaths::new("/var/lib/regstore");
//! let id = VersionId::new("42").unwrap();
//! assert_eq!(paths.version_dir(&id), PathBuf::from("/var/lib/regstore/42"));
//!
//! assert_eq!(normalize_file_path("forms/./a.json").unwrap(), "forms/a.json");
//! assert!(normalize_file_path("../outside").is_err());
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::VersionId;

/// Errors from path normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("absolute paths are not allowed: {0}")]
    Absolute(String),

    #[error("path escapes the repository root: {0}")]
    Escapes(String),

    #[error("path points into the git directory: {0}")]
    GitDir(String),

    #[error("path contains a NUL byte")]
    Nul,
}

/// Path routing for the clone root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Create routing for the given clone root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The clone root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory of the clone for `id`.
    pub fn version_dir(&self, id: &VersionId) -> PathBuf {
        self.root.join(id.dir_name())
    }
}

/// Normalize a directory path used for listings.
///
/// Empty input, `"."` and `"/"`-only input denote the repository root and
/// normalize to `""`.
pub fn normalize_dir_path(path: &str) -> Result<String, PathError> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    normalize(trimmed, path)
}

/// Normalize a file path; the result is never empty.
pub fn normalize_file_path(path: &str) -> Result<String, PathError> {
    if path.starts_with('/') {
        return Err(PathError::Absolute(path.to_string()));
    }
    let normalized = normalize(path, path)?;
    if normalized.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(normalized)
}

/// Resolve a file path inside `workdir`.
///
/// Components that already exist on disk must not be symlinks, and the
/// deepest existing one must canonicalize to a path under `workdir`.
/// Components past the first missing one are not inspected.
pub fn confine(workdir: &Path, path: &str) -> Result<(String, PathBuf), PathError> {
    let relative = normalize_file_path(path)?;
    let absolute = workdir.join(&relative);
    check_on_disk(workdir, &relative, path)?;
    Ok((relative, absolute))
}

fn check_on_disk(workdir: &Path, relative: &str, original: &str) -> Result<(), PathError> {
    let escapes = || PathError::Escapes(original.to_string());

    // Nothing on disk yet, nothing to resolve
    let Ok(root) = workdir.canonicalize() else {
        return Ok(());
    };

    let mut deepest = workdir.to_path_buf();
    let mut current = workdir.to_path_buf();
    for component in relative.split('/') {
        current.push(component);
        match current.symlink_metadata() {
            Ok(meta) if meta.file_type().is_symlink() => return Err(escapes()),
            Ok(_) => deepest.clone_from(&current),
            Err(_) => break,
        }
    }

    match deepest.canonicalize() {
        Ok(resolved) if resolved.starts_with(&root) => Ok(()),
        _ => Err(escapes()),
    }
}

fn normalize(path: &str, original: &str) -> Result<String, PathError> {
    if path.contains('\0') {
        return Err(PathError::Nul);
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathError::Escapes(original.to_string()));
                }
            }
            other => parts.push(other),
        }
    }

    if parts.first() == Some(&".git") {
        return Err(PathError::GitDir(original.to_string()));
    }

    Ok(parts.join("/"))
}

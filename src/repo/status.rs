//! repo::status
//!
//! Status reconciliation of a candidate listing.
//!
//! A candidate's listing is the trunk listing (every entry `CURRENT`)
//! overlaid with the change's file diff:
//!
//! | diff kind            | status    |
//! |----------------------|-----------|
//! | added                | `NEW`     |
//! | deleted              | `DELETED` |
//! | modified / renamed   | `CHANGED` |
//!
//! Diff entries are matched against the trunk listing by basename, so two
//! files with the same name in different directories can collide. One
//! refinement departs from plain basename matching: a diff path that names a
//! trunk entry exactly always lands on that entry, so a collision only
//! happens for diff paths the trunk does not contain. See
//! `exact_path_preferred_over_basename` and `basename_match_across_directories`
//! below for both cases.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use regstore::core::types::{FileEntry, FileStatus};
//! use regstore::repo::status::reconcile;
//! use regstore::review::FileChangeKind;
//!
//! let trunk = vec![
//!     FileEntry::new("a", FileStatus::Current),
//!     FileEntry::new("b", FileStatus::Current),
//!     FileEntry::new("c", FileStatus::Current),
//! ];
//! let diff = BTreeMap::from([
//!     ("a".to_string(), FileChangeKind::Added),
//!     ("b".to_string(), FileChangeKind::Deleted),
//!     ("d".to_string(), FileChangeKind::Modified),
//! ]);
//!
//! let statuses: Vec<_> = reconcile(trunk, &diff, "")
//!     .into_iter()
//!     .map(|e| (e.name, e.status))
//!     .collect();
//! assert_eq!(statuses, vec![
//!     ("a".to_string(), FileStatus::New),
//!     ("b".to_string(), FileStatus::Deleted),
//!     ("c".to_string(), FileStatus::Current),
//!     ("d".to_string(), FileStatus::Changed),
//! ]);
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::core::types::{basename, FileEntry, FileStatus, PLACEHOLDER_FILE};
use crate::review::FileChangeKind;

/// Status a diff kind assigns.
pub fn status_for(kind: FileChangeKind) -> FileStatus {
    match kind {
        FileChangeKind::Added => FileStatus::New,
        FileChangeKind::Deleted => FileStatus::Deleted,
        FileChangeKind::Modified | FileChangeKind::Renamed => FileStatus::Changed,
    }
}

/// Whether `path` lies under the directory `prefix` (`""` is the root).
pub fn under_prefix(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Overlay `diff` onto `trunk_files`, keeping only diff keys under `prefix`.
///
/// The result is sorted by name, then path.
pub fn reconcile(
    trunk_files: Vec<FileEntry>,
    diff: &BTreeMap<String, FileChangeKind>,
    prefix: &str,
) -> Vec<FileEntry> {
    let mut entries = trunk_files;

    let mut by_path: HashMap<String, usize> = HashMap::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        by_path.insert(entry.path.clone(), index);
        by_name.entry(entry.name.clone()).or_insert(index);
    }

    for (path, kind) in diff {
        if !under_prefix(path, prefix) || basename(path) == PLACEHOLDER_FILE {
            continue;
        }

        let status = status_for(*kind);
        let existing = by_path
            .get(path)
            .or_else(|| by_name.get(basename(path)))
            .copied();

        match existing {
            Some(index) => entries[index].status = status,
            None => {
                let entry = FileEntry::new(path.clone(), status);
                by_path.insert(entry.path.clone(), entries.len());
                by_name.insert(entry.name.clone(), entries.len());
                entries.push(entry);
            }
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    entries
}

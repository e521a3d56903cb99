//! Property-based tests for path confinement, version directories and
//! status reconciliation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use proptest::prelude::*;

use regstore::core::paths::{confine, normalize_dir_path, normalize_file_path};
use regstore::core::types::{FileEntry, FileStatus, VersionId};
use regstore::repo::status::{reconcile, status_for};
use regstore::review::FileChangeKind;

// =============================================================================
// Strategies
// =============================================================================

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z]{1,6}(\\.json)?",
        1 => Just("..".to_string()),
        1 => Just(".".to_string()),
        1 => Just(".git".to_string()),
        1 => Just(String::new()),
    ]
}

fn raw_path() -> impl Strategy<Value = String> {
    (any::<bool>(), prop::collection::vec(segment(), 0..6)).prop_map(|(absolute, parts)| {
        let joined = parts.join("/");
        if absolute {
            format!("/{}", joined)
        } else {
            joined
        }
    })
}

fn file_name() -> impl Strategy<Value = String> {
    "[a-e]\\.json"
}

fn repo_path() -> impl Strategy<Value = String> {
    (directory(), file_name()).prop_map(|(dir, name)| format!("{}/{}", dir, name))
}

fn change_kind() -> impl Strategy<Value = FileChangeKind> {
    prop_oneof![
        Just(FileChangeKind::Added),
        Just(FileChangeKind::Deleted),
        Just(FileChangeKind::Modified),
        Just(FileChangeKind::Renamed),
    ]
}

fn trunk_listing() -> impl Strategy<Value = Vec<FileEntry>> {
    prop::collection::btree_set(repo_path(), 0..8).prop_map(|paths| {
        paths
            .into_iter()
            .map(|p| FileEntry::new(p, FileStatus::Current))
            .collect()
    })
}

fn diff() -> impl Strategy<Value = BTreeMap<String, FileChangeKind>> {
    prop::collection::btree_map(repo_path(), change_kind(), 0..8)
}

fn directory() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("forms"), Just("processes"), Just("forms/sub")]
}

/// A diff in which no two paths share a file name.
fn diff_unique_names() -> impl Strategy<Value = BTreeMap<String, FileChangeKind>> {
    prop::collection::btree_map(file_name(), (directory(), change_kind()), 0..5).prop_map(
        |by_name| {
            by_name
                .into_iter()
                .map(|(name, (dir, kind))| (format!("{}/{}", dir, name), kind))
                .collect()
        },
    )
}

// =============================================================================
// Paths
// =============================================================================

proptest! {
    #[test]
    fn normalized_paths_never_escape(raw in raw_path()) {
        if let Ok(normalized) = normalize_file_path(&raw) {
            prop_assert!(!normalized.is_empty());
            prop_assert!(!normalized.starts_with('/'));
            prop_assert!(!normalized.split('/').any(|c| c == ".." || c == "." || c.is_empty()));
            prop_assert!(normalized.split('/').next() != Some(".git"));

            let workdir = Path::new("/work/42");
            let (relative, absolute) = confine(workdir, &raw).unwrap();
            prop_assert_eq!(&relative, &normalized);
            prop_assert!(absolute.starts_with(workdir));
        }
    }

    #[test]
    fn normalization_is_idempotent(raw in raw_path()) {
        if let Ok(normalized) = normalize_dir_path(&raw) {
            prop_assert_eq!(normalize_dir_path(&normalized).unwrap(), normalized);
        }
    }

    #[test]
    fn version_dirs_are_single_components(raw in "[ -~]{1,24}") {
        if let Ok(id) = VersionId::new(raw.as_str()) {
            let dir = id.dir_name();
            prop_assert!(!dir.is_empty());
            prop_assert!(!dir.contains('/'));
            prop_assert!(dir != "." && dir != "..");
        }
    }

    #[test]
    fn distinct_ids_get_distinct_dirs(a in "[a-z0-9./]{1,8}", b in "[a-z0-9./]{1,8}") {
        if let (Ok(x), Ok(y)) = (VersionId::new(a.as_str()), VersionId::new(b.as_str())) {
            if x != y {
                prop_assert_ne!(x.dir_name(), y.dir_name());
            }
        }
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

proptest! {
    #[test]
    fn reconcile_keeps_every_trunk_file(trunk in trunk_listing(), diff in diff()) {
        let trunk_paths: BTreeSet<String> = trunk.iter().map(|e| e.path.clone()).collect();
        let entries = reconcile(trunk, &diff, "");

        let paths: BTreeSet<String> = entries.iter().map(|e| e.path.clone()).collect();
        prop_assert!(trunk_paths.is_subset(&paths));
    }

    #[test]
    fn reconcile_is_sorted_by_name_then_path(trunk in trunk_listing(), diff in diff()) {
        let entries = reconcile(trunk, &diff, "");

        for pair in entries.windows(2) {
            let a = (&pair[0].name, &pair[0].path);
            let b = (&pair[1].name, &pair[1].path);
            prop_assert!(a <= b);
        }
    }

    #[test]
    fn diff_status_wins_when_names_are_unique(
        trunk in trunk_listing(),
        diff in diff_unique_names(),
    ) {
        let entries = reconcile(trunk, &diff, "");

        for (path, kind) in &diff {
            if let Some(entry) = entries.iter().find(|e| &e.path == path) {
                prop_assert_eq!(entry.status, status_for(*kind));
            }
        }
    }

    #[test]
    fn entries_stay_under_prefix(trunk in trunk_listing(), diff in diff()) {
        let trunk: Vec<FileEntry> = trunk
            .into_iter()
            .filter(|e| e.path.starts_with("forms/"))
            .collect();
        let entries = reconcile(trunk, &diff, "forms");

        prop_assert!(entries.iter().all(|e| e.path.starts_with("forms/")));
    }

    #[test]
    fn empty_diff_is_identity(trunk in trunk_listing()) {
        let mut expected = trunk.clone();
        expected.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));

        prop_assert_eq!(reconcile(trunk, &BTreeMap::new(), ""), expected);
    }
}

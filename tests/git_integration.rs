//! Integration tests for the git doorway.
//!
//! These run real git operations against a local bare remote created with
//! the git CLI.

mod common;

use common::{at, Fixture, FEB, JAN, MAR};
use regstore::git::{Git, GitError};

fn clone_master(fixture: &Fixture, name: &str) -> Git {
    let dest = fixture.root().join(name);
    Git::clone(&fixture.remote_url(), &dest, "master", "origin", None).expect("clone failed")
}

// =============================================================================
// Opening and Cloning
// =============================================================================

mod opening {
    use super::*;

    #[test]
    fn clone_checks_out_trunk() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");

        let work_dir = git.work_dir().unwrap();
        assert!(work_dir.join("forms/a.json").is_file());
        assert_eq!(
            std::fs::read_to_string(work_dir.join("forms/c.json")).unwrap(),
            "{\"c\":2}\n"
        );
        assert_eq!(git.head_commit().unwrap().summary, "Update c");
    }

    #[test]
    fn head_commit_reports_committer_time() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");

        let head = git.head_commit().unwrap();
        assert_eq!(head.committer_time, at(FEB));
        assert_eq!(head.oid.len(), 40);
    }

    #[test]
    fn open_existing_clone() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");
        let path = git.work_dir().unwrap().to_path_buf();
        drop(git);

        let reopened = Git::open(&path).unwrap();
        assert_eq!(reopened.head_commit().unwrap().summary, "Update c");
    }

    #[test]
    fn open_rejects_plain_directory() {
        let fixture = Fixture::new();
        let dir = fixture.root().join("plain");
        std::fs::create_dir_all(&dir).unwrap();

        assert!(matches!(Git::open(&dir), Err(GitError::NotARepo { .. })));
    }

    #[test]
    fn open_rejects_bare_repository() {
        let fixture = Fixture::new();
        assert!(matches!(
            Git::open(&fixture.remote()),
            Err(GitError::NotARepo { .. })
        ));
    }

    #[test]
    fn clone_of_missing_remote_fails() {
        let fixture = Fixture::new();
        let missing = fixture.root().join("nowhere.git");
        let result = Git::clone(
            &missing.to_string_lossy(),
            &fixture.root().join("x"),
            "master",
            "origin",
            None,
        );
        assert!(result.is_err());
    }
}

// =============================================================================
// Listing
// =============================================================================

mod listing {
    use super::*;

    #[test]
    fn lists_recursively_sorted_without_placeholders() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");

        assert_eq!(
            git.list_files("").unwrap(),
            vec![
                "forms/a.json",
                "forms/b.json",
                "forms/c.json",
                "processes/p.bpmn"
            ]
        );
        assert_eq!(
            git.list_files("forms").unwrap(),
            vec!["forms/a.json", "forms/b.json", "forms/c.json"]
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");

        assert!(git.list_files("reports").unwrap().is_empty());
    }

    #[test]
    fn nested_directories_are_included() {
        let fixture = Fixture::new();
        fixture.push_trunk(
            &[("forms/nested/deep.json", Some("{}"))],
            "Add nested",
            MAR,
        );
        let git = clone_master(&fixture, "master");

        assert!(git
            .list_files("forms")
            .unwrap()
            .contains(&"forms/nested/deep.json".to_string()));
    }
}

// =============================================================================
// History Dates
// =============================================================================

mod dates {
    use super::*;

    #[test]
    fn untouched_file_has_equal_dates() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");

        let dates = git.file_dates("forms/a.json").unwrap();
        assert_eq!(dates.created_at, at(JAN));
        assert_eq!(dates.updated_at, at(JAN));
    }

    #[test]
    fn modified_file_spans_history() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");

        let dates = git.file_dates("forms/c.json").unwrap();
        assert_eq!(dates.created_at, at(JAN));
        assert_eq!(dates.updated_at, at(FEB));
    }

    #[test]
    fn untracked_path_is_invariant_error() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");

        assert!(matches!(
            git.file_dates("forms/zzz.json"),
            Err(GitError::Invariant { .. })
        ));
    }
}

// =============================================================================
// Fetch, Checkout and Reset
// =============================================================================

mod sync {
    use super::*;

    #[test]
    fn fetch_change_ref_and_checkout() {
        let fixture = Fixture::new();
        let change_ref = fixture.create_change(7, &[("forms/d.json", Some("{}"))], MAR);
        let git = clone_master(&fixture, "seven");

        git.fetch("origin", &[change_ref.as_str()], None).unwrap();
        git.checkout_fetch_head().unwrap();

        let work_dir = git.work_dir().unwrap();
        assert!(work_dir.join("forms/d.json").is_file());
        assert!(git.head_commit().unwrap().message.contains("Change-Id: I"));
    }

    #[test]
    fn checkout_discards_local_edits() {
        let fixture = Fixture::new();
        let change_ref = fixture.create_change(7, &[("forms/d.json", Some("{}"))], MAR);
        let git = clone_master(&fixture, "seven");
        let work_dir = git.work_dir().unwrap().to_path_buf();

        std::fs::write(work_dir.join("forms/a.json"), "dirty").unwrap();
        std::fs::write(work_dir.join("forms/stray.json"), "stray").unwrap();

        git.fetch("origin", &[change_ref.as_str()], None).unwrap();
        git.checkout_fetch_head().unwrap();

        assert_eq!(
            std::fs::read_to_string(work_dir.join("forms/a.json")).unwrap(),
            "{\"a\":1}\n"
        );
        assert!(!work_dir.join("forms/stray.json").exists());
    }

    #[test]
    fn reset_follows_remote_trunk() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");
        fixture.push_trunk(&[("forms/e.json", Some("{}"))], "Add e", MAR);

        git.fetch("origin", &[], None).unwrap();
        git.reset_hard("refs/remotes/origin/master").unwrap();

        assert!(git.work_dir().unwrap().join("forms/e.json").is_file());
        assert_eq!(git.head_commit().unwrap().summary, "Add e");
    }
}

// =============================================================================
// Amend and Push
// =============================================================================

mod amend {
    use super::*;

    #[test]
    fn clean_index_matches_head() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");

        assert!(git.index_matches_head().unwrap());
    }

    #[test]
    fn rewriting_same_content_is_noop() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");
        let work_dir = git.work_dir().unwrap().to_path_buf();

        std::fs::write(work_dir.join("forms/a.json"), "{\"a\":1}\n").unwrap();
        git.stage_path("forms/a.json").unwrap();

        assert!(git.index_matches_head().unwrap());
    }

    #[test]
    fn amend_keeps_message_and_parent() {
        let fixture = Fixture::new();
        let change_ref = fixture.create_change(7, &[("forms/d.json", Some("{}"))], MAR);
        let git = clone_master(&fixture, "seven");
        git.fetch("origin", &[change_ref.as_str()], None).unwrap();
        let before = git.checkout_fetch_head().unwrap();
        let message = git.head_commit().unwrap().message;

        let work_dir = git.work_dir().unwrap().to_path_buf();
        std::fs::remove_file(work_dir.join("forms/b.json")).unwrap();
        git.stage_path("forms/b.json").unwrap();
        assert!(!git.index_matches_head().unwrap());

        let after = git.amend_head("Registry Bot", "bot@example.com").unwrap();
        assert_ne!(before, after);
        assert_eq!(git.head_commit().unwrap().message, message);

        git.push("origin", "+HEAD:refs/for/master", None).unwrap();
        assert_eq!(fixture.remote_git(&["rev-parse", "refs/for/master"]), after);
        assert_eq!(
            fixture.remote_git(&["rev-list", "--count", "master..refs/for/master"]),
            "1"
        );
        assert!(fixture.show("refs/for/master", "forms/b.json").is_none());
        assert!(fixture.show("refs/for/master", "forms/d.json").is_some());
    }

    #[test]
    fn ensure_remote_adds_and_updates() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");
        let url = fixture.remote_url();

        git.ensure_remote("origin", &url).unwrap();
        git.ensure_remote("mirror", &url).unwrap();
        git.ensure_remote("mirror", &url).unwrap();

        git.fetch("mirror", &[], None).unwrap();
    }

    #[test]
    fn non_fast_forward_push_is_rejected() {
        let fixture = Fixture::new();
        let git = clone_master(&fixture, "master");
        fixture.push_trunk(&[("forms/e.json", Some("{}"))], "Add e", MAR);

        let work_dir = git.work_dir().unwrap().to_path_buf();
        std::fs::write(work_dir.join("forms/f.json"), "{}").unwrap();
        git.stage_path("forms/f.json").unwrap();
        git.amend_head("Registry Bot", "bot@example.com").unwrap();

        let err = git.push("origin", "HEAD:refs/heads/master", None).unwrap_err();
        assert!(matches!(
            err,
            GitError::NonFastForward { .. } | GitError::PushRejected { .. } | GitError::Transport { .. }
        ));
    }
}

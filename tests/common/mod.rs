//! Shared fixtures for integration tests.
//!
//! A fixture is a bare "remote" repository plus a seed working copy used to
//! author trunk commits and change commits with the git CLI. Commit dates
//! are pinned so history-derived dates are predictable.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use regstore::core::types::BranchName;
use regstore::repo::{RepoSettings, RetryPolicy};
use regstore::review::change_ref;
use regstore::review::mock::MockReview;

/// 2024-01-01T00:00:00Z
pub const JAN: i64 = 1_704_067_200;
/// 2024-02-01T00:00:00Z
pub const FEB: i64 = 1_706_745_600;
/// 2024-03-01T00:00:00Z
pub const MAR: i64 = 1_709_251_200;

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// A bare remote with a seed working copy.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Remote whose trunk `master` has two commits:
    ///
    /// - JAN: forms/a.json, forms/b.json, forms/c.json, forms/.gitkeep,
    ///   processes/p.bpmn
    /// - FEB: forms/c.json modified
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let fixture = Self { dir };

        let remote = fixture.remote();
        std::fs::create_dir_all(&remote).unwrap();
        run_git(&remote, &["init", "-q", "--bare"], None);
        run_git(&remote, &["symbolic-ref", "HEAD", "refs/heads/master"], None);

        let seed = fixture.seed();
        std::fs::create_dir_all(&seed).unwrap();
        run_git(&seed, &["init", "-q"], None);
        run_git(&seed, &["symbolic-ref", "HEAD", "refs/heads/master"], None);
        run_git(&seed, &["config", "user.email", "test@example.com"], None);
        run_git(&seed, &["config", "user.name", "Test User"], None);
        run_git(&seed, &["config", "commit.gpgsign", "false"], None);
        run_git(&seed, &["remote", "add", "origin", &fixture.remote_url()], None);

        fixture.commit(
            &[
                ("forms/a.json", Some("{\"a\":1}\n")),
                ("forms/b.json", Some("{\"b\":1}\n")),
                ("forms/c.json", Some("{\"c\":1}\n")),
                ("forms/.gitkeep", Some("")),
                ("processes/p.bpmn", Some("<definitions/>\n")),
            ],
            "Initial registry",
            JAN,
        );
        fixture.push_trunk(&[("forms/c.json", Some("{\"c\":2}\n"))], "Update c", FEB);

        fixture
    }

    pub fn remote(&self) -> PathBuf {
        self.dir.path().join("remote.git")
    }

    pub fn remote_url(&self) -> String {
        self.remote().to_string_lossy().into_owned()
    }

    pub fn seed(&self) -> PathBuf {
        self.dir.path().join("seed")
    }

    /// Directory holding the per-version clones.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("repositories")
    }

    pub fn settings(&self) -> RepoSettings {
        RepoSettings {
            url: self.remote_url(),
            credentials: None,
            trunk: BranchName::new("master").unwrap(),
            remote: "origin".to_string(),
            root: self.root(),
            retry: RetryPolicy::new(1, Duration::ZERO),
            committer_name: "Registry Bot".to_string(),
            committer_email: "bot@example.com".to_string(),
        }
    }

    /// Apply file changes in the seed (`None` deletes) and commit at `time`.
    pub fn commit(&self, files: &[(&str, Option<&str>)], message: &str, time: i64) {
        let seed = self.seed();
        for (path, content) in files {
            let absolute = seed.join(path);
            match content {
                Some(content) => {
                    std::fs::create_dir_all(absolute.parent().unwrap()).unwrap();
                    std::fs::write(&absolute, content).unwrap();
                    run_git(&seed, &["add", path], None);
                }
                None => run_git(&seed, &["rm", "-q", path], None),
            }
        }
        run_git(&seed, &["commit", "-q", "-m", message], Some(time));
    }

    /// Commit on master and push it.
    pub fn push_trunk(&self, files: &[(&str, Option<&str>)], message: &str, time: i64) {
        self.commit(files, message, time);
        run_git(&self.seed(), &["push", "-q", "origin", "master"], None);
    }

    /// Create change `number` on top of master and push its first patch set.
    ///
    /// Returns the ref the patch set can be fetched from.
    pub fn create_change(&self, number: u64, files: &[(&str, Option<&str>)], time: i64) -> String {
        self.push_change(number, |message| self.commit(files, message, time))
    }

    /// Like [`Self::create_change`], but each entry commits a symlink at
    /// `path` pointing to `target`.
    #[cfg(unix)]
    pub fn create_symlink_change(&self, number: u64, links: &[(&str, &Path)], time: i64) -> String {
        let seed = self.seed();
        self.push_change(number, |message| {
            for (path, target) in links {
                let absolute = seed.join(path);
                std::fs::create_dir_all(absolute.parent().unwrap()).unwrap();
                std::os::unix::fs::symlink(target, &absolute).unwrap();
                run_git(&seed, &["add", path], None);
            }
            run_git(&seed, &["commit", "-q", "-m", message], Some(time));
        })
    }

    fn push_change(&self, number: u64, author: impl FnOnce(&str)) -> String {
        let seed = self.seed();
        let branch = format!("change-{}", number);
        run_git(&seed, &["checkout", "-q", "-B", &branch, "master"], None);

        let change_id = MockReview::open_change(number, "").change_id;
        author(&format!("Change {}\n\nChange-Id: {}", number, change_id));

        let fetch_ref = change_ref(number, 1);
        run_git(
            &seed,
            &["push", "-q", "origin", &format!("+{}:{}", branch, fetch_ref)],
            None,
        );
        run_git(&seed, &["checkout", "-q", "master"], None);
        fetch_ref
    }

    /// Scratch directory next to the remote, outside every clone.
    pub fn outside(&self) -> PathBuf {
        let dir = self.dir.path().join("outside");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Point `dst` in the remote at the tip of change `number`.
    pub fn publish(&self, number: u64, dst: &str) {
        run_git(
            &self.seed(),
            &["push", "-q", "origin", &format!("+change-{}:{}", number, dst)],
            None,
        );
    }

    /// Contents of `path` at `rev` in the remote, if present.
    pub fn show(&self, rev: &str, path: &str) -> Option<String> {
        let output = Command::new("git")
            .arg("--git-dir")
            .arg(self.remote())
            .args(["show", &format!("{}:{}", rev, path)])
            .output()
            .expect("git show failed");
        output
            .status
            .success()
            .then(|| String::from_utf8(output.stdout).unwrap())
    }

    /// Trimmed output of a git command run against the remote.
    pub fn remote_git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .arg("--git-dir")
            .arg(self.remote())
            .args(args)
            .output()
            .expect("git command failed");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }
}

/// Run a git command in `dir`, pinning author and committer dates to `time`.
pub fn run_git(dir: &Path, args: &[&str], time: Option<i64>) {
    let mut command = Command::new("git");
    command.args(args).current_dir(dir);
    if let Some(time) = time {
        let date = format!("{} +0000", time);
        command
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date);
    }

    let output = command.output().expect("failed to run git");
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

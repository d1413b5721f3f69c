//! Integration tests for [`GitCli`] against real git repositories.
//!
//! Each test builds a throwaway repo in a `TempDir`, drives it with raw git
//! commands, and checks the gateway's view of it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use backport_git::{CherryPickApply, CommitSha, GitCli, GitError, Vcs};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct TestRepo {
    _dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path().join("repo");
        fs::create_dir(&root).expect("failed to create repo dir");

        git_ok(&root, &["init"]);
        git_ok(&root, &["config", "user.name", "Test"]);
        git_ok(&root, &["config", "user.email", "test@localhost"]);
        git_ok(&root, &["config", "commit.gpgsign", "false"]);
        git_ok(&root, &["checkout", "-b", "main"]);

        Self { _dir: dir, root }
    }

    fn gateway(&self) -> GitCli {
        GitCli::new(self.root.clone())
    }

    /// Write a file and commit it on the current branch. Returns the commit id.
    fn commit_file(&self, name: &str, content: &str, message: &str) -> CommitSha {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&path, content).expect("failed to write file");
        git_ok(&self.root, &["add", "."]);
        git_ok(&self.root, &["commit", "-m", message]);
        self.head()
    }

    fn head(&self) -> CommitSha {
        let out = git_stdout(&self.root, &["rev-parse", "HEAD"]);
        CommitSha::new(out.trim()).expect("HEAD should be a valid sha")
    }

    fn checkout(&self, args: &[&str]) {
        let mut full = vec!["checkout"];
        full.extend_from_slice(args);
        git_ok(&self.root, &full);
    }
}

fn git_ok(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(out.status.success(), "git {args:?} failed");
    String::from_utf8_lossy(&out.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// First-parent log & ancestry
// ---------------------------------------------------------------------------

#[test]
fn first_parent_log_is_oldest_first_and_skips_side_branches() {
    let repo = TestRepo::new();
    let a = repo.commit_file("a.txt", "a", "first");
    let b = repo.commit_file("b.txt", "b", "second");

    // A side branch merged with --no-ff: its commit must not appear in the
    // first-parent log, but the merge commit must.
    repo.checkout(&["-b", "feature"]);
    let side = repo.commit_file("side.txt", "s", "side work");
    repo.checkout(&["main"]);
    git_ok(&repo.root, &["merge", "--no-ff", "-m", "merge feature", "feature"]);
    let merge = repo.head();

    let log = repo.gateway().first_parent_log("main").unwrap();
    assert_eq!(log, vec![a, b, merge]);
    assert!(!log.contains(&side));
}

#[test]
fn is_ancestor_answers_reachability() {
    let repo = TestRepo::new();
    let a = repo.commit_file("a.txt", "a", "first");
    repo.checkout(&["-b", "release"]);
    repo.checkout(&["main"]);
    let b = repo.commit_file("b.txt", "b", "second");

    let vcs = repo.gateway();
    assert!(vcs.is_ancestor(&a, "release").unwrap());
    assert!(!vcs.is_ancestor(&b, "release").unwrap());
    assert!(vcs.is_ancestor(&b, "main").unwrap());
}

#[test]
fn rev_parse_resolves_branches() {
    let repo = TestRepo::new();
    let a = repo.commit_file("a.txt", "a", "first");
    assert_eq!(repo.gateway().rev_parse("main").unwrap(), a);
    assert!(repo.gateway().rev_parse("no-such-branch").is_err());
}

// ---------------------------------------------------------------------------
// Worktrees
// ---------------------------------------------------------------------------

#[test]
fn worktree_add_and_remove_roundtrip() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "a", "first");

    let vcs = repo.gateway();
    let wt_path = repo.root.join(".git").join("bp-wt").join("t1");
    let handle = vcs.worktree_add(&wt_path, "main").unwrap();
    assert!(handle.path().join("a.txt").exists());

    vcs.worktree_remove(handle.path(), false).unwrap();
    assert!(!wt_path.exists());
}

#[test]
fn worktree_add_refuses_occupied_path() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "a", "first");

    let vcs = repo.gateway();
    let wt_path = repo.root.join(".git").join("bp-wt").join("t1");
    vcs.worktree_add(&wt_path, "main").unwrap();

    match vcs.worktree_add(&wt_path, "main") {
        Err(GitError::WorktreeExists { path }) => assert_eq!(path, wt_path),
        other => panic!("expected WorktreeExists, got {other:?}"),
    }
}

#[test]
fn dirty_worktree_needs_force_to_remove() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "a", "first");

    let vcs = repo.gateway();
    let wt_path = repo.root.join(".git").join("bp-wt").join("dirty");
    let handle = vcs.worktree_add(&wt_path, "main").unwrap();
    fs::write(handle.path().join("junk.txt"), "scratch").unwrap();

    assert!(vcs.worktree_remove(handle.path(), false).is_err());
    vcs.worktree_remove(handle.path(), true).unwrap();
    assert!(!wt_path.exists());
}

// ---------------------------------------------------------------------------
// Cherry-pick
// ---------------------------------------------------------------------------

#[test]
fn cherry_pick_applies_cleanly_onto_release() {
    let repo = TestRepo::new();
    repo.commit_file("base.txt", "base", "base");
    repo.checkout(&["-b", "release"]);
    repo.checkout(&["main"]);
    let fix = repo.commit_file("fix.txt", "fix", "the fix");

    let vcs = repo.gateway();
    let wt_path = repo.root.join(".git").join("bp-wt").join("clean");
    let handle = vcs.worktree_add(&wt_path, "release").unwrap();
    vcs.create_branch(&handle, "backport/clean", "release").unwrap();

    let apply = vcs.cherry_pick(&handle, &fix).unwrap();
    assert_eq!(apply, CherryPickApply::Clean);
    assert!(handle.path().join("fix.txt").exists());
}

#[test]
fn cherry_pick_conflict_reports_paths_and_keeps_worktree() {
    let repo = TestRepo::new();
    repo.commit_file("shared.txt", "one\n", "base");
    repo.checkout(&["-b", "release"]);
    repo.checkout(&["main"]);
    repo.commit_file("shared.txt", "two\n", "first rewrite");
    let second = repo.commit_file("shared.txt", "three\n", "second rewrite");

    let vcs = repo.gateway();
    let wt_path = repo.root.join(".git").join("bp-wt").join("conflict");
    let handle = vcs.worktree_add(&wt_path, "release").unwrap();

    // Picking the second rewrite without the first cannot apply: release
    // still has the base content.
    match vcs.cherry_pick(&handle, &second).unwrap() {
        CherryPickApply::Conflict(paths) => {
            assert_eq!(paths, vec![PathBuf::from("shared.txt")]);
        }
        CherryPickApply::Clean => panic!("expected a conflict"),
    }

    // The worktree is left as git left it, conflict markers included.
    let content = fs::read_to_string(handle.path().join("shared.txt")).unwrap();
    assert!(content.contains("<<<<<<<"));
}

#[test]
fn cherry_pick_of_unknown_commit_is_an_error_not_a_conflict() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "a", "first");

    let vcs = repo.gateway();
    let wt_path = repo.root.join(".git").join("bp-wt").join("err");
    let handle = vcs.worktree_add(&wt_path, "main").unwrap();

    let bogus = CommitSha::new(&"0".repeat(40)).unwrap();
    assert!(matches!(
        vcs.cherry_pick(&handle, &bogus),
        Err(GitError::CommandFailed { .. })
    ));
}

// ---------------------------------------------------------------------------
// Remotes & fetch
// ---------------------------------------------------------------------------

#[test]
fn fetch_from_local_remote_succeeds_and_bogus_remote_is_unreachable() {
    let upstream = TestRepo::new();
    upstream.commit_file("a.txt", "a", "first");

    let dir = TempDir::new().unwrap();
    let clone_root = dir.path().join("clone");
    let upstream_str = upstream.root.display().to_string();
    let clone_str = clone_root.display().to_string();
    git_ok(dir.path(), &["clone", &upstream_str, &clone_str]);

    let vcs = GitCli::new(clone_root);
    vcs.fetch("origin", "main").unwrap();
    assert_eq!(vcs.remotes().unwrap(), vec!["origin".to_owned()]);

    match vcs.fetch("nowhere", "main") {
        Err(GitError::UnreachableRemote { remote, .. }) => assert_eq!(remote, "nowhere"),
        other => panic!("expected UnreachableRemote, got {other:?}"),
    }
}

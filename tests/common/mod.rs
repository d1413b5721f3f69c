//! Shared test doubles for engine/analyzer integration tests.
//!
//! [`FakeVcs`] and [`FakeStore`] are fixture-backed implementations of the
//! two service traits. They record every call, so tests can assert not
//! just on outcomes but on which operations ran (e.g. "zero worktree
//! calls for a skipped change").

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

use backport::error::{BackportError, Result as BpResult};
use backport::github::ChangeStore;
use backport::model::{Change, ChangeState, Label, OpenPr, PrNumber};
use backport_git::{CherryPickApply, CommitSha, GitError, Vcs, WorktreeHandle};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A 40-hex sha filled with one character.
pub fn sha(fill: char) -> CommitSha {
    CommitSha::new(&fill.to_string().repeat(40)).expect("valid test sha")
}

/// Timestamp on a given January 2026 day.
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, d, 12, 0, 0).unwrap()
}

/// A merged change with a given merge commit and merge day.
pub fn change(number: u64, merge_commit: CommitSha, merged_day: u32) -> Change {
    Change {
        number: PrNumber::new(number),
        title: format!("change {number}"),
        body: String::new(),
        url: format!("https://github.com/acme/widget/pull/{number}"),
        merge_commit,
        merged_at: day(merged_day),
        labels: vec![],
        author: "dev".to_owned(),
        state: ChangeState::Merged,
        changed_files: vec![],
    }
}

// ---------------------------------------------------------------------------
// FakeVcs
// ---------------------------------------------------------------------------

/// Call counters for [`FakeVcs`].
#[derive(Debug, Default, Clone)]
pub struct VcsCalls {
    pub fetch: usize,
    pub first_parent_log: usize,
    pub is_ancestor: usize,
    pub worktree_add: usize,
    pub worktree_remove: usize,
    pub forced_removes: usize,
    pub create_branch: usize,
    pub cherry_pick: usize,
    pub push: usize,
}

/// Fixture-backed [`Vcs`]: a first-parent log, a reachability set, and a
/// set of commits that conflict when cherry-picked.
#[derive(Default)]
pub struct FakeVcs {
    /// First-parent log, oldest first, returned for any rev.
    pub log: Vec<CommitSha>,
    /// Commits reachable from any target ref.
    pub ancestors: HashSet<CommitSha>,
    /// Commit → conflicted paths produced by cherry-picking it.
    pub conflicts: HashMap<CommitSha, Vec<PathBuf>>,
    /// Commits whose cherry-pick times out (session-fatal).
    pub timeouts: HashSet<CommitSha>,
    /// Remotes reported by `remotes()`.
    pub remotes: Vec<String>,
    pub calls: RefCell<VcsCalls>,
}

impl FakeVcs {
    pub fn calls(&self) -> VcsCalls {
        self.calls.borrow().clone()
    }
}

impl Vcs for FakeVcs {
    fn fetch(&self, _remote: &str, _refspec: &str) -> Result<(), GitError> {
        self.calls.borrow_mut().fetch += 1;
        Ok(())
    }

    fn remotes(&self) -> Result<Vec<String>, GitError> {
        Ok(self.remotes.clone())
    }

    fn rev_parse(&self, _rev: &str) -> Result<CommitSha, GitError> {
        self.log.last().cloned().ok_or(GitError::CommandFailed {
            command: "git rev-parse".to_owned(),
            stderr: "empty fixture log".to_owned(),
            exit_code: Some(128),
        })
    }

    fn first_parent_log(&self, _rev: &str) -> Result<Vec<CommitSha>, GitError> {
        self.calls.borrow_mut().first_parent_log += 1;
        Ok(self.log.clone())
    }

    fn is_ancestor(&self, commit: &CommitSha, _rev: &str) -> Result<bool, GitError> {
        self.calls.borrow_mut().is_ancestor += 1;
        Ok(self.ancestors.contains(commit))
    }

    fn worktree_add(&self, path: &Path, _rev: &str) -> Result<WorktreeHandle, GitError> {
        self.calls.borrow_mut().worktree_add += 1;
        Ok(WorktreeHandle::new(path.to_path_buf()))
    }

    fn worktree_remove(&self, _path: &Path, force: bool) -> Result<(), GitError> {
        let mut calls = self.calls.borrow_mut();
        calls.worktree_remove += 1;
        if force {
            calls.forced_removes += 1;
        }
        Ok(())
    }

    fn create_branch(
        &self,
        _worktree: &WorktreeHandle,
        _branch: &str,
        _base: &str,
    ) -> Result<(), GitError> {
        self.calls.borrow_mut().create_branch += 1;
        Ok(())
    }

    fn cherry_pick(
        &self,
        _worktree: &WorktreeHandle,
        commit: &CommitSha,
    ) -> Result<CherryPickApply, GitError> {
        self.calls.borrow_mut().cherry_pick += 1;
        if self.timeouts.contains(commit) {
            return Err(GitError::Timeout {
                command: format!("git cherry-pick {commit}"),
                timeout: std::time::Duration::from_secs(1),
            });
        }
        match self.conflicts.get(commit) {
            Some(paths) => Ok(CherryPickApply::Conflict(paths.clone())),
            None => Ok(CherryPickApply::Clean),
        }
    }

    fn push(
        &self,
        _worktree: &WorktreeHandle,
        _remote: &str,
        _branch: &str,
    ) -> Result<(), GitError> {
        self.calls.borrow_mut().push += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeStore
// ---------------------------------------------------------------------------

/// Fixture-backed [`ChangeStore`].
#[derive(Default)]
pub struct FakeStore {
    pub changes: HashMap<u64, Change>,
    /// Label name → PR numbers carrying it.
    pub labeled: HashMap<String, Vec<u64>>,
    /// PR number → changed files.
    pub files: HashMap<u64, Vec<String>>,
    pub open_prs: Vec<OpenPr>,
    /// Recorded `create_pr` calls: (base, head, title, body).
    pub created: RefCell<Vec<(String, String, String, String)>>,
    next_pr: Cell<u64>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            next_pr: Cell::new(9000),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, change: Change) {
        self.changes.insert(change.number.get(), change);
    }

    pub fn created_count(&self) -> usize {
        self.created.borrow().len()
    }
}

impl ChangeStore for FakeStore {
    fn get_change(&self, number: PrNumber) -> BpResult<Change> {
        let mut change = self
            .changes
            .get(&number.get())
            .cloned()
            .ok_or_else(|| BackportError::ChangeNotFound {
                number,
                detail: "not in fixture".to_owned(),
            })?;
        change.changed_files = self.files.get(&number.get()).cloned().unwrap_or_default();
        Ok(change)
    }

    fn list_merged_by_label(&self, _base: &str, label: &Label) -> BpResult<Vec<Change>> {
        let numbers = self.labeled.get(label.as_str()).cloned().unwrap_or_default();
        numbers
            .into_iter()
            .map(|n| self.get_change(PrNumber::new(n)))
            .collect()
    }

    fn list_merged(
        &self,
        _base: &str,
        merged_after: Option<DateTime<Utc>>,
    ) -> BpResult<Vec<Change>> {
        let mut all: Vec<Change> = self.changes.values().cloned().collect();
        if let Some(cutoff) = merged_after {
            all.retain(|c| c.merged_at >= cutoff);
        }
        all.sort_by_key(|c| c.number);
        Ok(all)
    }

    fn changed_files(&self, number: PrNumber) -> BpResult<Vec<String>> {
        Ok(self.files.get(&number.get()).cloned().unwrap_or_default())
    }

    fn list_open_prs(&self, _base: &str) -> BpResult<Vec<OpenPr>> {
        Ok(self.open_prs.clone())
    }

    fn create_pr(&self, base: &str, head: &str, title: &str, body: &str) -> BpResult<PrNumber> {
        self.created.borrow_mut().push((
            base.to_owned(),
            head.to_owned(),
            title.to_owned(),
            body.to_owned(),
        ));
        let n = self.next_pr.get();
        self.next_pr.set(n + 1);
        Ok(PrNumber::new(n))
    }
}

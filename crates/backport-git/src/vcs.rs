//! The [`Vcs`] trait — the abstraction boundary between the engine and git.
//!
//! The engine, analyzer, and worktree manager interact with git exclusively
//! through this trait. The trait is object-safe so callers can hold
//! `&dyn Vcs` or `Box<dyn Vcs>`, and tests can substitute fixture-backed
//! doubles without spawning a single process.

use std::path::Path;

use crate::error::GitError;
use crate::types::{CherryPickApply, CommitSha, WorktreeHandle};

/// The git abstraction trait used by the backport engine.
///
/// Implementations may be backed by the git CLI ([`GitCli`](crate::GitCli))
/// or a test double. All methods are blocking and bounded by the
/// implementation's command timeout.
pub trait Vcs {
    /// Refresh a remote-tracking ref (`git fetch <remote> <refspec>`).
    ///
    /// Idempotent. Callers apply a session-scoped fetch-once policy: each
    /// `(remote, refspec)` pair is fetched at most once per invocation, and
    /// never re-fetched mid-run — concurrent invocations use disjoint
    /// worktrees and tolerate slight staleness.
    ///
    /// # Errors
    /// [`GitError::UnreachableRemote`] when the remote cannot be reached.
    fn fetch(&self, remote: &str, refspec: &str) -> Result<(), GitError>;

    /// List configured remote names (`git remote`).
    ///
    /// # Errors
    /// Fails if the repository cannot be queried.
    fn remotes(&self) -> Result<Vec<String>, GitError>;

    /// Resolve a revision to a commit id (`git rev-parse --verify`).
    ///
    /// # Errors
    /// Fails if the revision does not resolve.
    fn rev_parse(&self, rev: &str) -> Result<CommitSha, GitError>;

    /// Linear history of a branch following only first parents, oldest
    /// commit first (`git rev-list --first-parent --reverse`).
    ///
    /// This is the canonical merge order on the mainline: the position of a
    /// merge commit in this log is the order the change actually landed.
    ///
    /// # Errors
    /// Fails if the revision does not resolve.
    fn first_parent_log(&self, rev: &str) -> Result<Vec<CommitSha>, GitError>;

    /// Reachability query over the commit DAG: true iff `commit` is
    /// reachable by following parent edges from `rev`'s tip
    /// (`git merge-base --is-ancestor`).
    ///
    /// Call only after [`fetch`](Self::fetch) of `rev`'s remote ref in the
    /// current session.
    ///
    /// # Errors
    /// Fails on any exit status other than git's documented 0 (true) and
    /// 1 (false).
    fn is_ancestor(&self, commit: &CommitSha, rev: &str) -> Result<bool, GitError>;

    /// Create a worktree at `path` checked out at `rev`
    /// (`git worktree add`).
    ///
    /// # Errors
    /// [`GitError::WorktreeExists`] when `path` is already occupied.
    fn worktree_add(&self, path: &Path, rev: &str) -> Result<WorktreeHandle, GitError>;

    /// Remove a worktree (`git worktree remove`, with `--force` when asked).
    ///
    /// # Errors
    /// Fails if git refuses the removal (e.g. dirty tree without `force`).
    fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), GitError>;

    /// Create and check out a branch inside a worktree
    /// (`git checkout -b <branch> <base>`).
    ///
    /// # Errors
    /// Fails if the branch already exists or the base does not resolve.
    fn create_branch(
        &self,
        worktree: &WorktreeHandle,
        branch: &str,
        base: &str,
    ) -> Result<(), GitError>;

    /// Apply one commit onto the worktree's checked-out branch
    /// (`git cherry-pick`).
    ///
    /// A conflict is a normal result ([`CherryPickApply::Conflict`]), never
    /// an error; the worktree is left exactly as git left it.
    ///
    /// # Errors
    /// Fails only when the cherry-pick failed for a reason other than
    /// content conflicts (e.g. the commit id does not exist).
    fn cherry_pick(
        &self,
        worktree: &WorktreeHandle,
        commit: &CommitSha,
    ) -> Result<CherryPickApply, GitError>;

    /// Push a branch from a worktree and set its upstream
    /// (`git push -u <remote> <branch>`).
    ///
    /// # Errors
    /// Fails if the push is rejected or the remote is unreachable.
    fn push(&self, worktree: &WorktreeHandle, remote: &str, branch: &str)
        -> Result<(), GitError>;
}

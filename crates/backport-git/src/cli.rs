//! CLI-backed [`Vcs`] implementation.
//!
//! Shells out to the `git` binary. Every command runs through the
//! deadline-bounded runner in [`proc`](crate::proc); a hung remote or
//! filesystem never wedges the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::GitError;
use crate::proc::{self, ProcError, ProcOutput};
use crate::types::{CherryPickApply, CommitSha, WorktreeHandle};
use crate::vcs::Vcs;

/// Default per-command deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A [`Vcs`] implementation that runs the `git` CLI against one repository.
pub struct GitCli {
    /// Directory of the primary repository (never mutated by the engine;
    /// all writes happen inside worktrees).
    root: PathBuf,
    /// Per-command deadline.
    timeout: Duration,
}

impl GitCli {
    /// Create a gateway for the repository at `root` with the default
    /// command timeout.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-command deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run git in the primary repository.
    fn git(&self, args: &[&str]) -> Result<ProcOutput, GitError> {
        self.git_in(&self.root, args)
    }

    /// Run git in an arbitrary directory (worktrees).
    fn git_in(&self, dir: &Path, args: &[&str]) -> Result<ProcOutput, GitError> {
        proc::run("git", args, Some(dir), self.timeout).map_err(|e| match e {
            ProcError::Timeout { command, timeout } => GitError::Timeout { command, timeout },
            ProcError::Io { source, .. } => GitError::Io(source),
        })
    }

    /// Run git and fail on a non-zero exit.
    fn git_ok(&self, dir: &Path, args: &[&str]) -> Result<ProcOutput, GitError> {
        let out = self.git_in(dir, args)?;
        if out.success {
            Ok(out)
        } else {
            Err(command_failed(args, &out))
        }
    }
}

fn command_failed(args: &[&str], out: &ProcOutput) -> GitError {
    GitError::CommandFailed {
        command: proc::render_command("git", args),
        stderr: out.stderr.clone(),
        exit_code: out.exit_code,
    }
}

fn parse_sha(raw: &str) -> Result<CommitSha, GitError> {
    CommitSha::new(raw.trim()).map_err(|e| GitError::InvalidSha {
        value: e.value,
        reason: e.reason,
    })
}

impl Vcs for GitCli {
    fn fetch(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
        let args = ["fetch", remote, refspec];
        let out = self.git(&args)?;
        if out.success {
            tracing::debug!(remote, refspec, "fetched");
            Ok(())
        } else {
            // Any fetch failure means the remote state could not be
            // refreshed; ancestry answers would be stale or wrong.
            Err(GitError::UnreachableRemote {
                remote: remote.to_owned(),
                message: out.stderr,
            })
        }
    }

    fn remotes(&self) -> Result<Vec<String>, GitError> {
        let out = self.git_ok(&self.root, &["remote"])?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn rev_parse(&self, rev: &str) -> Result<CommitSha, GitError> {
        let out = self.git_ok(&self.root, &["rev-parse", "--verify", rev])?;
        parse_sha(&out.stdout)
    }

    fn first_parent_log(&self, rev: &str) -> Result<Vec<CommitSha>, GitError> {
        let out = self.git_ok(
            &self.root,
            &["rev-list", "--first-parent", "--reverse", rev],
        )?;
        out.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(parse_sha)
            .collect()
    }

    fn is_ancestor(&self, commit: &CommitSha, rev: &str) -> Result<bool, GitError> {
        let args = ["merge-base", "--is-ancestor", commit.as_str(), rev];
        let out = self.git(&args)?;
        // git merge-base --is-ancestor: 0 = yes, 1 = no, anything else = error.
        match out.exit_code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_failed(&args, &out)),
        }
    }

    fn worktree_add(&self, path: &Path, rev: &str) -> Result<WorktreeHandle, GitError> {
        if path.exists() {
            return Err(GitError::WorktreeExists {
                path: path.to_path_buf(),
            });
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path_str = path.display().to_string();
        // --detach: the derived branch is created separately so its name is
        // chosen by the caller, not by worktree add.
        self.git_ok(&self.root, &["worktree", "add", "--detach", &path_str, rev])?;
        tracing::debug!(path = %path.display(), rev, "worktree added");
        Ok(WorktreeHandle::new(path.to_path_buf()))
    }

    fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), GitError> {
        let path_str = path.display().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        self.git_ok(&self.root, &args)?;
        tracing::debug!(path = %path.display(), force, "worktree removed");
        Ok(())
    }

    fn create_branch(
        &self,
        worktree: &WorktreeHandle,
        branch: &str,
        base: &str,
    ) -> Result<(), GitError> {
        self.git_ok(worktree.path(), &["checkout", "-b", branch, base])?;
        Ok(())
    }

    fn cherry_pick(
        &self,
        worktree: &WorktreeHandle,
        commit: &CommitSha,
    ) -> Result<CherryPickApply, GitError> {
        let args = ["cherry-pick", commit.as_str()];
        let out = self.git_in(worktree.path(), &args)?;
        if out.success {
            return Ok(CherryPickApply::Clean);
        }

        // Non-zero exit: distinguish a content conflict (normal result)
        // from a genuine failure by asking git for unmerged paths.
        let conflicts = self.git_ok(
            worktree.path(),
            &["diff", "--name-only", "--diff-filter=U"],
        )?;
        let paths: Vec<PathBuf> = conflicts
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect();
        if paths.is_empty() {
            return Err(command_failed(&args, &out));
        }
        tracing::debug!(commit = %commit, conflicted = paths.len(), "cherry-pick conflict");
        Ok(CherryPickApply::Conflict(paths))
    }

    fn push(
        &self,
        worktree: &WorktreeHandle,
        remote: &str,
        branch: &str,
    ) -> Result<(), GitError> {
        self.git_ok(worktree.path(), &["push", "-u", remote, branch])?;
        tracing::debug!(remote, branch, "branch pushed");
        Ok(())
    }
}

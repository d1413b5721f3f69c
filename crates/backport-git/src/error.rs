//! Error types for git operations.
//!
//! [`GitError`] is the single error type returned by all [`Vcs`](crate::Vcs)
//! trait methods. It uses rich enum variants so callers can match on specific
//! failure modes (unreachable remote, timeout, conflict-free command failure)
//! without parsing error messages.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`Vcs`](crate::Vcs) operations.
///
/// A conflicting cherry-pick is **not** an error — it is the
/// [`CherryPickApply::Conflict`](crate::CherryPickApply::Conflict) result.
#[derive(Debug, Error)]
pub enum GitError {
    /// A fetch could not reach the remote.
    ///
    /// Encountered before a batch starts this is fatal; mid-batch it aborts
    /// the remainder of the batch (further fetches will fail identically).
    #[error("cannot reach remote `{remote}`: {message}")]
    UnreachableRemote {
        /// The remote name (e.g. `"origin"`).
        remote: String,
        /// Stderr from the failed fetch.
        message: String,
    },

    /// A git command exited non-zero for a reason other than a cherry-pick
    /// conflict.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed {
        /// The command that was run (e.g. `"git worktree add"`).
        command: String,
        /// Captured stderr, trimmed.
        stderr: String,
        /// The process exit code, if the process exited normally.
        exit_code: Option<i32>,
    },

    /// A git command exceeded its deadline and was killed.
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout {
        /// The command that was killed.
        command: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// A worktree path is already occupied.
    #[error("worktree path already exists: {}", path.display())]
    WorktreeExists {
        /// The colliding path.
        path: PathBuf,
    },

    /// A commit id produced by git could not be parsed.
    #[error("invalid commit id `{value}`: {reason}")]
    InvalidSha {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// An I/O error occurred (process spawn, filesystem).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// True for failures where continuing the current batch is pointless:
    /// the remote is unreachable or calls are hitting the deadline.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(self, Self::UnreachableRemote { .. } | Self::Timeout { .. })
    }
}

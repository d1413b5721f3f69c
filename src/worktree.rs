//! Isolated worktree allocation and retention policy.
//!
//! Worktrees live under a reserved namespace inside `.git/` so they never
//! show up in the primary working directory. Names combine a
//! high-resolution UTC timestamp with a random suffix; multiple operations
//! (or concurrent invocations) starting within the same clock tick retry
//! with a fresh suffix until the path is free.
//!
//! Retention is a pure function of the attempt outcome and two caller
//! flags — one decision table, unit-testable without touching git.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::{BackportError, Result};

/// Directory under `.git/` that holds all backport worktrees.
const NAMESPACE: &str = "backport-worktrees";

/// How many fresh suffixes to try before giving up on allocation.
const MAX_ATTEMPTS: u32 = 16;

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Allocates uniquely-named worktree paths under the reserved namespace.
pub struct WorktreeAllocator {
    namespace: PathBuf,
}

impl WorktreeAllocator {
    /// Allocator for the repository at `repo_root`.
    #[must_use]
    pub fn new(repo_root: &Path) -> Self {
        Self {
            namespace: repo_root.join(".git").join(NAMESPACE),
        }
    }

    /// The namespace directory all allocations land in.
    #[must_use]
    pub fn namespace(&self) -> &Path {
        &self.namespace
    }

    /// Pick a fresh, unoccupied worktree path.
    ///
    /// The path is not created here — `git worktree add` does that — but
    /// it is guaranteed not to exist at return time, and the random
    /// suffix makes a same-tick collision with a concurrent invocation
    /// vanishingly unlikely (and survivable: the gateway re-checks).
    ///
    /// # Errors
    /// Fails if no free path is found within the retry budget.
    pub fn allocate(&self) -> Result<PathBuf> {
        self.allocate_at(Utc::now())
    }

    /// Allocation with an explicit timestamp; the retry loop is the same
    /// path production code gets.
    ///
    /// # Errors
    /// Fails if no free path is found within the retry budget.
    pub fn allocate_at(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = self.namespace.join(candidate_name(now, &random_suffix()));
            if !candidate.exists() {
                return Ok(candidate);
            }
            tracing::debug!(path = %candidate.display(), "worktree path occupied, retrying");
        }
        Err(BackportError::Io(std::io::Error::other(format!(
            "could not allocate a free worktree path under {} after {MAX_ATTEMPTS} attempts",
            self.namespace.display()
        ))))
    }
}

fn candidate_name(now: DateTime<Utc>, suffix: &str) -> String {
    format!("backport-{}-{suffix}", now.format("%Y%m%dT%H%M%S%3fZ"))
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..4)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect()
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

/// The attempt outcomes that leave a worktree behind to decide about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptKind {
    /// The cherry-pick applied cleanly.
    Success,
    /// The cherry-pick conflicted.
    Conflict,
}

/// What to do with a worktree once its operation finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retention {
    /// Remove the worktree.
    Remove,
    /// Keep it on disk for inspection; the caller receives the path and
    /// manual-cleanup instructions.
    Retain,
}

/// The retention decision table.
///
/// | outcome  | keep  | force cleanup | decision |
/// |----------|-------|---------------|----------|
/// | Success  | false | —             | Remove   |
/// | Success  | true  | —             | Retain   |
/// | Conflict | —     | true          | Remove (destroys diagnostic state; a deliberate trade-off for automated pipelines) |
/// | Conflict | —     | false         | Retain   |
#[must_use]
pub const fn retention(
    outcome: AttemptKind,
    keep_worktree: bool,
    force_cleanup: bool,
) -> Retention {
    match outcome {
        AttemptKind::Success => {
            if keep_worktree {
                Retention::Retain
            } else {
                Retention::Remove
            }
        }
        AttemptKind::Conflict => {
            if force_cleanup {
                Retention::Remove
            } else {
                Retention::Retain
            }
        }
    }
}

/// Manual-cleanup instructions for a retained worktree.
#[must_use]
pub fn manual_cleanup_instructions(path: &Path) -> String {
    format!(
        "Worktree retained at: {0}\nCleanup when done: git worktree remove --force {0}",
        path.display()
    )
}

//! Per-attempt cherry-pick operation records.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::types::{PrNumber, Version};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a change was skipped instead of attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The merge commit is already reachable from the target branch tip;
    /// the change (or an equivalent cherry-pick of it) is present.
    AlreadyInTarget,
    /// The operator declined PR creation at the confirmation prompt.
    Declined,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInTarget => f.write_str("merge commit already in target branch"),
            Self::Declined => f.write_str("PR creation declined at prompt"),
        }
    }
}

/// The tagged result of one cherry-pick attempt.
///
/// Conflict is control flow here, not an error: the variant carries the
/// conflicted paths and the engine keeps iterating the batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Applied cleanly; a cherry-pick PR was created (unless the run
    /// stopped short of PR creation, e.g. dry-run reporting).
    Success {
        /// The created cherry-pick PR.
        created_pr: Option<PrNumber>,
    },
    /// The cherry-pick hit content conflicts. `paths` is never empty.
    Conflict {
        /// Paths with conflict markers, relative to the worktree root.
        paths: Vec<PathBuf>,
    },
    /// No cherry-pick was attempted.
    Skipped {
        /// Why the change was skipped.
        reason: SkipReason,
    },
    /// A per-change error (change missing, not merged, git failure).
    Failed {
        /// Human-readable failure description.
        message: String,
    },
}

/// Operation status — the one-way state machine per change.
///
/// Every operation starts `Pending` and moves exactly once to one of the
/// terminal states. There are no other transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Not yet processed.
    Pending,
    /// Cherry-pick applied and handed off to PR creation.
    Success,
    /// Cherry-pick conflicted; a human must resolve.
    Conflict,
    /// Nothing to do for this change.
    Skipped,
    /// A per-change error was recorded.
    Failed,
}

impl OperationStatus {
    /// The terminal status an outcome maps to.
    #[must_use]
    pub const fn of(outcome: &AttemptOutcome) -> Self {
        match outcome {
            AttemptOutcome::Success { .. } => Self::Success,
            AttemptOutcome::Conflict { .. } => Self::Conflict,
            AttemptOutcome::Skipped { .. } => Self::Skipped,
            AttemptOutcome::Failed { .. } => Self::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Worktree records
// ---------------------------------------------------------------------------

/// Lifecycle state of an isolated worktree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeState {
    /// Allocated and checked out.
    Created,
    /// Deliberately kept after the operation finished (diagnostic state,
    /// or `--keep-worktree`). Must be removed manually.
    Retained,
    /// Removed from disk.
    Removed,
}

/// An isolated worktree owned by at most one operation.
///
/// Paths are never reused while the state is `Created` or `Retained`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorktreeRecord {
    /// Filesystem path of the worktree root.
    pub path: PathBuf,
    /// Current lifecycle state.
    pub state: WorktreeState,
}

// ---------------------------------------------------------------------------
// CherryPickOperation
// ---------------------------------------------------------------------------

/// One isolated cherry-pick attempt: a change applied to a target branch
/// inside its own worktree.
///
/// Owned exclusively by one engine invocation; never shared across
/// operations. Status is monotonic: [`complete`](Self::complete) has an
/// effect only on a `Pending` operation.
#[derive(Clone, Debug, Serialize)]
pub struct CherryPickOperation {
    /// Collision-resistant identifier derived from target version, change
    /// number, and creation time.
    pub id: String,
    /// The change being backported.
    pub change: PrNumber,
    /// Target branch name.
    pub target: String,
    /// Derived branch name (`backport/<version>/pr-<number>`).
    pub branch: String,
    /// The worktree used for the attempt; absent for skipped changes,
    /// which never allocate one.
    pub worktree: Option<WorktreeRecord>,
    /// Current status.
    pub status: OperationStatus,
    /// Conflicted paths; populated only for `Conflict`.
    pub conflicted_paths: Vec<PathBuf>,
    /// The cherry-pick PR, once created.
    pub created_pr: Option<PrNumber>,
    /// When the operation record was created.
    pub created_at: DateTime<Utc>,
    /// When the operation reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl CherryPickOperation {
    /// Start a pending operation for `change` against `target`.
    #[must_use]
    pub fn begin(
        version: &Version,
        change: PrNumber,
        target: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: operation_id(version, change, created_at),
            change,
            target: target.to_owned(),
            branch: branch_for_change(version, change),
            worktree: None,
            status: OperationStatus::Pending,
            conflicted_paths: Vec::new(),
            created_pr: None,
            created_at,
            completed_at: None,
        }
    }

    /// Record the terminal outcome. A second call on an already-terminal
    /// operation is a programming error and is ignored.
    pub fn complete(&mut self, outcome: &AttemptOutcome, at: DateTime<Utc>) {
        if self.status != OperationStatus::Pending {
            debug_assert!(false, "operation {} completed twice", self.id);
            return;
        }
        self.status = OperationStatus::of(outcome);
        self.completed_at = Some(at);
        match outcome {
            AttemptOutcome::Conflict { paths } => {
                self.conflicted_paths.clone_from(paths);
            }
            AttemptOutcome::Success { created_pr } => {
                self.created_pr = *created_pr;
            }
            AttemptOutcome::Skipped { .. } | AttemptOutcome::Failed { .. } => {}
        }
    }

    /// Attach the worktree allocated for this attempt.
    pub fn attach_worktree(&mut self, path: PathBuf) {
        self.worktree = Some(WorktreeRecord {
            path,
            state: WorktreeState::Created,
        });
    }

    /// Update the attached worktree's lifecycle state.
    pub fn set_worktree_state(&mut self, state: WorktreeState) {
        if let Some(wt) = &mut self.worktree {
            wt.state = state;
        }
    }
}

/// Derived branch name for a backported change:
/// `backport/<version with dashes>/pr-<number>`.
#[must_use]
pub fn branch_for_change(version: &Version, change: PrNumber) -> String {
    format!("backport/{}/pr-{change}", version.sanitized())
}

/// Collision-resistant operation id: readable prefix plus a short digest of
/// `(version, change, timestamp)`. Two operations started for the same
/// change in the same run still differ by creation time.
fn operation_id(version: &Version, change: PrNumber, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(change.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(at.to_rfc3339().as_bytes());
    let digest = hasher.finalize();
    let mut short = String::with_capacity(8);
    for byte in &digest[..4] {
        short.push_str(&format!("{byte:02x}"));
    }
    format!("op-{}-{change}-{short}", version.sanitized())
}

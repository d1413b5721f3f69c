//! Domain model for backport orchestration.
//!
//! Foundation types used throughout the crate: validated identifiers
//! ([`PrNumber`], [`Version`], [`Label`], [`TargetBranch`]), the merged-PR
//! view ([`Change`]), and per-attempt operation records
//! ([`CherryPickOperation`]).

pub mod change;
pub mod operation;
pub mod types;

pub use change::{Change, ChangeState, OpenPr};
pub use operation::{
    branch_for_change, AttemptOutcome, CherryPickOperation, OperationStatus, SkipReason,
    WorktreeRecord, WorktreeState,
};
pub use types::{
    parse_pr_references, BranchKind, ErrorKind, Label, PrNumber, TargetBranch, ValidationError,
    Version,
};

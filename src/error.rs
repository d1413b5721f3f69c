//! Unified error type for backport operations.
//!
//! Defines [`BackportError`], used everywhere above the git gateway. Error
//! messages are designed to be operator-friendly: each variant includes a
//! clear description of what went wrong and, where there is a sensible next
//! step, how to proceed.
//!
//! Two conditions are deliberately **not** errors: a conflicting cherry-pick
//! (a first-class state-machine result) and an ambiguous commit ordering
//! (a warning attached to the report).

use std::fmt;
use std::path::PathBuf;

use backport_git::GitError;

use crate::model::{PrNumber, ValidationError};

// ---------------------------------------------------------------------------
// BackportError
// ---------------------------------------------------------------------------

/// Unified error type for backport operations.
#[derive(Debug)]
pub enum BackportError {
    /// A malformed branch, version, label, or PR reference. Fatal before
    /// any processing starts; no side effects have occurred.
    Validation(ValidationError),

    /// A referenced change does not exist.
    ChangeNotFound {
        /// The missing PR number.
        number: PrNumber,
        /// What the metadata service said.
        detail: String,
    },

    /// A referenced change exists but is not merged.
    NotMerged {
        /// The PR number.
        number: PrNumber,
        /// The state the PR is actually in.
        state: String,
    },

    /// A git operation failed.
    Git(GitError),

    /// A PR metadata service call failed (gh error, auth failure,
    /// network unreachable).
    Service {
        /// What was being done (e.g. `"gh pr view 2680"`).
        context: String,
        /// The underlying failure text.
        detail: String,
    },

    /// A configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// An I/O error outside of subprocess handling.
    Io(std::io::Error),
}

impl BackportError {
    /// Process exit code for this error, following the script convention:
    /// 2 for bad input, 3 for git/service failures.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_)
            | Self::Config { .. }
            | Self::ChangeNotFound { .. }
            | Self::NotMerged { .. } => 2,
            Self::Git(_) | Self::Service { .. } | Self::Io(_) => 3,
        }
    }

    /// True when continuing the current batch is pointless: the remote or
    /// the metadata service is down, so further calls will fail the same
    /// way. Per-change conditions (missing PR, not merged) return false.
    #[must_use]
    pub const fn aborts_batch(&self) -> bool {
        match self {
            Self::Git(e) => e.is_session_fatal(),
            Self::Service { .. } => true,
            Self::Validation(_)
            | Self::ChangeNotFound { .. }
            | Self::NotMerged { .. }
            | Self::Config { .. }
            | Self::Io(_) => false,
        }
    }
}

impl fmt::Display for BackportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::ChangeNotFound { number, detail } => {
                write!(
                    f,
                    "PR #{number} not found.\n  To fix: check the number, or pass --repo owner/repo if it lives in another repository.\n  ({detail})"
                )
            }
            Self::NotMerged { number, state } => {
                write!(
                    f,
                    "PR #{number} is not merged (state={state}).\n  Only merged changes can be backported."
                )
            }
            Self::Git(e) => write!(f, "git error: {e}"),
            Self::Service { context, detail } => {
                write!(
                    f,
                    "GitHub query failed ({context}): {detail}\n  To fix: check `gh auth status` and network connectivity."
                )
            }
            Self::Config { path, detail } => {
                write!(f, "bad config {}: {detail}", path.display())
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for BackportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Git(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for BackportError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<GitError> for BackportError {
    fn from(e: GitError) -> Self {
        Self::Git(e)
    }
}

impl From<std::io::Error> for BackportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for BackportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Service {
            context: "report serialization".to_owned(),
            detail: e.to_string(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BackportError>;

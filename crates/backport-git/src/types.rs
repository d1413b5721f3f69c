//! Value types used in [`Vcs`](crate::Vcs) trait signatures.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

// ---------------------------------------------------------------------------
// CommitSha
// ---------------------------------------------------------------------------

/// A validated 40-character lowercase hex git commit id (SHA-1).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitSha(String);

/// Error parsing a [`CommitSha`] from a string.
#[derive(Debug, Error)]
#[error("invalid commit id `{value}`: {reason}")]
pub struct ShaParseError {
    /// The raw value that failed validation.
    pub value: String,
    /// Why validation failed.
    pub reason: String,
}

impl CommitSha {
    /// Create a new `CommitSha` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error unless the string is exactly 40 lowercase hex
    /// characters.
    pub fn new(s: &str) -> Result<Self, ShaParseError> {
        if s.len() != 40 {
            return Err(ShaParseError {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(ShaParseError {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Return the inner hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitSha {
    type Err = ShaParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// WorktreeHandle
// ---------------------------------------------------------------------------

/// A handle to a git worktree created through [`Vcs::worktree_add`].
///
/// The handle is just the path; it does not remove the worktree on drop.
/// Worktree retention is a deliberate policy decision made by the caller,
/// and a retained worktree must stay inspectable after the process exits.
///
/// [`Vcs::worktree_add`]: crate::Vcs::worktree_add
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorktreeHandle {
    path: PathBuf,
}

impl WorktreeHandle {
    /// Wrap an existing worktree path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The worktree root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for WorktreeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

// ---------------------------------------------------------------------------
// CherryPickApply
// ---------------------------------------------------------------------------

/// The result of a cherry-pick attempt.
///
/// A conflict is a normal, expected result — not an error. The conflicted
/// worktree is left exactly as git left it so a human can inspect and
/// resolve it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CherryPickApply {
    /// The commit applied cleanly; the worktree has a new commit on its
    /// checked-out branch.
    Clean,
    /// The commit did not apply; the listed paths have conflict markers.
    /// The list is never empty.
    Conflict(Vec<PathBuf>),
}

impl CherryPickApply {
    /// True if the apply completed without conflicts.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_sha_accepts_lowercase_hex() {
        let sha = "a".repeat(40);
        assert_eq!(CommitSha::new(&sha).unwrap().as_str(), sha);
    }

    #[test]
    fn commit_sha_rejects_wrong_length() {
        let err = CommitSha::new("abc123").unwrap_err();
        assert!(err.reason.contains("40 hex characters"));
    }

    #[test]
    fn commit_sha_rejects_uppercase_and_nonhex() {
        assert!(CommitSha::new(&"A".repeat(40)).is_err());
        assert!(CommitSha::new(&"g".repeat(40)).is_err());
    }
}

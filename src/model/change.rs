//! The merged-PR view of a change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backport_git::CommitSha;

use super::types::PrNumber;

/// Lifecycle state of a pull request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeState {
    /// Merged into its base branch.
    Merged,
    /// Still open.
    Open,
    /// Closed without merging.
    Closed,
}

/// A change that landed on the mainline — one merged pull request.
///
/// Immutable once merged; the merge commit id never changes. Only merged
/// changes are eligible for backporting, and the constructor path in the
/// PR metadata service enforces that, so a `Change` in engine hands always
/// carries a real merge commit and timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Change {
    /// The PR number.
    pub number: PrNumber,
    /// PR title.
    pub title: String,
    /// PR body (markdown).
    pub body: String,
    /// Canonical PR URL.
    pub url: String,
    /// The commit that landed this change on the mainline.
    #[serde(serialize_with = "serialize_sha")]
    pub merge_commit: CommitSha,
    /// When the PR merged.
    pub merged_at: DateTime<Utc>,
    /// Labels on the PR at query time.
    pub labels: Vec<String>,
    /// The PR author's login.
    pub author: String,
    /// Lifecycle state; always [`ChangeState::Merged`] for eligible changes.
    pub state: ChangeState,
    /// Paths this change modified, when the metadata query included them.
    pub changed_files: Vec<String>,
}

fn serialize_sha<S: serde::Serializer>(sha: &CommitSha, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(sha.as_str())
}

impl Change {
    /// Title for the cherry-pick PR derived from this change.
    #[must_use]
    pub fn cherry_pick_title(&self) -> String {
        format!("{} (cherry-pick from #{})", self.title, self.number)
    }

    /// Body for the cherry-pick PR derived from this change.
    #[must_use]
    pub fn cherry_pick_body(&self) -> String {
        format!(
            "Cherry-picked from #{}\n\nOriginal PR: {}\n",
            self.number, self.url
        )
    }
}

/// A still-open PR, as returned by open-PR listing queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPr {
    /// The PR number.
    pub number: PrNumber,
    /// PR title.
    pub title: String,
    /// PR body (markdown).
    pub body: String,
    /// Canonical PR URL.
    pub url: String,
}

impl OpenPr {
    /// True if this PR reads as a cherry-pick of `original`: it mentions
    /// `#<original>` and uses cherry-pick wording in its title or body.
    #[must_use]
    pub fn references_cherry_pick_of(&self, original: PrNumber) -> bool {
        let needle = format!("#{original}");
        let mentions = self.title.contains(&needle) || self.body.contains(&needle);
        let worded = self.title.to_lowercase().contains("cherry-pick")
            || self.body.to_lowercase().contains("cherry-pick");
        mentions && worded
    }
}

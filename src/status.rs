//! Read-only backport status aggregation.
//!
//! Answers "where does the backport of version X stand?": which labeled
//! mainline changes already reached the target branch, which have a
//! cherry-pick PR in flight, and which still need one. Pure queries — this
//! module mutates nothing.

use std::fmt::Write as _;

use serde::Serialize;

use backport_git::Vcs;

use crate::error::Result;
use crate::github::ChangeStore;
use crate::model::{OpenPr, PrNumber, TargetBranch, Version};

/// One labeled change's standing.
#[derive(Clone, Debug, Serialize)]
pub struct StatusEntry {
    /// The original mainline change.
    pub change: PrNumber,
    /// Its title.
    pub title: String,
    /// Its URL.
    pub url: String,
    /// The open cherry-pick PR covering it, if one is in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cherry_pick_pr: Option<PrNumber>,
}

/// The aggregated status report for one version.
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    /// The release version.
    pub version: String,
    /// The branch the status is measured against.
    pub branch: String,
    /// Labeled changes already reachable from the branch tip.
    pub backported: Vec<StatusEntry>,
    /// Labeled changes with an open cherry-pick PR.
    pub in_flight: Vec<StatusEntry>,
    /// Labeled changes with no backport activity yet.
    pub pending: Vec<StatusEntry>,
}

impl StatusReport {
    /// Exit code: 0 when everything is backported, 1 while work remains.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.in_flight.is_empty() && self.pending.is_empty() {
            0
        } else {
            1
        }
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Backport status for {} ({})", self.version, self.branch);
        let _ = writeln!(
            out,
            "  backported: {}  in flight: {}  pending: {}",
            self.backported.len(),
            self.in_flight.len(),
            self.pending.len()
        );
        let _ = writeln!(out);
        for entry in &self.pending {
            let _ = writeln!(out, "  pending   #{} {}", entry.change, entry.title);
        }
        for entry in &self.in_flight {
            let cp = entry
                .cherry_pick_pr
                .map(|n| format!(" (cherry-pick #{n})"))
                .unwrap_or_default();
            let _ = writeln!(out, "  in flight #{} {}{cp}", entry.change, entry.title);
        }
        for entry in &self.backported {
            let _ = writeln!(out, "  done      #{} {}", entry.change, entry.title);
        }
        out
    }
}

/// Read-only status queries for one repository.
pub struct BackportStatus<'a, V: Vcs + ?Sized, S: ChangeStore + ?Sized> {
    vcs: &'a V,
    store: &'a S,
    remote: String,
    mainline: String,
}

impl<'a, V: Vcs + ?Sized, S: ChangeStore + ?Sized> BackportStatus<'a, V, S> {
    /// Build a status session.
    pub fn new(
        vcs: &'a V,
        store: &'a S,
        remote: impl Into<String>,
        mainline: impl Into<String>,
    ) -> Self {
        Self {
            vcs,
            store,
            remote: remote.into(),
            mainline: mainline.into(),
        }
    }

    /// Aggregate the backport status for `version` against `branch`.
    ///
    /// # Errors
    /// Fails on git or metadata service errors.
    pub fn report(&self, version: &Version, branch: &TargetBranch) -> Result<StatusReport> {
        self.vcs.fetch(&self.remote, branch.name())?;
        let branch_ref = branch.remote_ref(&self.remote);

        let labeled = self
            .store
            .list_merged_by_label(&self.mainline, &version.backport_label())?;
        let open_prs = self.store.list_open_prs(branch.name())?;

        let mut report = StatusReport {
            version: version.as_str().to_owned(),
            branch: branch.name().to_owned(),
            backported: Vec::new(),
            in_flight: Vec::new(),
            pending: Vec::new(),
        };

        for change in labeled {
            let entry = StatusEntry {
                change: change.number,
                title: change.title.clone(),
                url: change.url.clone(),
                cherry_pick_pr: None,
            };
            if self.vcs.is_ancestor(&change.merge_commit, &branch_ref)? {
                report.backported.push(entry);
            } else if let Some(open) = find_cherry_pick(&open_prs, change.number) {
                report.in_flight.push(StatusEntry {
                    cherry_pick_pr: Some(open),
                    ..entry
                });
            } else {
                report.pending.push(entry);
            }
        }
        Ok(report)
    }
}

fn find_cherry_pick(open_prs: &[OpenPr], original: PrNumber) -> Option<PrNumber> {
    open_prs
        .iter()
        .find(|pr| extract_original_pr(&pr.title, &pr.body) == Some(original))
        .map(|pr| pr.number)
}

/// Pull the original PR number out of a cherry-pick PR's title or body
/// (`"... (cherry-pick from #2680)"`, `"cherry picked from #2680"`).
fn extract_original_pr(title: &str, body: &str) -> Option<PrNumber> {
    for text in [title, body] {
        let lower = text.to_lowercase();
        for pattern in ["cherry-pick from #", "cherry picked from #"] {
            if let Some(idx) = lower.find(pattern) {
                let digits: String = lower[idx + pattern.len()..]
                    .chars()
                    .take_while(char::is_ascii_digit)
                    .collect();
                if let Ok(n) = digits.parse::<u64>() {
                    return Some(PrNumber::new(n));
                }
            }
        }
    }
    None
}

//! Dependency analysis for conflict investigation.
//!
//! When a cherry-pick conflicts, the usual cause is a missing prerequisite:
//! an earlier mainline change that touched the same file and was never
//! backported. The analyzer finds every merged change touching a file (or a
//! PR's changed-file set), classifies each one against the target branch
//! via ancestry, and recommends a backport order by merge timestamp —
//! earlier-merged changes are structurally more likely to be prerequisites
//! for later ones touching the same lines.
//!
//! Same-file co-modification clusters are a reporting grouping
//! ([`DependencyChain`]), not a dependency cycle: merge-timestamp total
//! ordering is inherently acyclic, so there is no cycle-breaking logic
//! here, deliberately. The analyzer performs no mutation.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use backport_git::Vcs;

use crate::error::{BackportError, Result};
use crate::github::ChangeStore;
use crate::model::{Change, ErrorKind, OpenPr, PrNumber, TargetBranch, ValidationError};

// ---------------------------------------------------------------------------
// Classifications
// ---------------------------------------------------------------------------

/// Where a change stands relative to the target branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The merge commit is reachable from the target tip.
    InTarget,
    /// Merged to the mainline but absent from the target.
    MissingFromTarget,
    /// Absent from the target, but an open cherry-pick PR already covers it.
    OpenCherryPick,
}

/// One analyzed change touching the file(s) in question.
#[derive(Clone, Debug, Serialize)]
pub struct Prerequisite {
    /// The change.
    pub change: PrNumber,
    /// Its title.
    pub title: String,
    /// When it merged.
    pub merged_at: DateTime<Utc>,
    /// Its standing against the target branch.
    pub classification: Classification,
    /// Why it was classified that way.
    pub reason: String,
    /// What to do about it.
    pub recommendation: String,
    /// The in-flight cherry-pick PR, for [`Classification::OpenCherryPick`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_cherry_pick: Option<PrNumber>,
}

/// Two changes that both modified one file, ordered by merge time.
#[derive(Clone, Debug, Serialize)]
pub struct FileDependencyEdge {
    /// The shared file.
    pub path: String,
    /// The earlier-merged change.
    pub earlier: PrNumber,
    /// The later-merged change.
    pub later: PrNumber,
    /// Merge time of the earlier change.
    pub earlier_merged_at: DateTime<Utc>,
    /// Merge time of the later change.
    pub later_merged_at: DateTime<Utc>,
    /// Whether the earlier change is reachable from the target tip.
    pub earlier_in_target: bool,
    /// Whether the later change is reachable from the target tip.
    pub later_in_target: bool,
}

/// A co-modification cluster: every analyzed change that touched one file,
/// in merge-timestamp order. A grouping for reporting, not a cycle.
#[derive(Clone, Debug, Serialize)]
pub struct DependencyChain {
    /// The shared file.
    pub path: String,
    /// Changes touching the file, merged-at ascending.
    pub links: Vec<PrNumber>,
    /// Human-readable description of the grouping.
    pub reason: String,
}

/// The analyzer's result: classifications, recommended order, groupings.
#[derive(Clone, Debug, Serialize)]
pub struct DependencyReport {
    /// Target branch name.
    pub target: String,
    /// The analyzed file, in file mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// The analyzed PR, in PR mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr: Option<PrNumber>,
    /// The analyzed PR's title, in PR mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_title: Option<String>,
    /// Files examined (the PR's changed files, in PR mode).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files_analyzed: Vec<String>,
    /// Every relevant change, merged-at ascending.
    pub prerequisites: Vec<Prerequisite>,
    /// Changes to backport, in order; `missing_from_target` only.
    pub backport_order: Vec<PrNumber>,
    /// Per-file co-modification edges.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<FileDependencyEdge>,
    /// Per-file co-modification clusters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chains: Vec<DependencyChain>,
}

/// What to analyze: a file path or a merged PR's changed-file set.
#[derive(Clone, Debug)]
pub enum AnalysisInput {
    /// One repository-relative file path.
    File(String),
    /// A merged PR, translated to its changed files.
    Change(PrNumber),
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Read-only dependency analysis over one target branch.
pub struct DependencyAnalyzer<'a, V: Vcs + ?Sized, S: ChangeStore + ?Sized> {
    vcs: &'a V,
    store: &'a S,
    remote: String,
    mainline: String,
}

impl<'a, V: Vcs + ?Sized, S: ChangeStore + ?Sized> DependencyAnalyzer<'a, V, S> {
    /// Build an analyzer session.
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

    /// Analyze which merged changes touched the input's file(s) and are
    /// missing from `target`.
    ///
    /// # Errors
    /// Fails on service errors, on an unmerged PR input, and on an
    /// unresolvable target branch.
    pub fn analyze(
        &self,
        input: &AnalysisInput,
        target: &TargetBranch,
        merged_after: Option<DateTime<Utc>>,
    ) -> Result<DependencyReport> {
        // One fetch of the target ref up front; every ancestry answer in
        // this analysis is relative to that snapshot.
        self.vcs.fetch(&self.remote, target.name())?;
        let target_ref = target.remote_ref(&self.remote);

        let (files, pr, pr_title) = match input {
            AnalysisInput::File(path) => (vec![path.clone()], None, None),
            AnalysisInput::Change(number) => {
                let change = self.store.get_change(*number)?;
                if change.changed_files.is_empty() {
                    return Err(BackportError::Service {
                        context: format!("PR #{number}"),
                        detail: "no changed files reported".to_owned(),
                    });
                }
                (change.changed_files, Some(*number), Some(change.title))
            }
        };

        let candidates = self.store.list_merged(&self.mainline, merged_after)?;
        let open_prs = self.store.list_open_prs(target.name())?;

        // One changed-files query per candidate, shared across all files.
        // The analyzed PR is the thing being backported, not its own
        // prerequisite, so it is dropped from the candidate set.
        let mut candidate_files: Vec<(&Change, Vec<String>)> = Vec::new();
        for candidate in &candidates {
            if pr == Some(candidate.number) {
                continue;
            }
            candidate_files.push((candidate, self.store.changed_files(candidate.number)?));
        }

        let mut touched: Vec<(String, Vec<Change>)> = Vec::new();
        for file in &files {
            let mut touching: Vec<Change> = candidate_files
                .iter()
                .filter(|(_, changed)| changed.contains(file))
                .map(|(candidate, _)| (*candidate).clone())
                .collect();
            touching.sort_by_key(|c| c.merged_at);
            touched.push((file.clone(), touching));
        }

        // Classify each distinct change once.
        let mut prerequisites: Vec<Prerequisite> = Vec::new();
        let mut in_target_cache: std::collections::HashMap<PrNumber, bool> =
            std::collections::HashMap::new();
        for (_, touching) in &touched {
            for change in touching {
                if prerequisites.iter().any(|p| p.change == change.number) {
                    continue;
                }
                let in_target = self.vcs.is_ancestor(&change.merge_commit, &target_ref)?;
                in_target_cache.insert(change.number, in_target);
                prerequisites.push(classify(change, in_target, &open_prs, target.name()));
            }
        }
        prerequisites.sort_by_key(|p| p.merged_at);

        let backport_order: Vec<PrNumber> = prerequisites
            .iter()
            .filter(|p| p.classification == Classification::MissingFromTarget)
            .map(|p| p.change)
            .collect();

        let (edges, chains) = build_groupings(&touched, &in_target_cache);

        Ok(DependencyReport {
            target: target.name().to_owned(),
            file: match input {
                AnalysisInput::File(path) => Some(path.clone()),
                AnalysisInput::Change(_) => None,
            },
            pr,
            pr_title,
            files_analyzed: if pr.is_some() { files } else { Vec::new() },
            prerequisites,
            backport_order,
            edges,
            chains,
        })
    }
}

fn classify(
    change: &Change,
    in_target: bool,
    open_prs: &[OpenPr],
    target: &str,
) -> Prerequisite {
    if in_target {
        return Prerequisite {
            change: change.number,
            title: change.title.clone(),
            merged_at: change.merged_at,
            classification: Classification::InTarget,
            reason: format!("Already backported to {target}"),
            recommendation: "already present".to_owned(),
            open_cherry_pick: None,
        };
    }
    if let Some(open) = open_prs
        .iter()
        .find(|pr| pr.references_cherry_pick_of(change.number))
    {
        return Prerequisite {
            change: change.number,
            title: change.title.clone(),
            merged_at: change.merged_at,
            classification: Classification::OpenCherryPick,
            reason: format!(
                "Cherry-pick PR #{} is open — already in flight for {target}",
                open.number
            ),
            recommendation: format!("wait for open cherry-pick #{}", open.number),
            open_cherry_pick: Some(open.number),
        };
    }
    Prerequisite {
        change: change.number,
        title: change.title.clone(),
        merged_at: change.merged_at,
        classification: Classification::MissingFromTarget,
        reason: format!("Merged to main but commit not in {target}"),
        recommendation: format!("backport #{} first", change.number),
        open_cherry_pick: None,
    }
}

fn build_groupings(
    touched: &[(String, Vec<Change>)],
    in_target: &std::collections::HashMap<PrNumber, bool>,
) -> (Vec<FileDependencyEdge>, Vec<DependencyChain>) {
    let mut edges = Vec::new();
    let mut chains = Vec::new();
    for (path, touching) in touched {
        if touching.len() < 2 {
            continue;
        }
        for pair in touching.windows(2) {
            edges.push(FileDependencyEdge {
                path: path.clone(),
                earlier: pair[0].number,
                later: pair[1].number,
                earlier_merged_at: pair[0].merged_at,
                later_merged_at: pair[1].merged_at,
                earlier_in_target: in_target.get(&pair[0].number).copied().unwrap_or(false),
                later_in_target: in_target.get(&pair[1].number).copied().unwrap_or(false),
            });
        }
        chains.push(DependencyChain {
            path: path.clone(),
            links: touching.iter().map(|c| c.number).collect(),
            reason: format!(
                "{} changes modified {path}; backport them oldest-merged first",
                touching.len()
            ),
        });
    }
    (edges, chains)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

impl DependencyReport {
    /// Human-readable rendering.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== PR Dependency Analysis ===");
        let _ = writeln!(out);
        if let Some(file) = &self.file {
            let _ = writeln!(out, "File analyzed: {file}");
        }
        if let Some(pr) = self.pr {
            let _ = writeln!(out, "PR analyzed: #{pr}");
            if let Some(title) = &self.pr_title {
                let _ = writeln!(out, "PR title: {title}");
            }
        }
        let _ = writeln!(out, "Target branch: {}", self.target);
        if !self.files_analyzed.is_empty() {
            let _ = writeln!(out, "Files modified: {}", self.files_analyzed.len());
        }
        let _ = writeln!(out);

        let missing = self.count(Classification::MissingFromTarget);
        let present = self.count(Classification::InTarget);
        let in_flight = self.count(Classification::OpenCherryPick);
        let _ = writeln!(out, "PRs touching the analyzed file(s): {}", self.prerequisites.len());
        let _ = writeln!(out, "  - Missing from target: {missing}");
        let _ = writeln!(out, "  - Already backported: {present}");
        let _ = writeln!(out, "  - Pending backport: {in_flight}");
        let _ = writeln!(out);

        for p in &self.prerequisites {
            if p.classification == Classification::InTarget {
                continue;
            }
            let _ = writeln!(out, "  PR #{}: {}", p.change, p.title);
            let _ = writeln!(out, "    Reason: {}", p.reason);
            let _ = writeln!(out, "    Action: {}", p.recommendation);
        }

        if self.backport_order.is_empty() {
            let _ = writeln!(out, "No missing prerequisites - safe to backport!");
        } else {
            let order: Vec<String> = self.backport_order.iter().map(|n| format!("#{n}")).collect();
            let _ = writeln!(out, "Suggested backport order: {}", order.join(" -> "));
        }
        out
    }

    fn count(&self, classification: Classification) -> usize {
        self.prerequisites
            .iter()
            .filter(|p| p.classification == classification)
            .count()
    }
}

/// Parse a `--merged-after` cutoff (`YYYY-MM-DD`, midnight UTC).
///
/// # Errors
/// Returns a validation error for anything that is not an ISO date.
pub fn parse_merged_after(raw: &str) -> Result<DateTime<Utc>> {
    let date = chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        BackportError::Validation(ValidationError {
            kind: ErrorKind::Date,
            value: raw.to_owned(),
            reason: "date must be ISO format YYYY-MM-DD".to_owned(),
        })
    })?;
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
}

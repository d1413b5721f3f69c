//! Batch result reporting.
//!
//! [`BatchReport`] is the per-invocation result the engine hands back:
//! one entry per change, partitioned into success/conflict/skipped/failed,
//! plus the ordering warning when the fallback order was used. Rendering
//! is either human-readable text or JSON straight off the serde shapes.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::model::{OperationStatus, PrNumber};

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Output format for structured data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-parseable JSON.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("invalid format '{other}'. Use: text or json")),
        }
    }
}

impl OutputFormat {
    /// Serialize `data` as pretty JSON.
    ///
    /// # Errors
    /// Fails only if the value cannot be represented as JSON.
    pub fn to_json<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(data)
    }
}

// ---------------------------------------------------------------------------
// BatchReport
// ---------------------------------------------------------------------------

/// One change's outcome within a batch.
#[derive(Clone, Debug, Serialize)]
pub struct BatchEntry {
    /// The change this entry describes.
    pub change: PrNumber,
    /// The change's title, for human output.
    pub title: String,
    /// Terminal status (or `Pending` for dry-run would-process entries).
    pub status: OperationStatus,
    /// One-line outcome description.
    pub message: String,
    /// The derived backport branch, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Worktree path, when one was created and survives or mattered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    /// Conflicted paths; non-empty exactly for conflicts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicted_files: Vec<PathBuf>,
    /// The created cherry-pick PR, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_pr: Option<PrNumber>,
    /// Dry-run marker: this change would be processed by a real run.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub would_process: bool,
}

/// Outcome counts across a batch.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct BatchCounts {
    /// Entries in total.
    pub total: usize,
    /// Cherry-pick PRs created.
    pub succeeded: usize,
    /// Conflicts needing a human.
    pub conflicts: usize,
    /// Skipped (already present, or declined).
    pub skipped: usize,
    /// Per-change failures.
    pub failed: usize,
}

/// The per-invocation result report.
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    /// Target branch name.
    pub target: String,
    /// The target branch tip the batch was measured against, when it
    /// resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_tip: Option<String>,
    /// True for dry runs: entries are predictions, no side effects occurred.
    pub dry_run: bool,
    /// Ordering warning when the merge-timestamp fallback was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_warning: Option<String>,
    /// Set when a mid-batch service failure aborted the remainder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    /// One entry per change, in processing order.
    pub entries: Vec<BatchEntry>,
    /// Outcome counts.
    pub counts: BatchCounts,
}

impl BatchReport {
    /// Recompute [`BatchCounts`] from the entries.
    pub fn tally(&mut self) {
        let mut counts = BatchCounts {
            total: self.entries.len(),
            ..BatchCounts::default()
        };
        for entry in &self.entries {
            match entry.status {
                OperationStatus::Success => counts.succeeded += 1,
                OperationStatus::Conflict => counts.conflicts += 1,
                OperationStatus::Skipped => counts.skipped += 1,
                OperationStatus::Failed => counts.failed += 1,
                OperationStatus::Pending => {}
            }
        }
        self.counts = counts;
    }

    /// Exit code for the invocation: 3 when anything conflicted, failed, or
    /// the batch aborted; 1 when nothing was processed at all; 0 otherwise.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.counts.conflicts > 0 || self.counts.failed > 0 || self.aborted.is_some() {
            3
        } else if self.counts.total == 0 {
            1
        } else {
            0
        }
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if self.dry_run {
            let _ = writeln!(out, "Dry run against {}; no changes were made.", self.target);
        } else {
            let _ = writeln!(out, "Backport results for {}:", self.target);
        }
        if let Some(warning) = &self.order_warning {
            let _ = writeln!(out, "warning: {warning}");
        }
        let _ = writeln!(out);
        for entry in &self.entries {
            let marker = match entry.status {
                OperationStatus::Success => "ok",
                OperationStatus::Conflict => "conflict",
                OperationStatus::Skipped => "skipped",
                OperationStatus::Failed => "failed",
                OperationStatus::Pending => "would process",
            };
            let _ = writeln!(
                out,
                "  #{} [{marker}] {} — {}",
                entry.change, entry.title, entry.message
            );
            if let Some(pr) = entry.created_pr {
                let _ = writeln!(out, "      cherry-pick PR: #{pr}");
            }
            for path in &entry.conflicted_files {
                let _ = writeln!(out, "      conflicted: {}", path.display());
            }
            if let Some(path) = &entry.worktree_path {
                let _ = writeln!(out, "      worktree: {}", path.display());
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "total: {}  created: {}  conflicts: {}  skipped: {}  errors: {}",
            self.counts.total,
            self.counts.succeeded,
            self.counts.conflicts,
            self.counts.skipped,
            self.counts.failed
        );
        if let Some(aborted) = &self.aborted {
            let _ = writeln!(out, "aborted: {aborted}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: OperationStatus) -> BatchEntry {
        BatchEntry {
            change: PrNumber::new(1),
            title: "t".to_owned(),
            status,
            message: "m".to_owned(),
            branch: None,
            worktree_path: None,
            conflicted_files: vec![],
            created_pr: None,
            would_process: false,
        }
    }

    fn report(entries: Vec<BatchEntry>) -> BatchReport {
        let mut report = BatchReport {
            target: "release/1.0".to_owned(),
            target_tip: None,
            dry_run: false,
            order_warning: None,
            aborted: None,
            entries,
            counts: BatchCounts::default(),
        };
        report.tally();
        report
    }

    #[test]
    fn tally_partitions_outcomes() {
        let report = report(vec![
            entry(OperationStatus::Success),
            entry(OperationStatus::Conflict),
            entry(OperationStatus::Skipped),
            entry(OperationStatus::Skipped),
            entry(OperationStatus::Failed),
        ]);
        assert_eq!(report.counts.total, 5);
        assert_eq!(report.counts.succeeded, 1);
        assert_eq!(report.counts.conflicts, 1);
        assert_eq!(report.counts.skipped, 2);
        assert_eq!(report.counts.failed, 1);
        assert_eq!(report.exit_code(), 3);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(report(vec![]).exit_code(), 1);
        assert_eq!(report(vec![entry(OperationStatus::Success)]).exit_code(), 0);
        assert_eq!(report(vec![entry(OperationStatus::Skipped)]).exit_code(), 0);
    }

    #[test]
    fn json_omits_empty_fields() {
        let json = OutputFormat::to_json(&report(vec![entry(OperationStatus::Success)])).unwrap();
        assert!(json.contains("\"entries\""));
        assert!(!json.contains("worktree_path"));
        assert!(!json.contains("would_process"));
    }
}

//! PR metadata service: the GitHub side of the system.
//!
//! Defines [`ChangeStore`] — the trait the engine and analyzer consume —
//! and [`GhCli`], the implementation backed by the `gh` CLI. Like the git
//! gateway, every call is a deadline-bounded subprocess, and tests
//! substitute an in-memory store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use backport_git::proc::{self, ProcError};
use backport_git::CommitSha;

use crate::error::{BackportError, Result};
use crate::model::{Change, ChangeState, Label, OpenPr, PrNumber};

/// JSON fields requested from `gh pr view` / `gh pr list`.
const PR_FIELDS: &str = "number,title,body,url,state,mergedAt,mergeCommit,labels,author";

/// Hard cap on list queries; matches gh's maximum page size usage in the
/// scripts this replaces.
const LIST_LIMIT: &str = "1000";

// ---------------------------------------------------------------------------
// ChangeStore trait
// ---------------------------------------------------------------------------

/// The PR metadata interface consumed by the engine and analyzer.
pub trait ChangeStore {
    /// Fetch one change by number.
    ///
    /// # Errors
    /// [`BackportError::ChangeNotFound`] if the PR does not exist,
    /// [`BackportError::NotMerged`] if it exists but is not merged.
    fn get_change(&self, number: PrNumber) -> Result<Change>;

    /// All merged changes on `base` carrying `label`. Unmerged PRs that
    /// carry the label are silently ignored.
    ///
    /// # Errors
    /// Fails on metadata service errors.
    fn list_merged_by_label(&self, base: &str, label: &Label) -> Result<Vec<Change>>;

    /// All merged changes on `base`, optionally only those merged after
    /// `merged_after`.
    ///
    /// # Errors
    /// Fails on metadata service errors.
    fn list_merged(
        &self,
        base: &str,
        merged_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Change>>;

    /// Paths modified by a PR.
    ///
    /// # Errors
    /// Fails on metadata service errors.
    fn changed_files(&self, number: PrNumber) -> Result<Vec<String>>;

    /// Open PRs whose base branch is `base`.
    ///
    /// # Errors
    /// Fails on metadata service errors.
    fn list_open_prs(&self, base: &str) -> Result<Vec<OpenPr>>;

    /// Create a PR and return its number.
    ///
    /// # Errors
    /// Fails on metadata service errors.
    fn create_pr(&self, base: &str, head: &str, title: &str, body: &str) -> Result<PrNumber>;
}

// ---------------------------------------------------------------------------
// GhCli
// ---------------------------------------------------------------------------

/// [`ChangeStore`] backed by the `gh` CLI.
pub struct GhCli {
    /// `owner/repo` for `-R`; `None` means gh's current-repository logic.
    repo: Option<String>,
    /// Per-command deadline.
    timeout: Duration,
}

impl GhCli {
    /// Create a gh-backed store.
    #[must_use]
    pub const fn new(repo: Option<String>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    /// Run gh, fail on non-zero exit, and return stdout.
    fn gh(&self, args: &[&str]) -> Result<String> {
        let mut full: Vec<&str> = args.to_vec();
        if let Some(repo) = &self.repo {
            full.push("-R");
            full.push(repo);
        }
        let command = proc::render_command("gh", &full);
        let out = proc::run("gh", &full, None, self.timeout).map_err(|e| match e {
            ProcError::Timeout { command, .. } => BackportError::Service {
                context: command,
                detail: "timed out".to_owned(),
            },
            ProcError::Io { command, source } => BackportError::Service {
                context: command,
                detail: source.to_string(),
            },
        })?;
        if out.success {
            Ok(out.stdout)
        } else {
            Err(BackportError::Service {
                context: command,
                detail: out.stderr,
            })
        }
    }
}

impl ChangeStore for GhCli {
    fn get_change(&self, number: PrNumber) -> Result<Change> {
        let n = number.to_string();
        let raw = match self.gh(&["pr", "view", &n, "--json", PR_FIELDS]) {
            Ok(raw) => raw,
            Err(BackportError::Service { detail, context }) => {
                // gh reports a missing PR as an error; surface it as the
                // per-change condition rather than a service failure.
                let lower = detail.to_lowercase();
                if lower.contains("could not resolve") || lower.contains("no pull requests") {
                    return Err(BackportError::ChangeNotFound { number, detail });
                }
                return Err(BackportError::Service { detail, context });
            }
            Err(e) => return Err(e),
        };
        let pr: RawPr = parse_json(&raw, "gh pr view")?;
        let mut change = pr.into_change()?;
        change.changed_files = self.changed_files(number)?;
        Ok(change)
    }

    fn list_merged_by_label(&self, base: &str, label: &Label) -> Result<Vec<Change>> {
        let raw = self.gh(&[
            "pr", "list", "--state", "merged", "--base", base, "--label",
            label.as_str(), "--limit", LIST_LIMIT, "--json", PR_FIELDS,
        ])?;
        let prs: Vec<RawPr> = parse_json(&raw, "gh pr list")?;
        collect_merged(prs)
    }

    fn list_merged(
        &self,
        base: &str,
        merged_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Change>> {
        let raw = self.gh(&[
            "pr", "list", "--state", "merged", "--base", base, "--limit", LIST_LIMIT,
            "--json", PR_FIELDS,
        ])?;
        let prs: Vec<RawPr> = parse_json(&raw, "gh pr list")?;
        let mut changes = collect_merged(prs)?;
        if let Some(cutoff) = merged_after {
            changes.retain(|c| c.merged_at >= cutoff);
        }
        Ok(changes)
    }

    fn changed_files(&self, number: PrNumber) -> Result<Vec<String>> {
        let n = number.to_string();
        let raw = self.gh(&["pr", "view", &n, "--json", "files"])?;
        let files: RawFiles = parse_json(&raw, "gh pr view --json files")?;
        Ok(files.files.into_iter().map(|f| f.path).collect())
    }

    fn list_open_prs(&self, base: &str) -> Result<Vec<OpenPr>> {
        let raw = self.gh(&[
            "pr", "list", "--state", "open", "--base", base, "--limit", LIST_LIMIT,
            "--json", "number,title,body,url",
        ])?;
        let prs: Vec<RawOpenPr> = parse_json(&raw, "gh pr list --state open")?;
        Ok(prs
            .into_iter()
            .map(|pr| OpenPr {
                number: PrNumber::new(pr.number),
                title: pr.title.unwrap_or_default(),
                body: pr.body.unwrap_or_default(),
                url: pr.url.unwrap_or_default(),
            })
            .collect())
    }

    fn create_pr(&self, base: &str, head: &str, title: &str, body: &str) -> Result<PrNumber> {
        let stdout = self.gh(&[
            "pr", "create", "--base", base, "--head", head, "--title", title, "--body", body,
        ])?;
        // gh pr create prints the PR URL on stdout; the number is the
        // trailing path segment.
        let url = stdout.trim();
        url.rsplit('/')
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .map(PrNumber::new)
            .ok_or_else(|| BackportError::Service {
                context: "gh pr create".to_owned(),
                detail: format!("could not parse PR number from output: {url}"),
            })
    }
}

fn collect_merged(prs: Vec<RawPr>) -> Result<Vec<Change>> {
    let mut changes = Vec::with_capacity(prs.len());
    for pr in prs {
        if pr.state.as_deref() != Some("MERGED") {
            tracing::debug!(number = pr.number, "skipping unmerged labeled PR");
            continue;
        }
        changes.push(pr.into_change()?);
    }
    Ok(changes)
}

fn parse_json<'a, T: Deserialize<'a>>(raw: &'a str, context: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| BackportError::Service {
        context: context.to_owned(),
        detail: format!("unexpected JSON: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Raw gh payloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPr {
    number: u64,
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
    state: Option<String>,
    merged_at: Option<DateTime<Utc>>,
    merge_commit: Option<RawMergeCommit>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    author: Option<RawAuthor>,
}

/// gh has emitted the merge commit both as a bare sha string and as an
/// object keyed `oid`; accept either.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMergeCommit {
    Text(String),
    Object { oid: String },
}

#[derive(Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Deserialize)]
struct RawAuthor {
    login: String,
}

#[derive(Deserialize)]
struct RawFiles {
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Deserialize)]
struct RawFile {
    path: String,
}

#[derive(Deserialize)]
struct RawOpenPr {
    number: u64,
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
}

impl RawPr {
    fn into_change(self) -> Result<Change> {
        let number = PrNumber::new(self.number);
        let state = self.state.unwrap_or_default();
        if state != "MERGED" {
            return Err(BackportError::NotMerged { number, state });
        }
        let merged_at = self.merged_at.ok_or_else(|| missing(number, "mergedAt"))?;
        let sha = match self.merge_commit.ok_or_else(|| missing(number, "mergeCommit"))? {
            RawMergeCommit::Text(s) | RawMergeCommit::Object { oid: s } => s,
        };
        let merge_commit =
            CommitSha::new(sha.trim()).map_err(|e| BackportError::Service {
                context: format!("PR #{number} merge commit"),
                detail: e.to_string(),
            })?;
        Ok(Change {
            number,
            title: self.title.unwrap_or_default().trim().to_owned(),
            body: self.body.unwrap_or_default().trim().to_owned(),
            url: self.url.unwrap_or_default().trim().to_owned(),
            merge_commit,
            merged_at,
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            author: self.author.map(|a| a.login).unwrap_or_default(),
            state: ChangeState::Merged,
            changed_files: Vec::new(),
        })
    }
}

fn missing(number: PrNumber, field: &str) -> BackportError {
    BackportError::Service {
        context: format!("PR #{number}"),
        detail: format!("missing {field} in gh response"),
    }
}

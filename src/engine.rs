//! The cherry-pick engine: per-change state machine and batch driver.
//!
//! One engine invocation owns a batch against one target branch. Changes
//! are processed strictly in resolved order — cherry-pick outcomes are
//! order-sensitive, and processing out of order can itself manufacture
//! spurious conflicts — so there is no in-process parallelism. A conflict
//! never halts the batch; a service-level failure aborts the remainder
//! while preserving every outcome already produced.
//!
//! The engine never touches the primary working directory: every attempt
//! happens in its own worktree, and retained worktrees stay independently
//! inspectable after the process exits.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;

use backport_git::{CherryPickApply, Vcs, WorktreeHandle};

use crate::error::{BackportError, Result};
use crate::github::ChangeStore;
use crate::model::{
    branch_for_change, AttemptOutcome, Change, CherryPickOperation, ErrorKind, Label,
    OperationStatus, PrNumber, SkipReason, TargetBranch, ValidationError, Version, WorktreeState,
};
use crate::ordering::resolve_order;
use crate::report::{BatchCounts, BatchEntry, BatchReport};
use crate::worktree::{
    manual_cleanup_instructions, retention, AttemptKind, Retention, WorktreeAllocator,
};

// ---------------------------------------------------------------------------
// Options, batch selection, prompting
// ---------------------------------------------------------------------------

/// Per-invocation engine options.
#[derive(Clone, Copy, Debug, Default)]
pub struct EngineOptions {
    /// Report the resolved order and duplicate detection, touch nothing.
    pub dry_run: bool,
    /// Keep worktrees after successful cherry-picks.
    pub keep_worktree: bool,
    /// Remove worktrees even after conflicts (destroys diagnostic state).
    pub force_cleanup: bool,
    /// Ask before creating each cherry-pick PR.
    pub confirm: bool,
}

/// How the batch's changes are selected.
#[derive(Clone, Debug)]
pub enum BatchSpec {
    /// Explicit PR numbers from the caller.
    Explicit(Vec<PrNumber>),
    /// Every merged mainline PR carrying the label.
    ByLabel(Label),
}

/// Interactive confirmation seam. The engine asks once per clean apply,
/// right before PR creation.
pub trait Prompter {
    /// True to proceed with PR creation for `change`.
    fn confirm(&mut self, change: &Change) -> bool;
}

/// Approves everything; used with `--no-confirm` and in pipelines.
pub struct AutoApprove;

impl Prompter for AutoApprove {
    fn confirm(&mut self, _change: &Change) -> bool {
        true
    }
}

/// Reads a y/N answer from stdin.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&mut self, change: &Change) -> bool {
        print!("Create cherry-pick PR for #{}? [y/N] ", change.number);
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Outcome of processing one change, plus a session-fatal error that
/// surfaced after side effects had already been recorded.
struct Processed {
    entry: BatchEntry,
    fatal: Option<BackportError>,
}

/// Drives a batch of cherry-pick operations against one target branch.
pub struct CherryPickEngine<'a, V: Vcs + ?Sized, S: ChangeStore + ?Sized> {
    vcs: &'a V,
    store: &'a S,
    allocator: WorktreeAllocator,
    remote: String,
    mainline: String,
    /// Session-scoped fetch-once cache: each `(remote, ref)` is fetched at
    /// most once per invocation, never re-fetched mid-run.
    fetched: HashSet<(String, String)>,
}

impl<'a, V: Vcs + ?Sized, S: ChangeStore + ?Sized> CherryPickEngine<'a, V, S> {
    /// Build an engine session.
    pub fn new(
        vcs: &'a V,
        store: &'a S,
        repo_root: &Path,
        remote: impl Into<String>,
        mainline: impl Into<String>,
    ) -> Self {
        Self {
            vcs,
            store,
            allocator: WorktreeAllocator::new(repo_root),
            remote: remote.into(),
            mainline: mainline.into(),
            fetched: HashSet::new(),
        }
    }

    /// Fetch a ref at most once per session.
    fn fetch_once(&mut self, refspec: &str) -> Result<()> {
        let key = (self.remote.clone(), refspec.to_owned());
        if self.fetched.contains(&key) {
            return Ok(());
        }
        self.vcs.fetch(&self.remote, refspec)?;
        self.fetched.insert(key);
        Ok(())
    }

    /// Run the batch and return the partitioned report.
    ///
    /// # Errors
    /// Fails outright only for conditions encountered before any change is
    /// processed: selection queries, the initial fetches, and the mainline
    /// log. Everything after that degrades to per-entry outcomes.
    pub fn run(
        &mut self,
        target: &TargetBranch,
        spec: &BatchSpec,
        opts: EngineOptions,
        prompter: &mut dyn Prompter,
    ) -> Result<BatchReport> {
        let version = target
            .version()
            .ok_or_else(|| {
                BackportError::Validation(ValidationError {
                    kind: ErrorKind::Branch,
                    value: target.name().to_owned(),
                    reason: "backport target must carry a version".to_owned(),
                })
            })?
            .clone();

        // Selection happens before the batch starts; a service failure
        // here is fatal and nothing has been mutated yet.
        let (changes, mut entries) = self.collect_changes(spec)?;

        // Ancestry checks are only valid against freshly fetched refs.
        let mainline = self.mainline.clone();
        self.fetch_once(&mainline)?;
        self.fetch_once(target.name())?;

        let mainline_ref = format!("{}/{}", self.remote, self.mainline);
        let log = self.vcs.first_parent_log(&mainline_ref)?;
        let resolved = resolve_order(changes, &mainline_ref, &log);
        let order_warning = resolved.warning().map(ToOwned::to_owned);

        let target_ref = target.remote_ref(&self.remote);
        let target_tip = self.vcs.rev_parse(&target_ref).ok();
        let mut aborted = None;

        for (index, change) in resolved.sequence.iter().enumerate() {
            if opts.dry_run {
                entries.push(self.dry_run_entry(change, &version, &target_ref));
                continue;
            }
            let fatal = match self.process_change(change, &version, target, &target_ref, opts, prompter)
            {
                Ok(Processed { entry, fatal }) => {
                    entries.push(entry);
                    fatal
                }
                Err(err) => {
                    entries.push(failed_entry(change, &err));
                    err.aborts_batch().then_some(err)
                }
            };
            if let Some(err) = fatal {
                tracing::error!(change = %change.number, error = %err, "aborting batch");
                let remaining = resolved.sequence.len() - index - 1;
                aborted = Some(format!(
                    "{err} — aborting the remaining {remaining} change(s)"
                ));
                break;
            }
        }

        let mut report = BatchReport {
            target: target.name().to_owned(),
            target_tip: target_tip.map(|sha| sha.to_string()),
            dry_run: opts.dry_run,
            order_warning,
            aborted,
            entries,
            counts: BatchCounts::default(),
        };
        report.tally();
        Ok(report)
    }

    /// Resolve the batch selection to eligible changes. Per-change
    /// conditions (missing, not merged) become failed entries; service
    /// failures abort with no side effects.
    fn collect_changes(&self, spec: &BatchSpec) -> Result<(Vec<Change>, Vec<BatchEntry>)> {
        match spec {
            BatchSpec::Explicit(numbers) => {
                let mut changes = Vec::with_capacity(numbers.len());
                let mut failed = Vec::new();
                for number in numbers {
                    match self.store.get_change(*number) {
                        Ok(change) => changes.push(change),
                        Err(
                            err @ (BackportError::ChangeNotFound { .. }
                            | BackportError::NotMerged { .. }),
                        ) => {
                            tracing::warn!(change = %number, "skipping ineligible change");
                            failed.push(blank_entry(
                                *number,
                                String::new(),
                                OperationStatus::Failed,
                                err.to_string(),
                            ));
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok((changes, failed))
            }
            BatchSpec::ByLabel(label) => {
                let changes = self.store.list_merged_by_label(&self.mainline, label)?;
                Ok((changes, Vec::new()))
            }
        }
    }

    /// Dry-run short-circuits before any worktree work: only the ancestry
    /// check runs, and the entry predicts what a real run would do.
    fn dry_run_entry(&self, change: &Change, version: &Version, target_ref: &str) -> BatchEntry {
        match self.vcs.is_ancestor(&change.merge_commit, target_ref) {
            Ok(true) => blank_entry(
                change.number,
                change.title.clone(),
                OperationStatus::Skipped,
                SkipReason::AlreadyInTarget.to_string(),
            ),
            Ok(false) => {
                let branch = branch_for_change(version, change.number);
                let mut entry = blank_entry(
                    change.number,
                    change.title.clone(),
                    OperationStatus::Pending,
                    format!("would cherry-pick onto {branch}"),
                );
                entry.branch = Some(branch);
                entry.would_process = true;
                entry
            }
            Err(err) => blank_entry(
                change.number,
                change.title.clone(),
                OperationStatus::Failed,
                format!("ancestry check failed: {err}"),
            ),
        }
    }

    /// Run the one-way state machine for a single change.
    ///
    /// Errors returned here occurred before any side effect for this
    /// change; later failures are folded into the entry, with any
    /// session-fatal error carried alongside it.
    fn process_change(
        &self,
        change: &Change,
        version: &Version,
        target: &TargetBranch,
        target_ref: &str,
        opts: EngineOptions,
        prompter: &mut dyn Prompter,
    ) -> Result<Processed> {
        let mut op = CherryPickOperation::begin(version, change.number, target.name(), Utc::now());
        tracing::info!(operation = %op.id, change = %change.number, "processing change");

        // Pending → Skipped: the change is already present. The ancestry
        // check always precedes the cherry-pick attempt, and no worktree
        // exists on this path.
        if self.vcs.is_ancestor(&change.merge_commit, target_ref)? {
            let outcome = AttemptOutcome::Skipped {
                reason: SkipReason::AlreadyInTarget,
            };
            op.complete(&outcome, Utc::now());
            return Ok(Processed {
                entry: entry_from(&op, change, &outcome, None),
                fatal: None,
            });
        }

        // Pending → attempt: allocate the isolated worktree at the target
        // tip and create the derived branch inside it.
        let wt_path = self.allocator.allocate()?;
        let worktree = self.vcs.worktree_add(&wt_path, target_ref)?;
        op.attach_worktree(wt_path);

        let (outcome, fatal) = match self.attempt(change, target, &worktree, &op.branch, opts, prompter)
        {
            Ok(outcome) => (outcome, None),
            Err(err) => {
                let failed = AttemptOutcome::Failed {
                    message: err.to_string(),
                };
                (failed, err.aborts_batch().then_some(err))
            }
        };

        op.complete(&outcome, Utc::now());
        let kind = match outcome {
            AttemptOutcome::Conflict { .. } => AttemptKind::Conflict,
            _ => AttemptKind::Success,
        };
        let retention_note = self.settle_worktree(&mut op, kind, opts);
        Ok(Processed {
            entry: entry_from(&op, change, &outcome, retention_note),
            fatal,
        })
    }

    /// Everything that happens inside the worktree: branch creation, the
    /// cherry-pick itself, and the clean-apply handoff to PR creation.
    fn attempt(
        &self,
        change: &Change,
        target: &TargetBranch,
        worktree: &WorktreeHandle,
        branch: &str,
        opts: EngineOptions,
        prompter: &mut dyn Prompter,
    ) -> Result<AttemptOutcome> {
        self.vcs.create_branch(worktree, branch, &target.remote_ref(&self.remote))?;
        match self.vcs.cherry_pick(worktree, &change.merge_commit)? {
            CherryPickApply::Conflict(paths) => {
                // Leave the worktree exactly as git left it; conflicts
                // always require a human.
                Ok(AttemptOutcome::Conflict { paths })
            }
            CherryPickApply::Clean => {
                self.vcs.push(worktree, &self.remote, branch)?;
                if opts.confirm && !prompter.confirm(change) {
                    return Ok(AttemptOutcome::Skipped {
                        reason: SkipReason::Declined,
                    });
                }
                let pr = self.store.create_pr(
                    target.name(),
                    branch,
                    &change.cherry_pick_title(),
                    &change.cherry_pick_body(),
                )?;
                tracing::info!(change = %change.number, cherry_pick_pr = %pr, "cherry-pick PR created");
                Ok(AttemptOutcome::Success {
                    created_pr: Some(pr),
                })
            }
        }
    }

    /// Apply the retention policy to the operation's worktree. Returns the
    /// manual-cleanup note when the worktree is retained for a conflict.
    fn settle_worktree(
        &self,
        op: &mut CherryPickOperation,
        kind: AttemptKind,
        opts: EngineOptions,
    ) -> Option<String> {
        let path = op.worktree.as_ref().map(|wt| wt.path.clone())?;
        match retention(kind, opts.keep_worktree, opts.force_cleanup) {
            Retention::Remove => {
                // A conflicted worktree is dirty; only force removes it.
                let force = kind == AttemptKind::Conflict;
                match self.vcs.worktree_remove(&path, force) {
                    Ok(()) => op.set_worktree_state(WorktreeState::Removed),
                    Err(err) => {
                        // Leave it for manual cleanup rather than failing
                        // an otherwise finished operation.
                        tracing::warn!(path = %path.display(), error = %err, "worktree removal failed");
                        op.set_worktree_state(WorktreeState::Retained);
                    }
                }
                None
            }
            Retention::Retain => {
                op.set_worktree_state(WorktreeState::Retained);
                (kind == AttemptKind::Conflict).then(|| manual_cleanup_instructions(&path))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry construction
// ---------------------------------------------------------------------------

fn blank_entry(
    change: PrNumber,
    title: String,
    status: OperationStatus,
    message: String,
) -> BatchEntry {
    BatchEntry {
        change,
        title,
        status,
        message,
        branch: None,
        worktree_path: None,
        conflicted_files: vec![],
        created_pr: None,
        would_process: false,
    }
}

fn entry_from(
    op: &CherryPickOperation,
    change: &Change,
    outcome: &AttemptOutcome,
    retention_note: Option<String>,
) -> BatchEntry {
    let mut message = match outcome {
        AttemptOutcome::Success { .. } => "Cherry-pick PR created".to_owned(),
        AttemptOutcome::Conflict { .. } => "Cherry-pick conflict".to_owned(),
        AttemptOutcome::Skipped { reason } => reason.to_string(),
        AttemptOutcome::Failed { message } => message.clone(),
    };
    if let Some(note) = retention_note {
        message.push('\n');
        message.push_str(&note);
    }
    // Surface the worktree path only while it is still on disk.
    let worktree_path = op
        .worktree
        .as_ref()
        .filter(|wt| wt.state == WorktreeState::Retained)
        .map(|wt| wt.path.clone());
    let mut entry = blank_entry(change.number, change.title.clone(), op.status, message);
    entry.branch = op.worktree.is_some().then(|| op.branch.clone());
    entry.worktree_path = worktree_path;
    entry.conflicted_files = op.conflicted_paths.clone();
    entry.created_pr = op.created_pr;
    entry
}

fn failed_entry(change: &Change, err: &BackportError) -> BatchEntry {
    blank_entry(
        change.number,
        change.title.clone(),
        OperationStatus::Failed,
        err.to_string(),
    )
}

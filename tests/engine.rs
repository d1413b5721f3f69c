//! Integration tests for the cherry-pick engine over fixture services.
//!
//! These cover the state machine and batch semantics without spawning a
//! single git or gh process.

mod common;

use std::collections::HashMap;
use std::path::PathBuf;

use common::{change, sha, FakeStore, FakeVcs};
use tempfile::TempDir;

use backport::engine::{BatchSpec, CherryPickEngine, EngineOptions, Prompter};
use backport::model::{Change, OperationStatus, PrNumber, TargetBranch};
use backport::report::BatchReport;

struct Deny;

impl Prompter for Deny {
    fn confirm(&mut self, _change: &Change) -> bool {
        false
    }
}

struct Approve;

impl Prompter for Approve {
    fn confirm(&mut self, _change: &Change) -> bool {
        true
    }
}

fn target() -> TargetBranch {
    TargetBranch::parse_backport_target("release/1.7.2511").unwrap()
}

fn run_batch(
    vcs: &FakeVcs,
    store: &FakeStore,
    numbers: &[u64],
    opts: EngineOptions,
) -> BatchReport {
    let dir = TempDir::new().unwrap();
    let mut engine = CherryPickEngine::new(vcs, store, dir.path(), "origin", "main");
    let spec = BatchSpec::Explicit(numbers.iter().copied().map(PrNumber::new).collect());
    engine
        .run(&target(), &spec, opts, &mut Approve)
        .expect("batch should not fail outright")
}

fn statuses(report: &BatchReport) -> Vec<(u64, OperationStatus)> {
    report
        .entries
        .iter()
        .map(|e| (e.change.get(), e.status))
        .collect()
}

#[test]
fn ancestor_change_is_skipped_with_zero_worktree_operations() {
    let mut store = FakeStore::new();
    store.insert(change(2680, sha('a'), 1));
    let vcs = FakeVcs {
        log: vec![sha('a')],
        ancestors: [sha('a')].into(),
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[2680], EngineOptions::default());

    assert_eq!(statuses(&report), vec![(2680, OperationStatus::Skipped)]);
    let calls = vcs.calls();
    assert_eq!(calls.worktree_add, 0);
    assert_eq!(calls.cherry_pick, 0);
    assert_eq!(store.created_count(), 0);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn clean_apply_pushes_branch_and_creates_pr() {
    let mut store = FakeStore::new();
    store.insert(change(2680, sha('a'), 1));
    let vcs = FakeVcs {
        log: vec![sha('a')],
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[2680], EngineOptions::default());

    assert_eq!(statuses(&report), vec![(2680, OperationStatus::Success)]);
    let entry = &report.entries[0];
    assert_eq!(entry.branch.as_deref(), Some("backport/1-7-2511/pr-2680"));
    assert_eq!(entry.created_pr, Some(PrNumber::new(9000)));

    let created = store.created.borrow();
    let (base, head, title, body) = &created[0];
    assert_eq!(base, "release/1.7.2511");
    assert_eq!(head, "backport/1-7-2511/pr-2680");
    assert!(title.contains("(cherry-pick from #2680)"));
    assert!(body.contains("Cherry-picked from #2680"));

    let calls = vcs.calls();
    assert_eq!(calls.push, 1);
    // Success without --keep-worktree removes the worktree.
    assert_eq!(calls.worktree_remove, 1);
    assert!(report.entries[0].worktree_path.is_none());
}

#[test]
fn conflict_reports_paths_retains_worktree_and_never_creates_a_pr() {
    let mut store = FakeStore::new();
    store.insert(change(2680, sha('a'), 1));
    let vcs = FakeVcs {
        log: vec![sha('a')],
        conflicts: HashMap::from([(sha('a'), vec![PathBuf::from("src/widget.rs")])]),
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[2680], EngineOptions::default());

    assert_eq!(statuses(&report), vec![(2680, OperationStatus::Conflict)]);
    let entry = &report.entries[0];
    assert!(!entry.conflicted_files.is_empty());
    assert!(entry.worktree_path.is_some());
    assert!(entry.message.contains("git worktree remove"));
    assert_eq!(store.created_count(), 0);
    assert_eq!(vcs.calls().push, 0);
    assert_eq!(vcs.calls().worktree_remove, 0);
    assert_eq!(report.exit_code(), 3);
}

#[test]
fn force_cleanup_removes_the_conflicted_worktree() {
    let mut store = FakeStore::new();
    store.insert(change(2680, sha('a'), 1));
    let vcs = FakeVcs {
        log: vec![sha('a')],
        conflicts: HashMap::from([(sha('a'), vec![PathBuf::from("src/widget.rs")])]),
        ..FakeVcs::default()
    };

    let opts = EngineOptions {
        force_cleanup: true,
        ..EngineOptions::default()
    };
    let report = run_batch(&vcs, &store, &[2680], opts);

    let calls = vcs.calls();
    assert_eq!(calls.worktree_remove, 1);
    assert_eq!(calls.forced_removes, 1);
    assert!(report.entries[0].worktree_path.is_none());
}

#[test]
fn keep_worktree_retains_after_success() {
    let mut store = FakeStore::new();
    store.insert(change(2680, sha('a'), 1));
    let vcs = FakeVcs {
        log: vec![sha('a')],
        ..FakeVcs::default()
    };

    let opts = EngineOptions {
        keep_worktree: true,
        ..EngineOptions::default()
    };
    let report = run_batch(&vcs, &store, &[2680], opts);

    assert_eq!(vcs.calls().worktree_remove, 0);
    assert!(report.entries[0].worktree_path.is_some());
}

#[test]
fn batch_continues_past_a_conflict() {
    let mut store = FakeStore::new();
    store.insert(change(101, sha('a'), 1));
    store.insert(change(205, sha('b'), 2));
    let vcs = FakeVcs {
        log: vec![sha('a'), sha('b')],
        conflicts: HashMap::from([(sha('a'), vec![PathBuf::from("src/widget.rs")])]),
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[101, 205], EngineOptions::default());

    assert_eq!(
        statuses(&report),
        vec![
            (101, OperationStatus::Conflict),
            (205, OperationStatus::Success),
        ]
    );
    assert!(report.aborted.is_none());
    assert_eq!(report.counts.conflicts, 1);
    assert_eq!(report.counts.succeeded, 1);
}

#[test]
fn batch_is_processed_in_first_parent_order_not_input_order() {
    let mut store = FakeStore::new();
    // Input order 300, 101, 205; first-parent positions 101 < 205 < 300.
    store.insert(change(300, sha('c'), 1));
    store.insert(change(101, sha('a'), 3));
    store.insert(change(205, sha('b'), 2));
    let vcs = FakeVcs {
        log: vec![sha('a'), sha('b'), sha('c')],
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[300, 101, 205], EngineOptions::default());

    let order: Vec<u64> = report.entries.iter().map(|e| e.change.get()).collect();
    assert_eq!(order, vec![101, 205, 300]);
    assert!(report.order_warning.is_none());
}

#[test]
fn unplaceable_merge_commit_falls_back_with_a_warning() {
    let mut store = FakeStore::new();
    store.insert(change(101, sha('a'), 2));
    store.insert(change(205, sha('f'), 1)); // not in the log
    let vcs = FakeVcs {
        log: vec![sha('a')],
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[101, 205], EngineOptions::default());

    let order: Vec<u64> = report.entries.iter().map(|e| e.change.get()).collect();
    // Fallback orders by merge timestamp for the whole batch.
    assert_eq!(order, vec![205, 101]);
    let warning = report.order_warning.expect("fallback must carry a warning");
    assert!(warning.contains("#205"));
}

#[test]
fn dry_run_reports_would_process_with_zero_side_effects() {
    let mut store = FakeStore::new();
    store.insert(change(1, sha('a'), 1));
    store.insert(change(2, sha('b'), 2));
    store.insert(change(3, sha('c'), 3));
    let vcs = FakeVcs {
        log: vec![sha('a'), sha('b'), sha('c')],
        ..FakeVcs::default()
    };

    let opts = EngineOptions {
        dry_run: true,
        ..EngineOptions::default()
    };
    let report = run_batch(&vcs, &store, &[1, 2, 3], opts);

    assert!(report.dry_run);
    assert_eq!(report.entries.len(), 3);
    assert!(report.entries.iter().all(|e| e.would_process));
    let calls = vcs.calls();
    assert_eq!(calls.worktree_add, 0);
    assert_eq!(calls.create_branch, 0);
    assert_eq!(calls.push, 0);
    assert_eq!(store.created_count(), 0);
    // Duplicate detection still ran for each change.
    assert_eq!(calls.is_ancestor, 3);
}

#[test]
fn dry_run_still_detects_duplicates() {
    let mut store = FakeStore::new();
    store.insert(change(1, sha('a'), 1));
    store.insert(change(2, sha('b'), 2));
    let vcs = FakeVcs {
        log: vec![sha('a'), sha('b')],
        ancestors: [sha('a')].into(),
        ..FakeVcs::default()
    };

    let opts = EngineOptions {
        dry_run: true,
        ..EngineOptions::default()
    };
    let report = run_batch(&vcs, &store, &[1, 2], opts);

    assert_eq!(
        statuses(&report),
        vec![(1, OperationStatus::Skipped), (2, OperationStatus::Pending)]
    );
    assert!(!report.entries[0].would_process);
    assert!(report.entries[1].would_process);
}

#[test]
fn rerun_over_a_fully_backported_set_is_idempotent() {
    let mut store = FakeStore::new();
    store.insert(change(1, sha('a'), 1));
    store.insert(change(2, sha('b'), 2));
    let vcs = FakeVcs {
        log: vec![sha('a'), sha('b')],
        ancestors: [sha('a'), sha('b')].into(),
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[1, 2], EngineOptions::default());

    assert!(report
        .entries
        .iter()
        .all(|e| e.status == OperationStatus::Skipped));
    let calls = vcs.calls();
    assert_eq!(calls.worktree_add, 0);
    assert_eq!(calls.create_branch, 0);
    assert_eq!(store.created_count(), 0);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn session_fatal_error_aborts_the_remainder_but_preserves_outcomes() {
    let mut store = FakeStore::new();
    store.insert(change(1, sha('a'), 1));
    store.insert(change(2, sha('b'), 2));
    store.insert(change(3, sha('c'), 3));
    let vcs = FakeVcs {
        log: vec![sha('a'), sha('b'), sha('c')],
        timeouts: [sha('b')].into(),
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[1, 2, 3], EngineOptions::default());

    // #1 succeeded, #2 failed on the timeout, #3 was never attempted.
    assert_eq!(
        statuses(&report),
        vec![(1, OperationStatus::Success), (2, OperationStatus::Failed)]
    );
    let aborted = report.aborted.as_deref().expect("batch must abort");
    assert!(aborted.contains("1 change(s)"));
    assert_eq!(report.exit_code(), 3);
}

#[test]
fn missing_change_becomes_a_failed_entry_and_the_batch_continues() {
    let mut store = FakeStore::new();
    store.insert(change(2, sha('b'), 2));
    let vcs = FakeVcs {
        log: vec![sha('b')],
        ..FakeVcs::default()
    };

    let report = run_batch(&vcs, &store, &[999, 2], EngineOptions::default());

    assert_eq!(
        statuses(&report),
        vec![(999, OperationStatus::Failed), (2, OperationStatus::Success)]
    );
    assert!(report.entries[0].message.contains("not found"));
    assert!(report.aborted.is_none());
}

#[test]
fn declined_confirmation_skips_pr_creation() {
    let mut store = FakeStore::new();
    store.insert(change(2680, sha('a'), 1));
    let vcs = FakeVcs {
        log: vec![sha('a')],
        ..FakeVcs::default()
    };

    let dir = TempDir::new().unwrap();
    let mut engine = CherryPickEngine::new(&vcs, &store, dir.path(), "origin", "main");
    let opts = EngineOptions {
        confirm: true,
        ..EngineOptions::default()
    };
    let report = engine
        .run(
            &target(),
            &BatchSpec::Explicit(vec![PrNumber::new(2680)]),
            opts,
            &mut Deny,
        )
        .unwrap();

    assert_eq!(statuses(&report), vec![(2680, OperationStatus::Skipped)]);
    assert_eq!(store.created_count(), 0);
    // The branch was pushed before the prompt, mirroring the manual flow.
    assert_eq!(vcs.calls().push, 1);
}

#[test]
fn label_selection_processes_the_labeled_set() {
    let mut store = FakeStore::new();
    store.insert(change(10, sha('a'), 1));
    store.insert(change(11, sha('b'), 2));
    store
        .labeled
        .insert("backport_1.7.2511".to_owned(), vec![10, 11]);
    let vcs = FakeVcs {
        log: vec![sha('a'), sha('b')],
        ..FakeVcs::default()
    };

    let dir = TempDir::new().unwrap();
    let mut engine = CherryPickEngine::new(&vcs, &store, dir.path(), "origin", "main");
    let version = target().version().unwrap().clone();
    let report = engine
        .run(
            &target(),
            &BatchSpec::ByLabel(version.backport_label()),
            EngineOptions::default(),
            &mut Approve,
        )
        .unwrap();

    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.counts.succeeded, 2);
}

#[test]
fn fetches_happen_once_per_ref_per_session() {
    let mut store = FakeStore::new();
    store.insert(change(1, sha('a'), 1));
    store.insert(change(2, sha('b'), 2));
    let vcs = FakeVcs {
        log: vec![sha('a'), sha('b')],
        ..FakeVcs::default()
    };

    run_batch(&vcs, &store, &[1, 2], EngineOptions::default());

    // One fetch for the mainline, one for the target — never per change.
    assert_eq!(vcs.calls().fetch, 2);
}

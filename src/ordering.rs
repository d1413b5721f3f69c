//! Deterministic processing order for a batch of changes.
//!
//! The authoritative order is the mainline's first-parent log: the position
//! of each change's merge commit in that log is the order the changes
//! actually landed. Squash/rebase ambiguity (a merge commit absent from the
//! first-parent log) switches the *entire* batch to a merge-timestamp total
//! order — found and not-found orderings are never mixed within one batch,
//! which would produce partially-consistent sequencing.

use std::collections::HashMap;

use backport_git::CommitSha;

use crate::model::Change;

/// How the processing sequence was derived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderProvenance {
    /// Every merge commit was found in the first-parent log; the sequence
    /// is in increasing first-parent position.
    FirstParent,
    /// At least one merge commit was missing from the log; the whole batch
    /// is ordered by `(merged_at, PR number)` instead. Surfaces as an
    /// `AmbiguousOrder` warning on the report.
    MergedAtFallback {
        /// Which changes could not be positioned, and why that matters.
        reason: String,
    },
}

/// A batch in its resolved processing order.
#[derive(Clone, Debug)]
pub struct ResolvedOrder {
    /// Changes, oldest-landed first.
    pub sequence: Vec<Change>,
    /// How the order was derived.
    pub provenance: OrderProvenance,
}

impl ResolvedOrder {
    /// The ambiguity warning, if the fallback ordering was used.
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match &self.provenance {
            OrderProvenance::FirstParent => None,
            OrderProvenance::MergedAtFallback { reason } => Some(reason),
        }
    }
}

/// Resolve the processing order for `changes` against the mainline's
/// first-parent log (oldest first, as produced by
/// [`Vcs::first_parent_log`](backport_git::Vcs::first_parent_log)).
#[must_use]
pub fn resolve_order(
    mut changes: Vec<Change>,
    mainline: &str,
    first_parent_log: &[CommitSha],
) -> ResolvedOrder {
    let positions: HashMap<&CommitSha, usize> = first_parent_log
        .iter()
        .enumerate()
        .map(|(i, sha)| (sha, i))
        .collect();

    let missing: Vec<&Change> = changes
        .iter()
        .filter(|c| !positions.contains_key(&c.merge_commit))
        .collect();

    if missing.is_empty() {
        changes.sort_by_key(|c| positions[&c.merge_commit]);
        return ResolvedOrder {
            sequence: changes,
            provenance: OrderProvenance::FirstParent,
        };
    }

    let unplaced: Vec<String> = missing.iter().map(|c| format!("#{}", c.number)).collect();
    let reason = format!(
        "merge commits of {} not found in the first-parent log of {mainline} \
         (squashed, rebased, or landed off the first-parent path); \
         ordering the whole batch by merge timestamp instead",
        unplaced.join(", ")
    );
    tracing::warn!(%reason, "ambiguous commit order");

    changes.sort_by(|a, b| {
        a.merged_at
            .cmp(&b.merged_at)
            .then_with(|| a.number.cmp(&b.number))
    });
    ResolvedOrder {
        sequence: changes,
        provenance: OrderProvenance::MergedAtFallback { reason },
    }
}

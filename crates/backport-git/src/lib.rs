//! Git abstraction layer for backport-train.
//!
//! This crate defines the [`Vcs`] trait — the single interface through which
//! the rest of the workspace interacts with git. Nothing outside this crate
//! spawns a `git` process directly; callers depend on `backport-git` and
//! program against the trait, so tests can substitute an in-memory double.
//!
//! # Crate layout
//!
//! - [`vcs`] — the [`Vcs`] trait definition.
//! - [`types`] — value types used in trait signatures ([`CommitSha`],
//!   [`WorktreeHandle`], [`CherryPickApply`]).
//! - [`error`] — the [`GitError`] enum returned by all trait methods.
//! - [`proc`] — deadline-bounded subprocess plumbing, shared with the `gh`
//!   wrapper in the root crate.

pub mod error;
pub mod proc;
pub mod types;
pub mod vcs;

mod cli;

pub use cli::GitCli;

// Re-export the main trait and commonly used types at the crate root for
// ergonomic imports: `use backport_git::{Vcs, CommitSha, GitError};`
pub use error::GitError;
pub use types::{CherryPickApply, CommitSha, ShaParseError, WorktreeHandle};
pub use vcs::Vcs;

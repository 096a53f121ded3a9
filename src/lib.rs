//! review-follow - keep review changes synchronized with a moving review target
//!
//! A review change on a long-lived review branch carries two machine-readable
//! commit-message trailers: one naming the revision it is reviewing against
//! (the review target) and one holding an ignore-pattern style file selection
//! (the review files). This crate recomputes the change's tree whenever the
//! target moves: shared subtrees are reused verbatim, the file filter decides
//! per path whether content comes from the target or stays with the parent,
//! and the exact set of added/updated/removed paths is reported.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to update)
//! - [`update`] - Orchestrates resolve → merge → diff → commit for one change
//! - [`merge`] - Tree merge engine over content-addressed tree objects
//! - [`filter`] - Ignore-pattern path filter (include / exclude / no-match)
//! - [`trailer`] - Commit-message trailer parsing and rewriting
//! - [`version`] - Human-readable labels for commits from the ref index
//! - [`change`] - Change store boundary (revision records, rebase lookup)
//! - [`core`] - Domain types and configuration
//! - [`git`] - Single interface for all git object store operations
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! 1. Tree and commit objects are immutable; a new logical state is always a
//!    new object, never an in-place edit
//! 2. Reference rebinding happens only inside the change store, as a single
//!    compare-and-swap
//! 3. An update that changes nothing creates no new revision
//! 4. Policy problems (missing trailer, unknown target, wrong branch) are
//!    reported as neutral outcomes, never as faults

pub mod change;
pub mod cli;
pub mod core;
pub mod filter;
pub mod git;
pub mod merge;
pub mod trailer;
pub mod ui;
pub mod update;
pub mod version;

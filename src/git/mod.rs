//! git
//!
//! Single interface for all git object store operations.
//!
//! All repository reads and writes flow through [`Git`]; no other module
//! imports `git2` directly. This keeps error handling consistent, puts
//! strong types at the boundary, and gives ref mutations compare-and-swap
//! semantics.

mod interface;

pub use interface::{CommitInfo, FileMode, Git, GitError, RefEntry, TreeEntry};

//! ui
//!
//! Terminal output helpers.

pub mod output;

pub use output::{debug, error, print, warn, Verbosity};

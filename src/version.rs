//! version
//!
//! Symbolic version labels for commits.
//!
//! A commit's label is the name of a ref pointing at it, filtered by a
//! configurable prefix (a release tag namespace in the usual setup) and
//! shortened by stripping a drop prefix. A commit nothing points at is
//! labeled by an abbreviation of its own id so the field is never empty.

use crate::core::types::Oid;
use crate::git::{Git, GitError};

/// Abbreviation length for the fallback label.
const SHORT_ID_LEN: usize = 12;

/// Resolve a human-readable label for `commit`.
///
/// Scans refs whose peeled target is `commit` and returns the first whose
/// name starts with `prefix`, with `drop_prefix` stripped when it applies.
/// No ordering is imposed among multiple matching refs; any exact match is
/// an equally valid label. Falls back to a fixed-length abbreviation of the
/// commit id when no ref qualifies.
pub fn resolve_label(
    git: &Git,
    commit: &Oid,
    prefix: &str,
    drop_prefix: &str,
) -> Result<String, GitError> {
    for name in git.refs_pointing_at(commit)? {
        let name = name.as_str();
        if let Some(label) = match_label(name, prefix, drop_prefix) {
            return Ok(label);
        }
    }

    Ok(commit.short(SHORT_ID_LEN).to_string())
}

fn match_label(name: &str, prefix: &str, drop_prefix: &str) -> Option<String> {
    if !name.starts_with(prefix) {
        return None;
    }
    match name.strip_prefix(drop_prefix) {
        Some(stripped) => Some(stripped.to_string()),
        None => Some(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_prefix_stripped() {
        assert_eq!(
            match_label("refs/tags/v1.2.0", "refs/tags/", "refs/tags/"),
            Some("v1.2.0".to_string())
        );
    }

    #[test]
    fn prefix_mismatch_skipped() {
        assert_eq!(match_label("refs/heads/main", "refs/tags/", "refs/tags/"), None);
    }

    #[test]
    fn drop_prefix_not_applying_keeps_full_name() {
        assert_eq!(
            match_label("refs/tags/v1", "refs/", "refs/tags/x/"),
            Some("refs/tags/v1".to_string())
        );
    }
}

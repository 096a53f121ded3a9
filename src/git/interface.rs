//! git::interface
//!
//! Git object store access implemented with git2.
//!
//! The [`Git`] struct is the only way to interact with a repository. One
//! instance owns one reader/writer session: it is used by a single update at
//! a time and never shared across concurrent requests. Tree and commit
//! objects are immutable and content-addressed, so concurrent sessions for
//! different changes can at worst redundantly write identical objects.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: not inside a git repository
//! - [`GitError::RefNotFound`]: requested ref does not exist
//! - [`GitError::ObjectNotFound`]: requested object does not exist
//! - [`GitError::CasFailed`]: compare-and-swap precondition failed

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{Oid, RefName, TypeError};

/// Errors from git object store operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in the store.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Compare-and-swap precondition failed.
    ///
    /// The ref's current value did not match the expected value. This is the
    /// correctness guard for revision pointer rebinding.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    fn internal(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// File mode of a tree entry.
///
/// Distinguishes regular files, executables, symbolic links, subtrees, and
/// submodule (gitlink) entries. An absent entry is represented by
/// `Option::None` at the call sites, not by a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file (0100644)
    Blob,
    /// Executable file (0100755)
    Executable,
    /// Symbolic link (0120000)
    Link,
    /// Subtree (0040000)
    Tree,
    /// Submodule commit reference (0160000)
    Commit,
}

impl FileMode {
    /// Decode a raw git mode. Returns `None` for unrecognized modes.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0o040000 => Some(FileMode::Tree),
            0o100644 => Some(FileMode::Blob),
            0o100755 => Some(FileMode::Executable),
            0o120000 => Some(FileMode::Link),
            0o160000 => Some(FileMode::Commit),
            _ => None,
        }
    }

    /// The raw git mode bits.
    pub fn raw(self) -> i32 {
        match self {
            FileMode::Tree => 0o040000,
            FileMode::Blob => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Link => 0o120000,
            FileMode::Commit => 0o160000,
        }
    }

    /// Whether this entry is a subtree.
    pub fn is_tree(self) -> bool {
        matches!(self, FileMode::Tree)
    }
}

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Entry name (single path component)
    pub name: String,
    /// Entry kind
    pub mode: FileMode,
    /// Referenced object
    pub oid: Oid,
}

/// A ref with its name and target OID.
#[derive(Debug, Clone)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The OID the ref points to
    pub oid: Oid,
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// The commit's tree
    pub tree: Oid,
    /// Parent commits, in order
    pub parents: Vec<Oid>,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub author_time: chrono::DateTime<chrono::Utc>,
}

/// The git object store interface.
///
/// Bare repositories are fully supported; a review server's stores have no
/// working directory.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening
    // =========================================================================

    /// Open a repository at or above the given path.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        Ok(Self { repo })
    }

    /// Path to the `.git` directory (the repository itself when bare).
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    // =========================================================================
    // Ref Resolution and Enumeration
    // =========================================================================

    /// Resolve a ref to its target commit OID.
    ///
    /// Peels through symbolic refs and tags.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Resolve a ref, returning `None` if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve a commit id or ref by full or short name.
    ///
    /// A full hex object id is looked up directly. Otherwise tries the name
    /// as given, then under `refs/`, `refs/tags/`, and `refs/heads/`. A name
    /// that is not a well-formed ref in any of those spellings resolves to
    /// `None` rather than an error; trailer values are user-written text.
    pub fn try_resolve_name(&self, name: &str) -> Result<Option<Oid>, GitError> {
        if let Ok(oid) = Oid::new(name) {
            if self.find_commit(&oid).is_ok() {
                return Ok(Some(oid));
            }
        }
        let candidates = [
            name.to_string(),
            format!("refs/{name}"),
            format!("refs/tags/{name}"),
            format!("refs/heads/{name}"),
        ];
        for candidate in &candidates {
            match self.resolve_ref(candidate) {
                Ok(oid) => return Ok(Some(oid)),
                Err(
                    GitError::RefNotFound { .. }
                    | GitError::InvalidOid { .. }
                    | GitError::InvalidRefName { .. },
                ) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// List all refs matching a prefix.
    pub fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        let pattern = format!("{}*", prefix);
        let refs = self
            .repo
            .references_glob(&pattern)
            .map_err(GitError::internal)?;

        let mut entries = Vec::new();
        for reference in refs {
            let reference = reference.map_err(GitError::internal)?;

            let name = match reference.name() {
                Some(n) => n,
                None => continue, // Skip refs with non-UTF8 names
            };
            let ref_name = match RefName::new(name) {
                Ok(r) => r,
                Err(_) => continue,
            };

            let oid = match reference.peel_to_commit() {
                Ok(commit) => commit.id(),
                Err(_) => match reference.target() {
                    Some(oid) => oid,
                    None => continue,
                },
            };
            let oid = match Oid::new(oid.to_string()) {
                Ok(o) => o,
                Err(_) => continue,
            };

            entries.push(RefEntry {
                name: ref_name,
                oid,
            });
        }

        Ok(entries)
    }

    /// Names of all refs whose peeled target is the given commit.
    ///
    /// This is the reference index used by version label resolution. No
    /// ordering is guaranteed beyond the store's own iteration order.
    pub fn refs_pointing_at(&self, target: &Oid) -> Result<Vec<RefName>, GitError> {
        let git_target = self.git_oid(target)?;
        let refs = self.repo.references().map_err(GitError::internal)?;

        let mut names = Vec::new();
        for reference in refs {
            let reference = reference.map_err(GitError::internal)?;
            let name = match reference.name() {
                Some(n) => n,
                None => continue,
            };
            let peeled = match reference.peel_to_commit() {
                Ok(commit) => commit.id(),
                Err(_) => continue, // refs to non-commits cannot label a commit
            };
            if peeled == git_target {
                if let Ok(ref_name) = RefName::new(name) {
                    names.push(ref_name);
                }
            }
        }

        Ok(names)
    }

    /// Update a ref with compare-and-swap semantics.
    ///
    /// The update only succeeds if the ref's current value matches
    /// `expected_old`; `None` means the ref must not exist (create case).
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), GitError> {
        let current = self.try_resolve_ref_raw(refname)?;

        match (expected_old, current.as_ref()) {
            (Some(expected), Some(actual)) if expected.as_str() != actual => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected.to_string(),
                    actual: actual.clone(),
                });
            }
            (Some(expected), None) => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected.to_string(),
                    actual: "<none>".to_string(),
                });
            }
            (None, Some(actual)) => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: "<none>".to_string(),
                    actual: actual.clone(),
                });
            }
            _ => {} // Precondition satisfied
        }

        let oid = self.git_oid(new_oid)?;
        self.repo
            .reference(refname, oid, true, message)
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    /// Resolve a ref to its raw target OID string, without peeling.
    fn try_resolve_ref_raw(&self, refname: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                let resolved = reference.resolve().unwrap_or(reference);
                let oid = resolved.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {} has no target", refname),
                })?;
                Ok(Some(oid.to_string()))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    // =========================================================================
    // Commit Reading
    // =========================================================================

    /// Read a commit.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self.find_commit(oid)?;

        let mut parents = Vec::new();
        for parent in commit.parent_ids() {
            parents.push(Oid::new(parent.to_string())?);
        }

        let author = commit.author();
        let author_time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Utc);

        Ok(CommitInfo {
            oid: oid.clone(),
            tree: Oid::new(commit.tree_id().to_string())?,
            parents,
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            author_time,
        })
    }

    // =========================================================================
    // Tree Reading and Writing
    // =========================================================================

    /// Read a tree object's entries.
    ///
    /// Entry names are unique within one tree; entries with non-UTF8 names
    /// or unrecognized modes are skipped.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the tree doesn't exist
    pub fn tree_entries(&self, oid: &Oid) -> Result<Vec<TreeEntry>, GitError> {
        let git_oid = self.git_oid(oid)?;
        let tree = self
            .repo
            .find_tree(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        let mut entries = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let name = match entry.name() {
                Some(n) => n.to_string(),
                None => continue,
            };
            let mode = match FileMode::from_raw(entry.filemode()) {
                Some(m) => m,
                None => continue,
            };
            entries.push(TreeEntry {
                name,
                mode,
                oid: Oid::new(entry.id().to_string())?,
            });
        }

        Ok(entries)
    }

    /// Write a blob object and return its OID.
    pub fn write_blob(&self, content: &[u8]) -> Result<Oid, GitError> {
        let written = self.repo.blob(content).map_err(GitError::internal)?;
        Oid::new(written.to_string()).map_err(|e| e.into())
    }

    /// Write a tree object from entries and return its OID.
    ///
    /// Canonical entry ordering is handled by the store; callers supply
    /// entries in any order. Writing the same entries twice yields the same
    /// OID (content addressing).
    pub fn write_tree(&self, entries: &[TreeEntry]) -> Result<Oid, GitError> {
        let mut builder = self.repo.treebuilder(None).map_err(GitError::internal)?;
        for entry in entries {
            let oid = self.git_oid(&entry.oid)?;
            builder
                .insert(&entry.name, oid, entry.mode.raw())
                .map_err(|e| GitError::from_git2(e, entry.oid.as_str()))?;
        }
        let written = builder.write().map_err(GitError::internal)?;
        Oid::new(written.to_string()).map_err(|e| e.into())
    }

    // =========================================================================
    // Commit Writing
    // =========================================================================

    /// Write a commit object and return its OID.
    ///
    /// The author identity is carried over from `author_of`; the committer is
    /// a fresh identity with the current timestamp (the repository's
    /// configured identity when available, otherwise the author's). Nothing
    /// is referenced by the new commit until a ref is rebound to it, so a
    /// failed update leaves no visible state behind.
    pub fn write_commit(
        &self,
        author_of: &Oid,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> Result<Oid, GitError> {
        let source = self.find_commit(author_of)?;
        let author = source.author();

        let committer = match self.repo.signature() {
            Ok(sig) => sig,
            Err(_) => git2::Signature::now(
                author.name().unwrap_or(""),
                author.email().unwrap_or(""),
            )
            .map_err(GitError::internal)?,
        };

        let tree_oid = self.git_oid(tree)?;
        let tree = self
            .repo
            .find_tree(tree_oid)
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;

        let mut parent_commits = Vec::with_capacity(parents.len());
        for parent in parents {
            parent_commits.push(self.find_commit(parent)?);
        }
        let parent_refs: Vec<&git2::Commit> = parent_commits.iter().collect();

        let written = self
            .repo
            .commit(None, &author, &committer, message, &tree, &parent_refs)
            .map_err(GitError::internal)?;

        Oid::new(written.to_string()).map_err(|e| e.into())
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn git_oid(&self, oid: &Oid) -> Result<git2::Oid, GitError> {
        git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        let git_oid = self.git_oid(oid)?;
        self.repo
            .find_commit(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod file_mode {
        use super::*;

        #[test]
        fn raw_roundtrip() {
            for mode in [
                FileMode::Blob,
                FileMode::Executable,
                FileMode::Link,
                FileMode::Tree,
                FileMode::Commit,
            ] {
                assert_eq!(FileMode::from_raw(mode.raw()), Some(mode));
            }
        }

        #[test]
        fn unknown_mode_rejected() {
            assert_eq!(FileMode::from_raw(0), None);
            assert_eq!(FileMode::from_raw(0o100600), None);
        }

        #[test]
        fn only_tree_is_tree() {
            assert!(FileMode::Tree.is_tree());
            assert!(!FileMode::Blob.is_tree());
            assert!(!FileMode::Commit.is_tree());
        }
    }

    mod git_error {
        use super::*;

        #[test]
        fn display_formatting() {
            let err = GitError::CasFailed {
                refname: "refs/changes/42/3".to_string(),
                expected: "abc".to_string(),
                actual: "def".to_string(),
            };
            assert!(err.to_string().contains("CAS failed"));
            assert!(err.to_string().contains("refs/changes/42/3"));
        }
    }
}

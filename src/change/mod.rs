//! change
//!
//! Change records and revision storage.
//!
//! A change is a long-lived review unit. Its revisions are commits stored
//! under `refs/changes/<id>/<n>`; the highest `n` is the current revision.
//! Change metadata (destination branch, status, work-in-progress flag) lives
//! in a JSON record under the repository's `review-follow/changes/`
//! directory.
//!
//! The core only ever reads the current commit and asks the store to create
//! the next revision; advancing the current-revision pointer is the store's
//! job and happens through a compare-and-swap ref creation, so two racing
//! updates cannot both claim the same revision number.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{Oid, RefName};
use crate::git::{Git, GitError};

/// Errors from change storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No change record with this id.
    #[error("change {id} not found")]
    NotFound {
        /// The change id
        id: u64,
    },

    /// A change record exists but has no revision refs.
    #[error("change {id} has no revisions")]
    NoRevisions {
        /// The change id
        id: u64,
    },

    /// A change record already exists where a new one would be created.
    #[error("change {id} already exists")]
    AlreadyExists {
        /// The change id
        id: u64,
    },

    /// The change record could not be parsed.
    #[error("change {id} record is corrupt: {message}")]
    Corrupt {
        /// The change id
        id: u64,
        /// Description of the problem
        message: String,
    },

    /// Underlying object store failure.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Filesystem failure reading or writing a change record.
    #[error("change store I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle status of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Open for review; the only status updates apply to.
    New,
    /// Submitted to its destination branch.
    Merged,
    /// Closed without submission.
    Abandoned,
}

/// A review change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    /// Numeric change id
    pub id: u64,
    /// Branch the change is destined for
    pub dest_branch: RefName,
    /// Lifecycle status
    pub status: ChangeStatus,
    /// Whether the change is marked work in progress
    #[serde(default)]
    pub work_in_progress: bool,
}

impl Change {
    /// Whether the change is still open.
    pub fn is_new(&self) -> bool {
        self.status == ChangeStatus::New
    }
}

/// Storage interface for changes and their revisions.
///
/// `find_new_base` is best effort: a failed lookup is absorbed and reported
/// as "no new base", never as an error.
pub trait ChangeStore {
    /// Load a change record by id.
    fn load(&self, id: u64) -> Result<Change, StoreError>;

    /// The change's current revision commit, if it has any revisions.
    fn current_commit(&self, change: &Change) -> Result<Option<Oid>, StoreError>;

    /// The revision number the next created revision will get.
    fn next_revision_number(&self, change: &Change) -> Result<u32, StoreError>;

    /// Record `commit` as the change's next revision.
    ///
    /// Atomic: the revision ref is created with a must-not-exist
    /// precondition, so a racing creation of the same number fails.
    fn create_revision(
        &self,
        change: &Change,
        commit: &Oid,
        description: &str,
        message: &str,
    ) -> Result<u32, StoreError>;

    /// A new parent commit for the change, when its destination branch has
    /// advanced past the current revision's parent.
    fn find_new_base(&self, change: &Change) -> Option<Oid>;
}

/// [`ChangeStore`] backed by the repository itself.
pub struct RefChangeStore<'a> {
    git: &'a Git,
}

impl<'a> RefChangeStore<'a> {
    pub fn new(git: &'a Git) -> Self {
        Self { git }
    }

    /// Register a new change for `commit`, destined for `dest_branch`.
    ///
    /// Writes the metadata record and revision 1.
    pub fn create_change(
        &self,
        id: u64,
        dest_branch: RefName,
        commit: &Oid,
    ) -> Result<Change, StoreError> {
        let record = self.record_path(id);
        if record.exists() {
            return Err(StoreError::AlreadyExists { id });
        }

        let change = Change {
            id,
            dest_branch,
            status: ChangeStatus::New,
            work_in_progress: false,
        };

        self.git.update_ref_cas(
            &self.revision_ref(id, 1),
            commit,
            None,
            "review-follow: create change",
        )?;
        self.write_record(&change)?;

        Ok(change)
    }

    /// Persist an updated change record.
    pub fn save(&self, change: &Change) -> Result<(), StoreError> {
        self.write_record(change)
    }

    /// All revisions of a change, as `(number, commit)` pairs in ascending
    /// order.
    pub fn revisions(&self, change: &Change) -> Result<Vec<(u32, Oid)>, StoreError> {
        let prefix = format!("refs/changes/{}/", change.id);
        let mut revisions = Vec::new();
        for entry in self.git.list_refs_by_prefix(&prefix)? {
            let Some(rest) = entry.name.strip_prefix(&prefix) else {
                continue;
            };
            if let Ok(number) = rest.parse::<u32>() {
                revisions.push((number, entry.oid));
            }
        }
        revisions.sort_by_key(|(n, _)| *n);
        Ok(revisions)
    }

    fn record_path(&self, id: u64) -> PathBuf {
        self.git
            .git_dir()
            .join("review-follow")
            .join("changes")
            .join(format!("{id}.json"))
    }

    fn revision_ref(&self, id: u64, number: u32) -> String {
        format!("refs/changes/{id}/{number}")
    }

    fn write_record(&self, change: &Change) -> Result<(), StoreError> {
        let path = self.record_path(change.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(change).map_err(|e| StoreError::Corrupt {
            id: change.id,
            message: e.to_string(),
        })?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl ChangeStore for RefChangeStore<'_> {
    fn load(&self, id: u64) -> Result<Change, StoreError> {
        let path = self.record_path(id);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { id });
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data).map_err(|e| StoreError::Corrupt {
            id,
            message: e.to_string(),
        })
    }

    fn current_commit(&self, change: &Change) -> Result<Option<Oid>, StoreError> {
        Ok(self.revisions(change)?.pop().map(|(_, oid)| oid))
    }

    fn next_revision_number(&self, change: &Change) -> Result<u32, StoreError> {
        let last = self.revisions(change)?.pop().map(|(n, _)| n).unwrap_or(0);
        Ok(last + 1)
    }

    fn create_revision(
        &self,
        change: &Change,
        commit: &Oid,
        description: &str,
        message: &str,
    ) -> Result<u32, StoreError> {
        let number = self.next_revision_number(change)?;
        let reflog = format!(
            "review-follow: created patch set {number} ({description}): {message}"
        );
        self.git
            .update_ref_cas(&self.revision_ref(change.id, number), commit, None, &reflog)?;
        Ok(number)
    }

    fn find_new_base(&self, change: &Change) -> Option<Oid> {
        // Best effort by contract. Any failure here means "keep the current
        // parent", not an aborted update.
        let current = self.current_commit(change).ok()??;
        let info = self.git.commit_info(&current).ok()?;
        let parent = info.parents.first()?;
        let tip = self.git.try_resolve_ref(change.dest_branch.as_str()).ok()??;
        if &tip == parent {
            None
        } else {
            Some(tip)
        }
    }
}

//! update
//!
//! The update orchestrator.
//!
//! Sequences one change's synchronization: resolve the review target from
//! trailers (or caller overrides), validate the policy, rewrite the tree,
//! diff it against the current revision, rewrite the trailers, and hand a
//! candidate commit to the change store. Two synchronization flavors exist:
//!
//! - [`Updater::run_update`] rewrites the parent tree toward the review
//!   target per the path filter (the change's own edits do not survive on
//!   included paths).
//! - [`Updater::run_follow`] merges current, parent, and a followed branch:
//!   the paths the change touched are brought to the branch's state, all
//!   untouched paths stay as they are.
//!
//! Policy problems (no target trailer, unresolvable target, closed change,
//! wrong branch) are reported in the [`FollowOutcome`], never as errors.
//! Faults (store I/O, a revision with other than one parent) propagate as
//! [`UpdateError`].

use serde::Serialize;
use thiserror::Error;

use crate::change::{Change, ChangeStore, StoreError};
use crate::core::config::Configuration;
use crate::core::types::Oid;
use crate::filter::ReviewFilter;
use crate::git::{CommitInfo, Git, GitError};
use crate::merge;
use crate::trailer::{insert_trailers, trailer_values};
use crate::version::resolve_label;

/// Errors from the update orchestrator.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The change has no revisions to update.
    #[error("change {id} has no current revision")]
    NoCurrentRevision {
        /// The change id
        id: u64,
    },

    /// The current revision does not have exactly one parent.
    ///
    /// Root and merge commits cannot be synchronized; picking a parent
    /// silently would corrupt the rewrite.
    #[error("commit {oid} has {count} parents, expected exactly one")]
    UnexpectedParents {
        /// The offending commit
        oid: String,
        /// Its parent count
        count: usize,
    },

    /// Underlying object store failure.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Change store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters for [`Updater::run_update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// Create a new revision when the update changes anything. A `false`
    /// request is a dry run reporting what would change.
    pub do_update: bool,
    /// Review target to use instead of the current commit's trailer.
    pub new_review_target: Option<String>,
    /// Filter rule lines to use instead of the current commit's trailers.
    pub new_review_files: Option<String>,
}

/// Parameters for [`Updater::run_follow`].
#[derive(Debug, Clone, Default)]
pub struct FollowRequest {
    /// Create a new revision when the tree moves.
    pub do_update: bool,
    /// Reference to follow instead of the configured follow branch.
    pub reference: Option<String>,
}

/// Result of one orchestrated update.
///
/// Optional fields stay unset when an earlier step declared the policy
/// invalid; the outcome never carries internal fault detail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FollowOutcome {
    /// Whether the change is on the configured review branch.
    pub on_review_branch: bool,
    /// Whether the review-target policy resolved to a commit.
    pub valid_review_target: bool,
    /// Whether the update adopted a new parent.
    pub rebased: bool,
    /// Whether a follow update would move the tree.
    pub can_update: bool,
    /// The review target in effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_target: Option<String>,
    /// The filter rule lines in effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_files: Option<String>,
    /// Version label of the review target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,
    /// Version label of the follow branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_label: Option<String>,
    /// Paths the rewrite newly diverges on.
    pub added_paths: Vec<String>,
    /// Paths changed on both sides.
    pub updated_paths: Vec<String>,
    /// Paths where the rewrite reverted to the parent.
    pub removed_paths: Vec<String>,
    /// Paths a follow merge replaced.
    pub changed_paths: Vec<String>,
    /// Number of the created revision, when one was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_revision: Option<u32>,
}

/// One orchestrator instance owns one repository session for the duration
/// of a single change's update.
pub struct Updater<'a, S> {
    git: &'a Git,
    store: &'a S,
    cfg: &'a Configuration,
}

impl<'a, S: ChangeStore> Updater<'a, S> {
    pub fn new(git: &'a Git, store: &'a S, cfg: &'a Configuration) -> Self {
        Self { git, store, cfg }
    }

    /// Synchronize `change` toward its review target.
    pub fn run_update(
        &self,
        change: &Change,
        req: &UpdateRequest,
    ) -> Result<FollowOutcome, UpdateError> {
        let mut outcome = FollowOutcome::default();

        // merged and abandoned changes are left alone
        if !change.is_new() {
            return Ok(outcome);
        }
        outcome.on_review_branch = change.dest_branch == self.cfg.review_branch;
        if !outcome.on_review_branch {
            return Ok(outcome);
        }

        let current = self.current_revision(change)?;
        let old_parent = self.single_parent(&current)?;

        let Some(review_target) = self.review_target(&current, req.new_review_target.as_deref())
        else {
            return Ok(outcome);
        };
        outcome.review_target = Some(review_target.clone());

        let Some(target_oid) = self.git.try_resolve_name(&review_target)? else {
            return Ok(outcome);
        };
        outcome.valid_review_target = true;

        let review_files = match &req.new_review_files {
            Some(lines) => lines.clone(),
            None => trailer_values(&current.message, &self.cfg.review_files_trailer).join("\n"),
        };
        outcome.review_files = Some(review_files.clone());
        let filter = ReviewFilter::new(&review_files);

        // Best-effort rebase: a failed base lookup keeps the old parent.
        let new_base = self.store.find_new_base(change);
        outcome.rebased = new_base.is_some();
        let parent = new_base.unwrap_or_else(|| old_parent.clone());

        let parent_tree = self.git.commit_info(&parent)?.tree;
        let old_parent_tree = if parent == old_parent {
            parent_tree.clone()
        } else {
            self.git.commit_info(&old_parent)?.tree
        };
        let target_tree = self.git.commit_info(&target_oid)?.tree;

        let new_tree = merge::rewrite_filtered(self.git, &parent_tree, &target_tree, &filter)?;

        let diff =
            merge::changed_paths(self.git, &current.tree, &new_tree, &old_parent_tree, &parent_tree)?;
        outcome.added_paths = diff.added;
        outcome.updated_paths = diff.updated;
        outcome.removed_paths = diff.removed;

        outcome.target_label = Some(resolve_label(
            self.git,
            &target_oid,
            &self.cfg.version_prefix,
            &self.cfg.version_drop_prefix,
        )?);
        if let Some(follow_oid) = self.git.try_resolve_ref(self.cfg.follow_branch.as_str())? {
            outcome.follow_label = Some(resolve_label(
                self.git,
                &follow_oid,
                &self.cfg.version_prefix,
                &self.cfg.version_drop_prefix,
            )?);
        }

        if req.do_update {
            let message = self.updated_message(&current.message, &review_target, &review_files);
            let same_message = message == current.message;
            let same_tree = new_tree == current.tree;
            let same_parent = parent == old_parent;
            // nothing to record, no new revision
            if !(same_message && same_tree && same_parent) {
                let commit = self
                    .git
                    .write_commit(&current.oid, &message, &new_tree, &[parent])?;
                let revision_message = if same_tree {
                    "Updated commit message.".to_string()
                } else {
                    format!("Updated files based on {review_target}.")
                };
                let description = outcome.target_label.clone().unwrap_or_default();
                let number =
                    self.store
                        .create_revision(change, &commit, &description, &revision_message)?;
                outcome.new_revision = Some(number);
            }
        }

        Ok(outcome)
    }

    /// Synchronize the paths `change` touched to a followed branch.
    pub fn run_follow(
        &self,
        change: &Change,
        req: &FollowRequest,
    ) -> Result<FollowOutcome, UpdateError> {
        let mut outcome = FollowOutcome::default();

        if !change.is_new() {
            return Ok(outcome);
        }
        outcome.on_review_branch = change.dest_branch == self.cfg.review_branch;
        if !outcome.on_review_branch {
            return Ok(outcome);
        }

        let reference = req
            .reference
            .clone()
            .unwrap_or_else(|| self.cfg.follow_branch.to_string());

        let current = self.current_revision(change)?;
        let parent = self.single_parent(&current)?;

        let Some(follow_oid) = self.git.try_resolve_name(&reference)? else {
            return Ok(outcome);
        };
        outcome.valid_review_target = true;
        outcome.review_target = Some(reference.clone());

        let parent_tree = self.git.commit_info(&parent)?.tree;
        let follow_tree = self.git.commit_info(&follow_oid)?.tree;

        let merged = merge::merge_trees(self.git, &current.tree, &parent_tree, &follow_tree)?;
        outcome.changed_paths = merged.changed;

        outcome.follow_label = Some(resolve_label(
            self.git,
            &follow_oid,
            &self.cfg.version_prefix,
            &self.cfg.version_drop_prefix,
        )?);

        if merged.tree == current.tree {
            return Ok(outcome);
        }
        outcome.can_update = true;

        if req.do_update {
            let message = insert_trailers(
                &current.message,
                &self.cfg.review_target_trailer,
                &reference,
            );
            let commit = self
                .git
                .write_commit(&current.oid, &message, &merged.tree, &[parent])?;
            let description = outcome.follow_label.clone().unwrap_or_default();
            let revision_message = format!("Updated files based on {reference}.");
            let number =
                self.store
                    .create_revision(change, &commit, &description, &revision_message)?;
            outcome.new_revision = Some(number);
        }

        Ok(outcome)
    }

    /// Whether the change's current tree already matches its review-target
    /// policy. Any failure along the way reads as "does not match".
    pub fn check_review_target(&self, change: &Change) -> bool {
        self.check_inner(change).unwrap_or(false)
    }

    fn check_inner(&self, change: &Change) -> Result<bool, UpdateError> {
        let current = self.current_revision(change)?;
        let parent = self.single_parent(&current)?;

        let Some(review_target) = self.review_target(&current, None) else {
            return Ok(false);
        };
        let Some(target_oid) = self.git.try_resolve_name(&review_target)? else {
            return Ok(false);
        };

        let review_files =
            trailer_values(&current.message, &self.cfg.review_files_trailer).join("\n");
        let filter = ReviewFilter::new(&review_files);

        let parent_tree = self.git.commit_info(&parent)?.tree;
        let target_tree = self.git.commit_info(&target_oid)?.tree;
        let new_tree = merge::rewrite_filtered(self.git, &parent_tree, &target_tree, &filter)?;

        Ok(new_tree == current.tree)
    }

    fn current_revision(&self, change: &Change) -> Result<CommitInfo, UpdateError> {
        let oid = self
            .store
            .current_commit(change)?
            .ok_or(UpdateError::NoCurrentRevision { id: change.id })?;
        Ok(self.git.commit_info(&oid)?)
    }

    fn single_parent(&self, current: &CommitInfo) -> Result<Oid, UpdateError> {
        match current.parents.as_slice() {
            [parent] => Ok(parent.clone()),
            parents => Err(UpdateError::UnexpectedParents {
                oid: current.oid.to_string(),
                count: parents.len(),
            }),
        }
    }

    /// The review target in effect: the override, or the trailer value when
    /// there is exactly one.
    fn review_target(&self, current: &CommitInfo, override_: Option<&str>) -> Option<String> {
        if let Some(target) = override_ {
            return Some(target.to_string());
        }
        let mut values = trailer_values(&current.message, &self.cfg.review_target_trailer);
        if values.len() == 1 {
            values.pop()
        } else {
            None
        }
    }

    fn updated_message(&self, original: &str, review_target: &str, review_files: &str) -> String {
        let message = insert_trailers(original, &self.cfg.review_target_trailer, review_target);
        insert_trailers(&message, &self.cfg.review_files_trailer, review_files)
    }
}

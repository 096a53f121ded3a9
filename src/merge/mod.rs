//! merge
//!
//! The tree synchronization core.
//!
//! Three operations over immutable tree objects:
//!
//! - [`merge_trees`] walks the change's current tree, its parent tree, and a
//!   follow target tree in lock-step, synchronizing the paths the change
//!   touched to the target while carrying untouched paths through unchanged.
//! - [`rewrite_filtered`] walks the parent and target trees, consulting a
//!   [`ReviewFilter`] per path to decide which side each entry comes from.
//! - [`changed_paths`] classifies the difference between the current tree and
//!   a newly built tree into added, updated, and removed paths.
//!
//! Subtrees shared between inputs are reused by object reference and never
//! rebuilt; equality of references is equality of content, so an unaffected
//! subtree contributes exactly zero object writes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::types::Oid;
use crate::filter::{ReviewFilter, Selection};
use crate::git::{FileMode, Git, GitError, TreeEntry};

/// `(mode, reference)` of one tree entry; `None` at call sites means the
/// entry is absent from that tree.
type Entry = (FileMode, Oid);

/// Result of a tree merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged tree.
    pub tree: Oid,
    /// Paths whose entry in the merged tree differs from the current tree,
    /// in walk order.
    pub changed: Vec<String>,
}

/// Paths that differ between the current tree and a rewritten tree,
/// classified against the respective parent trees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedPaths {
    /// Paths the rewrite newly diverges on.
    pub added: Vec<String>,
    /// Paths changed in both trees.
    pub updated: Vec<String>,
    /// Paths where the rewrite reverted to the parent.
    pub removed: Vec<String>,
}

impl ChangedPaths {
    /// Whether no path differs.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Merge `current`, its `parent`, and the follow `target` tree.
///
/// Entries the change did not touch (current equals parent) are carried
/// through unchanged, and entries missing from both current and parent are
/// foreign to the change and skipped; everything else is decided by the
/// target, dropping entries the target lacks. The paths the change edited
/// are thereby brought to the target's state.
pub fn merge_trees(
    git: &Git,
    current: &Oid,
    parent: &Oid,
    target: &Oid,
) -> Result<MergeOutcome, GitError> {
    let mut changed = Vec::new();
    let tree = merge3(git, "", current, parent, target, &mut changed)?;
    Ok(MergeOutcome { tree, changed })
}

/// Merge `current` against `target` once the parent side is known to be
/// irrelevant for this subtree.
///
/// Entries absent from `current` are foreign to the change and skipped;
/// every other non-subtree entry is replaced by the target's value (or
/// dropped when the target lacks it) and always recorded as changed.
pub fn merge_trees_two(git: &Git, current: &Oid, target: &Oid) -> Result<MergeOutcome, GitError> {
    let mut changed = Vec::new();
    let tree = merge2(git, "", current, target, &mut changed)?;
    Ok(MergeOutcome { tree, changed })
}

fn merge3(
    git: &Git,
    prefix: &str,
    current: &Oid,
    parent: &Oid,
    target: &Oid,
    changed: &mut Vec<String>,
) -> Result<Oid, GitError> {
    // Whole-tree reuse by reference equality.
    if current == parent {
        return Ok(current.clone());
    }
    if current == target {
        return Ok(current.clone());
    }
    if parent == target {
        return Ok(target.clone());
    }

    let cur = read_tree(git, current)?;
    let par = read_tree(git, parent)?;
    let tar = read_tree(git, target)?;

    let mut names: BTreeSet<&String> = BTreeSet::new();
    names.extend(cur.keys());
    names.extend(par.keys());
    names.extend(tar.keys());

    let mut updated: Vec<TreeEntry> = Vec::new();
    for name in names {
        let c = cur.get(name);
        let p = par.get(name);
        let t = tar.get(name);

        if c.is_none() && p.is_none() {
            // entry is not part of this change, leave it alone
            continue;
        }
        if c == p {
            // entry is not part of this change, leave it alone
            push_entry(&mut updated, name, c);
            continue;
        }
        if let (Some((FileMode::Tree, c_oid)), Some((FileMode::Tree, p_oid)), Some((FileMode::Tree, t_oid))) =
            (c, p, t)
        {
            let path = join(prefix, name);
            let subtree = merge3(git, &format!("{path}/"), c_oid, p_oid, t_oid, changed)?;
            updated.push(tree_entry(name, FileMode::Tree, subtree));
            continue;
        }
        if let (Some((FileMode::Tree, c_oid)), Some((FileMode::Tree, t_oid))) = (c, t) {
            let path = join(prefix, name);
            let subtree = merge2(git, &format!("{path}/"), c_oid, t_oid, changed)?;
            updated.push(tree_entry(name, FileMode::Tree, subtree));
            continue;
        }
        // decided by target
        if c != t {
            changed.push(join(prefix, name));
        }
        push_entry(&mut updated, name, t);
    }

    git.write_tree(&updated)
}

fn merge2(
    git: &Git,
    prefix: &str,
    current: &Oid,
    target: &Oid,
    changed: &mut Vec<String>,
) -> Result<Oid, GitError> {
    if current == target {
        return Ok(current.clone());
    }

    let cur = read_tree(git, current)?;
    let tar = read_tree(git, target)?;

    let mut names: BTreeSet<&String> = BTreeSet::new();
    names.extend(cur.keys());
    names.extend(tar.keys());

    let mut updated: Vec<TreeEntry> = Vec::new();
    for name in names {
        let c = cur.get(name);
        let t = tar.get(name);

        if c.is_none() {
            // entry is not part of this change, leave it alone
            continue;
        }
        if let (Some((FileMode::Tree, c_oid)), Some((FileMode::Tree, t_oid))) = (c, t) {
            let path = join(prefix, name);
            let subtree = merge2(git, &format!("{path}/"), c_oid, t_oid, changed)?;
            updated.push(tree_entry(name, FileMode::Tree, subtree));
            continue;
        }
        // replaced by target, recorded unconditionally
        changed.push(join(prefix, name));
        push_entry(&mut updated, name, t);
    }

    git.write_tree(&updated)
}

/// Rewrite `parent` toward `target`, selecting per path via `filter`.
///
/// `Include` takes the target side (a whole subtree when the path is a
/// directory), `Exclude` keeps the parent side, `NoMatch` descends into
/// directories and defaults files to the parent side. An empty filter is
/// the match-all state and adopts the target tree without any walk.
///
/// Subtrees that end up empty are dropped rather than written.
pub fn rewrite_filtered(
    git: &Git,
    parent: &Oid,
    target: &Oid,
    filter: &ReviewFilter,
) -> Result<Oid, GitError> {
    if filter.match_all() {
        return Ok(target.clone());
    }
    let entries = rewrite_level(git, "", Some(parent), Some(target), filter)?;
    git.write_tree(&entries)
}

fn rewrite_level(
    git: &Git,
    prefix: &str,
    parent: Option<&Oid>,
    target: Option<&Oid>,
    filter: &ReviewFilter,
) -> Result<Vec<TreeEntry>, GitError> {
    let par = match parent {
        Some(oid) => read_tree(git, oid)?,
        None => BTreeMap::new(),
    };
    let tar = match target {
        Some(oid) => read_tree(git, oid)?,
        None => BTreeMap::new(),
    };

    let mut names: BTreeSet<&String> = BTreeSet::new();
    names.extend(par.keys());
    names.extend(tar.keys());

    let mut updated: Vec<TreeEntry> = Vec::new();
    for name in names {
        let p = par.get(name);
        let t = tar.get(name);
        let path = join(prefix, name);
        let is_dir = is_subtree(p) || is_subtree(t);

        match filter.classify(&path, is_dir) {
            Selection::Include => push_entry(&mut updated, name, t),
            Selection::Exclude => push_entry(&mut updated, name, p),
            Selection::NoMatch if is_dir => {
                // A kind conflict between the sides cannot be split per file;
                // an undecided conflicting entry stays with the parent.
                if (p.is_some() && !is_subtree(p)) || (t.is_some() && !is_subtree(t)) {
                    push_entry(&mut updated, name, p);
                    continue;
                }
                let inner = rewrite_level(
                    git,
                    &format!("{path}/"),
                    p.map(|e| &e.1),
                    t.map(|e| &e.1),
                    filter,
                )?;
                if inner.is_empty() {
                    continue;
                }
                let subtree = git.write_tree(&inner)?;
                updated.push(tree_entry(name, FileMode::Tree, subtree));
            }
            Selection::NoMatch => push_entry(&mut updated, name, p),
        }
    }

    Ok(updated)
}

/// Classify the paths that differ between `current` and `new`.
///
/// Each differing leaf is compared against the respective parent tree: a
/// path whose current entry matches the old parent is *added* (the rewrite
/// introduced a divergence), one whose new entry matches the new parent is
/// *removed* (the divergence is gone), anything else is *updated*. When the
/// change was not rebased the two parents are the same tree.
pub fn changed_paths(
    git: &Git,
    current: &Oid,
    new: &Oid,
    old_parent: &Oid,
    new_parent: &Oid,
) -> Result<ChangedPaths, GitError> {
    let mut leaves = Vec::new();
    diff_leaves(git, "", Some(current), Some(new), &mut leaves)?;

    let mut cache = TreeCache::new(git);
    let mut out = ChangedPaths::default();
    for (path, old_entry, new_entry) in leaves {
        let old_par = cache.entry_at(old_parent, &path)?;
        let new_par = cache.entry_at(new_parent, &path)?;

        if old_entry == old_par {
            out.added.push(path);
        } else if new_entry == new_par {
            out.removed.push(path);
        } else {
            out.updated.push(path);
        }
    }

    Ok(out)
}

/// Collect all leaf paths where `old` and `new` disagree.
fn diff_leaves(
    git: &Git,
    prefix: &str,
    old: Option<&Oid>,
    new: Option<&Oid>,
    out: &mut Vec<(String, Option<Entry>, Option<Entry>)>,
) -> Result<(), GitError> {
    let old_map = match old {
        Some(oid) => read_tree(git, oid)?,
        None => BTreeMap::new(),
    };
    let new_map = match new {
        Some(oid) => read_tree(git, oid)?,
        None => BTreeMap::new(),
    };

    let mut names: BTreeSet<&String> = BTreeSet::new();
    names.extend(old_map.keys());
    names.extend(new_map.keys());

    for name in names {
        let o = old_map.get(name);
        let n = new_map.get(name);
        if o == n {
            // identical subtrees and identical leaves contribute nothing
            continue;
        }
        let path = join(prefix, name);
        let o_tree = is_subtree(o);
        let n_tree = is_subtree(n);

        if o_tree || n_tree {
            diff_leaves(
                git,
                &format!("{path}/"),
                if o_tree { o.map(|e| &e.1) } else { None },
                if n_tree { n.map(|e| &e.1) } else { None },
                out,
            )?;
            // a leaf displaced by a subtree on the other side is its own diff
            if !o_tree && o.is_some() {
                out.push((path, o.cloned(), None));
            } else if !n_tree && n.is_some() {
                out.push((path, None, n.cloned()));
            }
        } else {
            out.push((path, o.cloned(), n.cloned()));
        }
    }

    Ok(())
}

/// Per-session cache of tree objects for path lookups against parent trees.
struct TreeCache<'a> {
    git: &'a Git,
    trees: HashMap<Oid, BTreeMap<String, Entry>>,
}

impl<'a> TreeCache<'a> {
    fn new(git: &'a Git) -> Self {
        Self {
            git,
            trees: HashMap::new(),
        }
    }

    /// The entry at a slash-separated path under `root`, if any.
    fn entry_at(&mut self, root: &Oid, path: &str) -> Result<Option<Entry>, GitError> {
        let mut tree = root.clone();
        let mut components = path.split('/').peekable();
        while let Some(component) = components.next() {
            let entry = match self.level(&tree)?.get(component) {
                Some(e) => e.clone(),
                None => return Ok(None),
            };
            if components.peek().is_none() {
                return Ok(Some(entry));
            }
            if !entry.0.is_tree() {
                return Ok(None);
            }
            tree = entry.1;
        }
        Ok(None)
    }

    fn level(&mut self, oid: &Oid) -> Result<&BTreeMap<String, Entry>, GitError> {
        if !self.trees.contains_key(oid) {
            let map = read_tree(self.git, oid)?;
            self.trees.insert(oid.clone(), map);
        }
        Ok(&self.trees[oid])
    }
}

/// Read a tree into a name-keyed map. Names are unique within one tree.
fn read_tree(git: &Git, oid: &Oid) -> Result<BTreeMap<String, Entry>, GitError> {
    let mut map = BTreeMap::new();
    for entry in git.tree_entries(oid)? {
        map.insert(entry.name, (entry.mode, entry.oid));
    }
    Ok(map)
}

fn is_subtree(entry: Option<&Entry>) -> bool {
    matches!(entry, Some((mode, _)) if mode.is_tree())
}

fn join(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

fn push_entry(out: &mut Vec<TreeEntry>, name: &str, entry: Option<&Entry>) {
    if let Some((mode, oid)) = entry {
        out.push(tree_entry(name, *mode, oid.clone()));
    }
}

fn tree_entry(name: &str, mode: FileMode, oid: Oid) -> TreeEntry {
    TreeEntry {
        name: name.to_string(),
        mode,
        oid,
    }
}

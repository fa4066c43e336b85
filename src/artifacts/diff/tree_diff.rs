//! Tree diffing
//!
//! Walks two trees in sorted order and produces a per-path changeset:
//! `Added`, `Deleted`, `Modified`, or `TypeChanged` (regular file vs
//! symlink). Subtrees whose ids match are skipped entirely.

use crate::areas::database::Database;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Type of change detected for one path
#[derive(Debug, Clone, PartialEq)]
pub enum TreeChangeType {
    Added(TreeEntry),
    Deleted(TreeEntry),
    Modified { old: TreeEntry, new: TreeEntry },
    TypeChanged { old: TreeEntry, new: TreeEntry },
}

impl TreeChangeType {
    pub fn from_entries(old: Option<TreeEntry>, new: Option<TreeEntry>) -> Option<Self> {
        match (old, new) {
            (None, Some(new)) => Some(TreeChangeType::Added(new)),
            (Some(old), None) => Some(TreeChangeType::Deleted(old)),
            (Some(old), Some(new)) if old != new => {
                let old_is_link = old.mode == EntryMode::Symlink;
                let new_is_link = new.mode == EntryMode::Symlink;
                if old_is_link != new_is_link {
                    Some(TreeChangeType::TypeChanged { old, new })
                } else {
                    Some(TreeChangeType::Modified { old, new })
                }
            }
            _ => None,
        }
    }

    pub fn old_entry(&self) -> Option<&TreeEntry> {
        match self {
            TreeChangeType::Deleted(entry) => Some(entry),
            TreeChangeType::Modified { old, .. } | TreeChangeType::TypeChanged { old, .. } => {
                Some(old)
            }
            TreeChangeType::Added(_) => None,
        }
    }

    pub fn new_entry(&self) -> Option<&TreeEntry> {
        match self {
            TreeChangeType::Added(entry) => Some(entry),
            TreeChangeType::Modified { new, .. } | TreeChangeType::TypeChanged { new, .. } => {
                Some(new)
            }
            TreeChangeType::Deleted(_) => None,
        }
    }

    pub fn status_char(&self) -> char {
        match self {
            TreeChangeType::Added(_) => 'A',
            TreeChangeType::Deleted(_) => 'D',
            TreeChangeType::Modified { .. } => 'M',
            TreeChangeType::TypeChanged { .. } => 'T',
        }
    }
}

/// Changes keyed by repository-relative path
pub type ChangeSet = BTreeMap<PathBuf, TreeChangeType>;

#[derive(Debug)]
pub struct TreeDiff<'r> {
    database: &'r Database,
    change_set: ChangeSet,
}

impl<'r> TreeDiff<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeDiff {
            database,
            change_set: BTreeMap::new(),
        }
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.change_set
    }

    pub fn into_changes(self) -> ChangeSet {
        self.change_set
    }

    /// Compare two tree (or commit) ids; `None` denotes the empty tree
    pub fn compare_oids(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        self.compare_at(old, new, Path::new(""))
    }

    fn compare_at(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
        prefix: &Path,
    ) -> anyhow::Result<()> {
        if old == new {
            return Ok(());
        }

        let old_tree = self.inflate(old)?;
        let new_tree = self.inflate(new)?;

        self.detect_deletions(&old_tree, &new_tree, prefix)?;
        self.detect_additions(&old_tree, &new_tree, prefix)?;

        Ok(())
    }

    fn inflate(&self, oid: Option<&ObjectId>) -> anyhow::Result<Tree> {
        match oid {
            None => Ok(Tree::default()),
            Some(oid) => self.database.load_tree(oid),
        }
    }

    /// Paths present in `old`: deletions, modifications and recursion
    /// into changed subtrees
    fn detect_deletions(
        &mut self,
        old: &Tree,
        new: &Tree,
        prefix: &Path,
    ) -> anyhow::Result<()> {
        for (name, entry) in old.entries() {
            let path = prefix.join(name);
            let other = new.get(name);

            if other == Some(entry) {
                continue;
            }

            let old_subtree = entry.is_tree().then(|| entry.oid.clone());
            let new_subtree = other
                .filter(|other| other.is_tree())
                .map(|other| other.oid.clone());

            if old_subtree.is_some() || new_subtree.is_some() {
                self.compare_at(old_subtree.as_ref(), new_subtree.as_ref(), &path)?;
            }

            let old_blob = (!entry.is_tree()).then(|| entry.clone());
            let new_blob = other.filter(|o| !o.is_tree()).cloned();

            if let Some(change) = TreeChangeType::from_entries(old_blob, new_blob) {
                self.change_set.insert(path, change);
            }
        }

        Ok(())
    }

    /// Paths only present in `new`: additions and new subtrees
    fn detect_additions(
        &mut self,
        old: &Tree,
        new: &Tree,
        prefix: &Path,
    ) -> anyhow::Result<()> {
        for (name, entry) in new.entries() {
            if old.get(name).is_some() {
                continue;
            }

            let path = prefix.join(name);
            if entry.is_tree() {
                self.compare_at(None, Some(&entry.oid), &path)?;
            } else {
                self.change_set
                    .insert(path, TreeChangeType::Added(entry.clone()));
            }
        }

        Ok(())
    }
}

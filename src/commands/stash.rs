use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::force_checkout;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::merge::tree_merge::merge_trees;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use crate::commands::merge::{MERGE_LABELS, MergeOutcome};
use crate::errors::LitError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

impl Repository {
    /// Stash the working tree and index away and reset to HEAD
    ///
    /// The stash entry is a commit whose tree snapshots the tracked
    /// working-tree files and whose parents are (HEAD, an auto-commit of
    /// the current index). Entries are recorded newest-first on the
    /// `refs/stash` list.
    pub fn stash_push(&self, message: Option<&str>) -> anyhow::Result<Option<ObjectId>> {
        let _lock = self.lock()?;

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| LitError::UnbornBranch {
                reference: "HEAD".to_string(),
            })?;
        let head_commit = self.database().load_commit(&head_oid)?;
        let head_tree = head_commit.tree_oid().clone();

        let index = self.index();
        let index_tree = index.write_tree(self.database())?;

        // snapshot the tracked files as they sit in the working tree
        let mut work_files: BTreeMap<PathBuf, TreeEntry> = BTreeMap::new();
        for entry in index.clean_entries() {
            if !self.workspace().file_exists(&entry.name) {
                continue;
            }
            let content = self.workspace().read_file(&entry.name)?;
            let blob = Blob::from_bytes(content);
            let blob_oid = self.database().store(&blob)?;
            let stat = self.workspace().stat_file(&entry.name)?;
            work_files.insert(entry.name.clone(), TreeEntry::new(blob_oid, stat.mode));
        }
        drop(index);
        let work_tree = self.database().write_flat_tree(&work_files)?;

        if index_tree == head_tree && work_tree == head_tree {
            writeln!(self.writer(), "No local changes to save")?;
            return Ok(None);
        }

        let branch_label = self
            .refs()
            .current_branch()?
            .map(|branch| branch.to_string())
            .unwrap_or_else(|| "(detached)".to_string());

        let index_commit = self.write_commit_from_tree(
            index_tree,
            vec![head_oid.clone()],
            self.author()?,
            &format!(
                "index on {branch_label}: {} {}",
                head_oid.to_short_oid(),
                head_commit.short_message()
            ),
        )?;

        let message = message.map(str::to_string).unwrap_or_else(|| {
            format!(
                "WIP on {branch_label}: {} {}",
                head_oid.to_short_oid(),
                head_commit.short_message()
            )
        });
        let stash_oid = self.write_commit_from_tree(
            work_tree,
            vec![head_oid.clone(), index_commit],
            self.author()?,
            &message,
        )?;

        let mut entries = self.refs().read_stash_list()?;
        entries.insert(0, stash_oid.clone());
        self.refs().write_stash_list(&entries)?;

        // back to a pristine HEAD state
        let mut index = self.index();
        force_checkout(self.database(), self.workspace(), &mut index, &head_tree)?;
        index.write_updates()?;

        debug!(%stash_oid, "stashed");
        writeln!(
            self.writer(),
            "Saved working directory and index state: {message}"
        )?;

        Ok(Some(stash_oid))
    }

    /// Merge a stash entry back into the current working tree
    ///
    /// Three-way merge with the stash's first parent as base, the current
    /// index state as ours and the stashed tree as theirs.
    pub fn stash_apply(&self, position: usize) -> anyhow::Result<MergeOutcome> {
        let _lock = self.lock()?;
        self.stash_apply_locked(position)
    }

    fn stash_apply_locked(&self, position: usize) -> anyhow::Result<MergeOutcome> {
        let stash_oid = self.stash_entry(position)?;
        let stash_commit = self.database().load_commit(&stash_oid)?;

        let base_oid = stash_commit
            .parent()
            .ok_or_else(|| LitError::BadObject {
                oid: stash_oid.to_string(),
            })?;
        let base_tree = self.database().load_commit(base_oid)?.tree_oid().clone();

        let ours_tree = self.index().write_tree(self.database())?;

        let outcome = merge_trees(
            self.database(),
            Some(&base_tree),
            &ours_tree,
            stash_commit.tree_oid(),
            None,
            MERGE_LABELS,
        )?;

        self.apply_merge_to_worktree(&outcome)?;

        if outcome.is_clean() {
            writeln!(self.writer(), "Applied stash@{{{position}}}")?;
            Ok(MergeOutcome::Merged(stash_oid))
        } else {
            let paths = outcome.conflict_paths();
            for path in &paths {
                writeln!(
                    self.writer(),
                    "CONFLICT (content): merge conflict in {}",
                    path.display()
                )?;
            }
            Ok(MergeOutcome::Conflicted(paths))
        }
    }

    /// Apply then drop (only when the apply was clean)
    pub fn stash_pop(&self, position: usize) -> anyhow::Result<MergeOutcome> {
        let _lock = self.lock()?;

        let outcome = self.stash_apply_locked(position)?;
        if !outcome.is_conflicted() {
            self.stash_drop_locked(position)?;
        }

        Ok(outcome)
    }

    pub fn stash_drop(&self, position: usize) -> anyhow::Result<()> {
        let _lock = self.lock()?;
        self.stash_drop_locked(position)
    }

    fn stash_drop_locked(&self, position: usize) -> anyhow::Result<()> {
        let mut entries = self.refs().read_stash_list()?;
        if position >= entries.len() {
            return Err(LitError::NotFound {
                kind: "stash entry",
                name: format!("stash@{{{position}}}"),
            }
            .into());
        }

        let dropped = entries.remove(position);
        self.refs().write_stash_list(&entries)?;
        writeln!(
            self.writer(),
            "Dropped stash@{{{position}}} ({dropped})"
        )?;

        Ok(())
    }

    pub fn stash_clear(&self) -> anyhow::Result<()> {
        let _lock = self.lock()?;
        self.refs().write_stash_list(&[])
    }

    pub fn stash_list(&self) -> anyhow::Result<()> {
        for (position, oid) in self.refs().read_stash_list()?.iter().enumerate() {
            let commit = self.database().load_commit(oid)?;
            writeln!(
                self.writer(),
                "stash@{{{position}}}: {}",
                commit.short_message()
            )?;
        }

        Ok(())
    }

    /// Show the files a stash entry touches
    pub fn stash_show(&self, position: usize) -> anyhow::Result<()> {
        let stash_oid = self.stash_entry(position)?;
        let stash_commit = self.database().load_commit(&stash_oid)?;

        let base_tree = match stash_commit.parent() {
            Some(parent) => Some(self.database().load_commit(parent)?.tree_oid().clone()),
            None => None,
        };

        let mut tree_diff = TreeDiff::new(self.database());
        tree_diff.compare_oids(base_tree.as_ref(), Some(stash_commit.tree_oid()))?;

        for (path, change) in tree_diff.changes() {
            writeln!(
                self.writer(),
                "{}\t{}",
                change.status_char(),
                path.display()
            )?;
        }

        Ok(())
    }

    fn stash_entry(&self, position: usize) -> anyhow::Result<ObjectId> {
        self.refs()
            .read_stash_list()?
            .get(position)
            .cloned()
            .ok_or_else(|| {
                LitError::NotFound {
                    kind: "stash entry",
                    name: format!("stash@{{{position}}}"),
                }
                .into()
            })
    }
}

use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::force_checkout;
use crate::artifacts::merge::merge_base::MergeBaseFinder;
use crate::artifacts::merge::text_merge::Strategy;
use crate::artifacts::merge::tree_merge::{TreeMergeOutcome, merge_trees};
use crate::artifacts::merge::virtual_base_tree;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

/// Conflict marker labels used in working-tree files
pub const MERGE_LABELS: (&str, &str) = ("ours", "theirs");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    AlreadyUpToDate,
    FastForward(ObjectId),
    Merged(ObjectId),
    Conflicted(Vec<PathBuf>),
}

impl MergeOutcome {
    pub fn is_conflicted(&self) -> bool {
        matches!(self, MergeOutcome::Conflicted(_))
    }
}

impl Repository {
    /// Merge a revision into the current HEAD
    pub fn merge(
        &self,
        target: &str,
        strategy: Option<Strategy>,
        message: Option<&str>,
    ) -> anyhow::Result<MergeOutcome> {
        let _lock = self.lock()?;

        if self.refs().read_merge_head()?.is_some() {
            return Err(LitError::MergeInProgress.into());
        }

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| LitError::UnbornBranch {
                reference: "HEAD".to_string(),
            })?;
        let theirs_oid = self.rev_parse(target)?;

        if head_oid == theirs_oid {
            writeln!(self.writer(), "Already up to date.")?;
            return Ok(MergeOutcome::AlreadyUpToDate);
        }

        // the pre-merge tip must be restorable by --abort
        self.refs().write_orig_head(&head_oid)?;

        let mut finder = MergeBaseFinder::new(self.database());
        let bases = finder.find_all(&head_oid, &theirs_oid)?;
        debug!(?bases, "merge bases");

        if bases.contains(&theirs_oid) {
            writeln!(self.writer(), "Already up to date.")?;
            return Ok(MergeOutcome::AlreadyUpToDate);
        }

        if bases.contains(&head_oid) {
            // the current tip is the base: fast-forward
            self.checkout_commit_locked(&theirs_oid)?;
            self.refs().update_head(&theirs_oid)?;
            writeln!(
                self.writer(),
                "Fast-forward to {}",
                theirs_oid.to_short_oid()
            )?;
            return Ok(MergeOutcome::FastForward(theirs_oid));
        }

        let base_tree = virtual_base_tree(self.database(), &bases)?;
        let head_commit = self.database().load_commit(&head_oid)?;
        let theirs_commit = self.database().load_commit(&theirs_oid)?;

        let resolve = strategy.map(|s| {
            let ours_is_recent = head_commit.timestamp() > theirs_commit.timestamp();
            s.resolve(ours_is_recent)
        });

        let outcome = merge_trees(
            self.database(),
            base_tree.as_ref(),
            head_commit.tree_oid(),
            theirs_commit.tree_oid(),
            resolve,
            MERGE_LABELS,
        )?;

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Merge {target} into HEAD"));

        if outcome.is_clean() {
            self.apply_merge_to_worktree(&outcome)?;

            let merged_tree = outcome.write_tree(self.database())?;
            let commit_oid = self.write_commit_from_tree(
                merged_tree,
                vec![head_oid, theirs_oid],
                self.author()?,
                &message,
            )?;
            self.refs().update_head(&commit_oid)?;

            writeln!(
                self.writer(),
                "Merge made commit {}",
                commit_oid.to_short_oid()
            )?;
            Ok(MergeOutcome::Merged(commit_oid))
        } else {
            let conflict_paths = outcome.conflict_paths();
            self.apply_merge_to_worktree(&outcome)?;

            self.refs().write_merge_head(&theirs_oid)?;
            let mut merge_msg = format!("{message}\n\nConflicts:\n");
            for path in &conflict_paths {
                merge_msg.push_str(&format!("\t{}\n", path.display()));
            }
            self.refs().write_merge_msg(&merge_msg)?;

            writeln!(self.writer(), "{}", "Automatic merge failed.".red())?;
            for path in &conflict_paths {
                writeln!(
                    self.writer(),
                    "CONFLICT (content): merge conflict in {}",
                    path.display()
                )?;
            }
            Ok(MergeOutcome::Conflicted(conflict_paths))
        }
    }

    /// Abort the in-progress merge and restore the pre-merge state
    pub fn merge_abort(&self) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        if self.refs().read_merge_head()?.is_none() {
            anyhow::bail!("no merge in progress");
        }

        let orig_head = self
            .refs()
            .read_orig_head()?
            .ok_or_else(|| LitError::NotFound {
                kind: "ref",
                name: "ORIG_HEAD".to_string(),
            })?;

        let tree_oid = self.database().load_commit(&orig_head)?.tree_oid().clone();
        let mut index = self.index();
        force_checkout(self.database(), self.workspace(), &mut index, &tree_oid)?;
        index.write_updates()?;
        drop(index);

        self.refs().clear_merge_state()?;
        writeln!(self.writer(), "Merge aborted.")?;

        Ok(())
    }

    /// Write a tree-merge outcome into the working tree and index
    ///
    /// Cleanly merged entries become stage-0 index entries and files;
    /// conflicts leave marker-annotated files plus stages 1/2/3. Aborts
    /// `Dirty` before touching anything when an affected path carries
    /// uncommitted local changes.
    pub(crate) fn apply_merge_to_worktree(
        &self,
        outcome: &TreeMergeOutcome,
    ) -> anyhow::Result<()> {
        let head_files = match self.head_tree_oid()? {
            Some(tree_oid) => self.database().flatten_tree(&tree_oid)?,
            None => Default::default(),
        };

        // plan: what changes relative to the current HEAD tree
        let mut writes: Vec<(PathBuf, crate::artifacts::objects::tree::TreeEntry)> = Vec::new();
        let mut deletions: Vec<PathBuf> = Vec::new();

        for (path, entry) in &outcome.merged {
            if head_files.get(path) != Some(entry) {
                writes.push((path.clone(), entry.clone()));
            }
        }
        let conflict_paths = outcome.conflict_paths();
        for path in head_files.keys() {
            if !outcome.merged.contains_key(path) && !conflict_paths.contains(path) {
                deletions.push(path.clone());
            }
        }

        // dirty check before any mutation
        let mut dirty = Vec::new();
        let affected = writes
            .iter()
            .map(|(path, _)| path.clone())
            .chain(deletions.iter().cloned())
            .chain(conflict_paths.iter().cloned());
        for path in affected {
            let expected = head_files.get(&path).map(|entry| entry.oid.clone());
            let actual = self.worktree_blob_oid(&path)?;
            if actual.is_some() && actual != expected {
                dirty.push(path);
            }
        }
        if !dirty.is_empty() {
            dirty.sort();
            dirty.dedup();
            return Err(LitError::Dirty { paths: dirty }.into());
        }

        let mut index = self.index();

        for path in &deletions {
            self.workspace().remove_file(path)?;
            index.remove(path);
        }

        for (path, entry) in &writes {
            let blob = self.database().load_blob(&entry.oid)?;
            self.workspace().write_file(path, blob.content(), entry.mode)?;
            let stat = self.workspace().stat_file(path)?;
            index.add(crate::artifacts::index::index_entry::IndexEntry::new(
                path.clone(),
                entry.oid.clone(),
                stat,
            ));
        }

        for conflict in &outcome.conflicts {
            let mode = conflict
                .ours
                .as_ref()
                .or(conflict.theirs.as_ref())
                .or(conflict.base.as_ref())
                .map(|entry| entry.mode)
                .unwrap_or(crate::artifacts::index::entry_mode::EntryMode::File(
                    crate::artifacts::index::entry_mode::FileMode::Regular,
                ));
            self.workspace()
                .write_file(&conflict.path, &conflict.working, mode)?;

            index.put_conflict(
                &conflict.path,
                conflict
                    .base
                    .as_ref()
                    .map(|entry| (entry.oid.clone(), entry.mode)),
                conflict
                    .ours
                    .as_ref()
                    .map(|entry| (entry.oid.clone(), entry.mode)),
                conflict
                    .theirs
                    .as_ref()
                    .map(|entry| (entry.oid.clone(), entry.mode)),
            );
        }

        index.write_updates()
    }

    /// Hash the current working-tree content of a path, if present
    fn worktree_blob_oid(&self, path: &std::path::Path) -> anyhow::Result<Option<ObjectId>> {
        if !self.workspace().file_exists(path) {
            return Ok(None);
        }

        let index = self.index();
        if let Some(entry) = index.entry_by_path(path)
            && let Ok(stat) = self.workspace().stat_file(path)
            && entry.stat_match(&stat)
            && entry.times_match(&stat)
        {
            return Ok(Some(entry.oid.clone()));
        }
        drop(index);

        let content = self.workspace().read_file(path)?;
        Ok(Some(Blob::from_bytes(content).object_id()?))
    }
}

use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::force_checkout;
use crate::artifacts::merge::tree_merge::merge_trees;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::merge::{MERGE_LABELS, MergeOutcome};
use crate::errors::LitError;
use tracing::debug;

impl Repository {
    /// Apply the changes of one commit on top of HEAD
    ///
    /// A three-way merge with the picked commit's first parent as base,
    /// the current HEAD as ours and the picked commit as theirs. On
    /// success the result is committed with the picked commit's message
    /// and author.
    pub fn cherry_pick(&self, target: &str) -> anyhow::Result<MergeOutcome> {
        let _lock = self.lock()?;

        if self.refs().read_cherry_pick_head()?.is_some() {
            return Err(LitError::CherryPickInProgress.into());
        }

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| LitError::UnbornBranch {
                reference: "HEAD".to_string(),
            })?;
        let pick_oid = self.rev_parse(target)?;

        self.refs().write_orig_head(&head_oid)?;

        match self.cherry_pick_core(&head_oid, &pick_oid)? {
            MergeOutcome::Merged(commit_oid) => {
                writeln!(
                    self.writer(),
                    "[{}] {}",
                    commit_oid.to_short_oid(),
                    self.database().load_commit(&commit_oid)?.short_message()
                )?;
                Ok(MergeOutcome::Merged(commit_oid))
            }
            MergeOutcome::Conflicted(paths) => {
                let pick_commit = self.database().load_commit(&pick_oid)?;
                self.refs().write_cherry_pick_head(&pick_oid)?;
                self.refs().write_merge_msg(pick_commit.message())?;

                writeln!(
                    self.writer(),
                    "error: could not apply {}",
                    pick_oid.to_short_oid()
                )?;
                for path in &paths {
                    writeln!(
                        self.writer(),
                        "CONFLICT (content): merge conflict in {}",
                        path.display()
                    )?;
                }
                Ok(MergeOutcome::Conflicted(paths))
            }
            other => Ok(other),
        }
    }

    /// Conclude a conflicted cherry-pick after manual resolution
    pub fn cherry_pick_continue(&self) -> anyhow::Result<ObjectId> {
        let _lock = self.lock()?;

        let pick_oid = self
            .refs()
            .read_cherry_pick_head()?
            .ok_or_else(|| anyhow::anyhow!("no cherry-pick in progress"))?;

        let index = self.index();
        if index.has_conflicts() {
            return Err(LitError::Conflict {
                paths: index.conflict_paths(),
            }
            .into());
        }
        let tree_oid = index.write_tree(self.database())?;
        drop(index);

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| LitError::UnbornBranch {
                reference: "HEAD".to_string(),
            })?;
        let pick_commit = self.database().load_commit(&pick_oid)?;
        let message = self
            .refs()
            .read_merge_msg()?
            .unwrap_or_else(|| pick_commit.message().to_string());

        let commit_oid = self.write_commit_from_tree(
            tree_oid,
            vec![head_oid],
            pick_commit.author().clone(),
            &message,
        )?;
        self.refs().update_head(&commit_oid)?;
        self.refs().clear_cherry_pick_state()?;

        writeln!(
            self.writer(),
            "[{}] {}",
            commit_oid.to_short_oid(),
            pick_commit.short_message()
        )?;

        Ok(commit_oid)
    }

    /// Abandon a conflicted cherry-pick and restore the previous state
    pub fn cherry_pick_abort(&self) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        if self.refs().read_cherry_pick_head()?.is_none() {
            anyhow::bail!("no cherry-pick in progress");
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

        self.refs().clear_cherry_pick_state()?;
        writeln!(self.writer(), "Cherry-pick aborted.")?;

        Ok(())
    }

    /// The merge-and-commit core shared with rebase
    ///
    /// Applies `pick_oid` on top of `head_oid`. A clean merge commits
    /// immediately and moves HEAD; a conflicted one leaves the conflict
    /// state in the index and working tree.
    pub(crate) fn cherry_pick_core(
        &self,
        head_oid: &ObjectId,
        pick_oid: &ObjectId,
    ) -> anyhow::Result<MergeOutcome> {
        let pick_commit = self.database().load_commit(pick_oid)?;
        let head_commit = self.database().load_commit(head_oid)?;

        let base_tree = match pick_commit.parent() {
            Some(parent_oid) => Some(
                self.database()
                    .load_commit(parent_oid)?
                    .tree_oid()
                    .clone(),
            ),
            None => None,
        };

        debug!(pick = %pick_oid, base = ?base_tree, "cherry-pick");

        let outcome = merge_trees(
            self.database(),
            base_tree.as_ref(),
            head_commit.tree_oid(),
            pick_commit.tree_oid(),
            None,
            MERGE_LABELS,
        )?;

        self.apply_merge_to_worktree(&outcome)?;

        if outcome.is_clean() {
            let merged_tree = outcome.write_tree(self.database())?;

            // an empty pick (changes already upstream) is a no-op
            if &merged_tree == head_commit.tree_oid() {
                return Ok(MergeOutcome::AlreadyUpToDate);
            }

            let commit_oid = self.write_commit_from_tree(
                merged_tree,
                vec![head_oid.clone()],
                pick_commit.author().clone(),
                pick_commit.message(),
            )?;
            self.refs().update_head(&commit_oid)?;

            Ok(MergeOutcome::Merged(commit_oid))
        } else {
            Ok(MergeOutcome::Conflicted(outcome.conflict_paths()))
        }
    }
}

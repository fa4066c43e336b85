use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::force_checkout;
use crate::artifacts::log::rev_list::RevList;
use crate::artifacts::merge::merge_base::MergeBaseFinder;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::merge::MergeOutcome;
use crate::errors::LitError;
use std::path::PathBuf;
use tracing::debug;

/// Outcome of a rebase invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    UpToDate,
    Finished(ObjectId),
    /// Stopped at a conflicting pick; resume with `--continue`
    Stopped {
        commit: ObjectId,
        paths: Vec<PathBuf>,
    },
}

impl Repository {
    /// Replay the commits exclusive to HEAD on top of `upstream`
    ///
    /// Collects `upstream..HEAD` in oldest-first order, hard-resets to
    /// the upstream tip, then cherry-picks each commit. A conflicting
    /// pick persists its position under `REBASE_STATE/` and stops.
    pub fn rebase(&self, upstream: &str) -> anyhow::Result<RebaseOutcome> {
        let _lock = self.lock()?;

        if self.rebase_state_dir().exists() {
            return Err(LitError::RebaseInProgress.into());
        }

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| LitError::UnbornBranch {
                reference: "HEAD".to_string(),
            })?;
        let upstream_oid = self.rev_parse(upstream)?;

        let mut finder = MergeBaseFinder::new(self.database());
        if finder.is_ancestor(&upstream_oid, &head_oid)? {
            writeln!(self.writer(), "Current branch is up to date.")?;
            return Ok(RebaseOutcome::UpToDate);
        }

        // commits to replay: reachable from HEAD but not from upstream,
        // merges skipped, oldest first
        let mut walk = RevList::new(self.database());
        walk.push(&head_oid)?;
        walk.exclude(&upstream_oid)?;
        let mut todo: Vec<ObjectId> = walk
            .collect_all()?
            .into_iter()
            .filter(|(_, commit)| !commit.is_merge())
            .map(|(oid, _)| oid)
            .collect();
        todo.reverse();

        debug!(count = todo.len(), onto = %upstream_oid, "rebase plan");

        self.refs().write_orig_head(&head_oid)?;
        self.write_rebase_state(&upstream_oid, &head_oid, &todo, None)?;

        // hard reset onto the upstream tip
        let onto_tree = self
            .database()
            .load_commit(&upstream_oid)?
            .tree_oid()
            .clone();
        let mut index = self.index();
        force_checkout(self.database(), self.workspace(), &mut index, &onto_tree)?;
        index.write_updates()?;
        drop(index);
        self.refs().update_head(&upstream_oid)?;

        self.run_rebase_todo(todo)
    }

    /// Resume a rebase stopped on a conflict
    pub fn rebase_continue(&self) -> anyhow::Result<RebaseOutcome> {
        let _lock = self.lock()?;

        if !self.rebase_state_dir().exists() {
            anyhow::bail!("no rebase in progress");
        }

        let index = self.index();
        if index.has_conflicts() {
            return Err(LitError::Conflict {
                paths: index.conflict_paths(),
            }
            .into());
        }
        let tree_oid = index.write_tree(self.database())?;
        drop(index);

        // commit the manually resolved pick
        let current = self.read_rebase_file("current")?.ok_or_else(|| {
            anyhow::anyhow!("rebase state is missing the current commit")
        })?;
        let current_oid = ObjectId::try_parse(current.trim())?;
        let current_commit = self.database().load_commit(&current_oid)?;

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| LitError::UnbornBranch {
                reference: "HEAD".to_string(),
            })?;

        // resolving to the parent state makes the pick empty; skip it then
        let head_tree = self.database().load_commit(&head_oid)?.tree_oid().clone();
        if tree_oid != head_tree {
            let commit_oid = self.write_commit_from_tree(
                tree_oid,
                vec![head_oid],
                current_commit.author().clone(),
                current_commit.message(),
            )?;
            self.refs().update_head(&commit_oid)?;
        }
        self.refs().clear_cherry_pick_state()?;

        let todo = self.read_rebase_todo()?;
        self.run_rebase_todo(todo)
    }

    /// Abandon the rebase and restore the original branch tip
    pub fn rebase_abort(&self) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        if !self.rebase_state_dir().exists() {
            anyhow::bail!("no rebase in progress");
        }

        let orig = self
            .read_rebase_file("head")?
            .ok_or_else(|| anyhow::anyhow!("rebase state is missing the original head"))?;
        let orig_oid = ObjectId::try_parse(orig.trim())?;

        let tree_oid = self.database().load_commit(&orig_oid)?.tree_oid().clone();
        let mut index = self.index();
        force_checkout(self.database(), self.workspace(), &mut index, &tree_oid)?;
        index.write_updates()?;
        drop(index);

        self.refs().update_head(&orig_oid)?;
        self.refs().clear_cherry_pick_state()?;
        self.clear_rebase_state()?;

        writeln!(self.writer(), "Rebase aborted.")?;
        Ok(())
    }

    fn run_rebase_todo(&self, todo: Vec<ObjectId>) -> anyhow::Result<RebaseOutcome> {
        let mut remaining = todo;

        while !remaining.is_empty() {
            let pick_oid = remaining.remove(0);
            let head_oid = self
                .refs()
                .read_head()?
                .ok_or_else(|| LitError::UnbornBranch {
                    reference: "HEAD".to_string(),
                })?;

            self.update_rebase_progress(&remaining, &pick_oid)?;

            match self.cherry_pick_core(&head_oid, &pick_oid)? {
                MergeOutcome::Merged(_) | MergeOutcome::AlreadyUpToDate => continue,
                MergeOutcome::Conflicted(paths) => {
                    let pick_commit = self.database().load_commit(&pick_oid)?;
                    self.refs().write_merge_msg(pick_commit.message())?;

                    writeln!(
                        self.writer(),
                        "Rebase stopped at {}: fix conflicts and run rebase --continue",
                        pick_oid.to_short_oid()
                    )?;
                    for path in &paths {
                        writeln!(
                            self.writer(),
                            "CONFLICT (content): merge conflict in {}",
                            path.display()
                        )?;
                    }
                    return Ok(RebaseOutcome::Stopped {
                        commit: pick_oid,
                        paths,
                    });
                }
                MergeOutcome::FastForward(_) => unreachable!("picks never fast-forward"),
            }
        }

        self.clear_rebase_state()?;
        let final_head = self
            .refs()
            .read_head()?
            .ok_or_else(|| LitError::UnbornBranch {
                reference: "HEAD".to_string(),
            })?;
        writeln!(
            self.writer(),
            "Successfully rebased onto {}",
            final_head.to_short_oid()
        )?;

        Ok(RebaseOutcome::Finished(final_head))
    }

    // ------------------------------------------------------------------
    // REBASE_STATE persistence
    // ------------------------------------------------------------------

    fn write_rebase_state(
        &self,
        onto: &ObjectId,
        orig_head: &ObjectId,
        todo: &[ObjectId],
        current: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        let dir = self.rebase_state_dir();
        std::fs::create_dir_all(&dir)?;

        std::fs::write(dir.join("onto"), format!("{onto}\n"))?;
        std::fs::write(dir.join("head"), format!("{orig_head}\n"))?;
        self.write_rebase_todo(todo)?;
        if let Some(current) = current {
            std::fs::write(dir.join("current"), format!("{current}\n"))?;
        }

        Ok(())
    }

    fn update_rebase_progress(
        &self,
        remaining: &[ObjectId],
        current: &ObjectId,
    ) -> anyhow::Result<()> {
        self.write_rebase_todo(remaining)?;
        std::fs::write(
            self.rebase_state_dir().join("current"),
            format!("{current}\n"),
        )?;

        Ok(())
    }

    fn write_rebase_todo(&self, todo: &[ObjectId]) -> anyhow::Result<()> {
        let content = todo
            .iter()
            .map(|oid| format!("{oid}\n"))
            .collect::<String>();
        std::fs::write(self.rebase_state_dir().join("todo"), content)?;

        Ok(())
    }

    fn read_rebase_todo(&self) -> anyhow::Result<Vec<ObjectId>> {
        match self.read_rebase_file("todo")? {
            Some(content) => content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| ObjectId::try_parse(line.trim()))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    fn read_rebase_file(&self, name: &str) -> anyhow::Result<Option<String>> {
        let path = self.rebase_state_dir().join(name);
        if path.exists() {
            Ok(Some(std::fs::read_to_string(path)?))
        } else {
            Ok(None)
        }
    }

    fn clear_rebase_state(&self) -> anyhow::Result<()> {
        let dir = self.rebase_state_dir();
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }

        Ok(())
    }
}

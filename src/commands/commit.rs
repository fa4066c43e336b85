use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use tracing::debug;

impl Repository {
    /// Create a commit from the current index
    ///
    /// The first commit on an unborn branch has no parents; with
    /// `MERGE_HEAD` present the commit gets two parents and concludes the
    /// in-progress merge.
    pub fn commit(&self, message: &str) -> anyhow::Result<ObjectId> {
        let _lock = self.lock()?;
        self.commit_locked(message)
    }

    pub(crate) fn commit_locked(&self, message: &str) -> anyhow::Result<ObjectId> {
        let index = self.index();
        if index.has_conflicts() {
            return Err(LitError::Conflict {
                paths: index.conflict_paths(),
            }
            .into());
        }

        let tree_oid = index.write_tree(self.database())?;
        drop(index);

        let head_oid = self.refs().read_head()?;
        let merge_head = self.refs().read_merge_head()?;

        let mut parents = Vec::new();
        if let Some(head_oid) = &head_oid {
            parents.push(head_oid.clone());
        }
        if let Some(merge_head) = &merge_head {
            parents.push(merge_head.clone());
        }

        // reject empty commits, except when concluding a merge
        if merge_head.is_none()
            && let Some(head_oid) = &head_oid
        {
            let head_commit = self.database().load_commit(head_oid)?;
            if head_commit.tree_oid() == &tree_oid {
                anyhow::bail!("nothing to commit, working tree clean");
            }
        }

        let message = if message.is_empty() {
            self.refs()
                .read_merge_msg()?
                .unwrap_or_else(|| message.to_string())
        } else {
            message.to_string()
        };

        let commit = Commit::new(
            parents,
            tree_oid,
            self.author()?,
            self.committer()?,
            message,
        );
        let commit_oid = self.database().store(&commit)?;

        self.refs().update_head(&commit_oid)?;
        if merge_head.is_some() {
            self.refs().clear_merge_state()?;
        }

        debug!(%commit_oid, "created commit");
        writeln!(
            self.writer(),
            "[{}] {}",
            commit_oid.to_short_oid(),
            commit.short_message()
        )?;

        Ok(commit_oid)
    }

    /// Create a commit object directly from a tree and parents, bypassing
    /// the index. Used by cherry-pick, rebase and stash.
    pub(crate) fn write_commit_from_tree(
        &self,
        tree_oid: ObjectId,
        parents: Vec<ObjectId>,
        author: crate::artifacts::objects::commit::Author,
        message: &str,
    ) -> anyhow::Result<ObjectId> {
        let commit = Commit::new(
            parents,
            tree_oid,
            author,
            self.committer()?,
            message.to_string(),
        );
        let commit_oid = self.database().store(&commit)?;
        debug_assert_eq!(commit_oid, commit.object_id()?);

        Ok(commit_oid)
    }
}

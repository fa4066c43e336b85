use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use tracing::debug;

impl Repository {
    /// Switch the working tree to a branch or commit
    ///
    /// Branch names attach HEAD symbolically; anything else resolving to
    /// a commit detaches HEAD at it. `create` makes the branch first
    /// (`checkout -b`).
    pub fn checkout(&self, target: &str, create: bool) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        if create {
            let branch = BranchName::try_parse(target)?;
            let head_oid = self
                .refs()
                .read_head()?
                .ok_or_else(|| LitError::UnbornBranch {
                    reference: "HEAD".to_string(),
                })?;
            self.refs().create_branch(&branch, &head_oid)?;
            self.refs().set_head_to_branch(&branch)?;
            writeln!(self.writer(), "Switched to a new branch '{branch}'")?;
            return Ok(());
        }

        let branch = BranchName::try_parse(target)
            .ok()
            .filter(|branch| self.refs().branch_exists(branch));

        let target_oid = match &branch {
            Some(branch) => self
                .refs()
                .read_ref(branch.as_ref())?
                .ok_or_else(|| LitError::UnbornBranch {
                    reference: branch.to_string(),
                })?,
            None => self.rev_parse(target)?,
        };

        self.checkout_commit_locked(&target_oid)?;

        match branch {
            Some(branch) => {
                self.refs().set_head_to_branch(&branch)?;
                writeln!(self.writer(), "Switched to branch '{branch}'")?;
            }
            None => {
                self.refs().detach_head(&target_oid)?;
                writeln!(
                    self.writer(),
                    "HEAD is now at {} (detached)",
                    target_oid.to_short_oid()
                )?;
            }
        }

        Ok(())
    }

    /// Move the working tree and index to a commit's tree, refusing to
    /// clobber local changes. HEAD is not touched.
    pub(crate) fn checkout_commit_locked(&self, target_oid: &ObjectId) -> anyhow::Result<()> {
        let from_tree = self.head_tree_oid()?;
        let target_commit = self.database().load_commit(target_oid)?;
        let target_tree = target_commit.tree_oid().clone();

        debug!(from = ?from_tree, to = %target_tree, "checkout migration");

        let migration = Migration::plan(
            self.database(),
            self.workspace(),
            from_tree.as_ref(),
            Some(&target_tree),
        )?;

        let mut index = self.index();
        migration.check_dirty(&index)?;
        migration.apply(&mut index)?;
        index.write_updates()?;

        Ok(())
    }
}

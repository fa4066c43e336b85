use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::force_checkout;
use crate::errors::LitError;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    /// Move HEAD only
    Soft,
    /// Move HEAD and replace the index from the target tree
    #[default]
    Mixed,
    /// Move HEAD, replace the index and overwrite the working tree
    /// (tracked paths unconditionally; untracked files preserved)
    Hard,
}

impl Repository {
    pub fn reset(&self, target: &str, mode: ResetMode) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let target_oid = self.rev_parse(target)?;
        let target_tree = self
            .database()
            .load_commit(&target_oid)?
            .tree_oid()
            .clone();

        // the pre-reset tip stays reachable through ORIG_HEAD
        if let Some(head_oid) = self.refs().read_head()? {
            self.refs().write_orig_head(&head_oid)?;
        }

        debug!(%target_oid, ?mode, "reset");
        self.refs().update_head(&target_oid)?;

        match mode {
            ResetMode::Soft => {}
            ResetMode::Mixed => {
                let mut index = self.index();
                index.read_tree(self.database(), &target_tree)?;
                index.write_updates()?;
            }
            ResetMode::Hard => {
                let mut index = self.index();
                force_checkout(self.database(), self.workspace(), &mut index, &target_tree)?;
                index.write_updates()?;
            }
        }

        // any conflicted operation state is wiped by moving HEAD
        self.refs().clear_merge_state()?;
        self.refs().clear_cherry_pick_state()?;

        writeln!(
            self.writer(),
            "HEAD is now at {} {}",
            target_oid.to_short_oid(),
            self.database().load_commit(&target_oid)?.short_message()
        )?;

        Ok(())
    }

    /// Resolve and report `ORIG_HEAD` (used after aborting operations)
    pub fn orig_head(&self) -> anyhow::Result<Option<crate::artifacts::objects::object_id::ObjectId>> {
        self.refs().read_orig_head()
    }

    /// Guard for commands that refuse to run mid-operation
    pub fn ensure_no_operation_in_progress(&self) -> anyhow::Result<()> {
        if self.refs().read_merge_head()?.is_some() {
            return Err(LitError::MergeInProgress.into());
        }
        if self.refs().read_cherry_pick_head()?.is_some() {
            return Err(LitError::CherryPickInProgress.into());
        }
        if self.rebase_state_dir().exists() {
            return Err(LitError::RebaseInProgress.into());
        }

        Ok(())
    }
}

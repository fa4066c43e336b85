use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::errors::LitError;
use colored::Colorize;

impl Repository {
    /// Create a branch at a revision (default: HEAD)
    pub fn create_branch(&self, name: &str, start_point: Option<&str>) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let branch = BranchName::try_parse(name)?;
        let oid = match start_point {
            Some(rev) => self.rev_parse(rev)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| LitError::UnbornBranch {
                    reference: "HEAD".to_string(),
                })?,
        };

        self.refs().create_branch(&branch, &oid)
    }

    pub fn delete_branch(&self, name: &str) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let branch = BranchName::try_parse(name)?;
        let oid = self.refs().delete_branch(&branch)?;
        writeln!(
            self.writer(),
            "Deleted branch {branch} (was {})",
            oid.to_short_oid()
        )?;

        Ok(())
    }

    pub fn list_branches(&self) -> anyhow::Result<()> {
        let current = self.refs().current_branch()?;

        for (name, _) in self.refs().list_branches()? {
            let is_current = current
                .as_ref()
                .map(|branch| branch.as_ref() == name)
                .unwrap_or(false);
            if is_current {
                writeln!(self.writer(), "* {}", name.green())?;
            } else {
                writeln!(self.writer(), "  {name}")?;
            }
        }

        Ok(())
    }
}

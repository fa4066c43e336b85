use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::errors::LitError;

impl Repository {
    /// Create a tag at a revision (default HEAD)
    ///
    /// A message makes an annotated tag backed by a tag object; without
    /// one the ref points directly at the commit (lightweight).
    pub fn create_tag(
        &self,
        name: &str,
        target: Option<&str>,
        message: Option<&str>,
        force: bool,
    ) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        // tag names follow the same rules as branch names
        let tag_name = BranchName::try_parse(name)?;
        let tag_path = format!("refs/tags/{tag_name}");

        if !force && self.refs().read_ref(&tag_path)?.is_some() {
            return Err(LitError::AlreadyExists {
                kind: "tag",
                name: name.to_string(),
            }
            .into());
        }

        let target_oid = match target {
            Some(rev) => self.rev_parse(rev)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| LitError::UnbornBranch {
                    reference: "HEAD".to_string(),
                })?,
        };

        let ref_target = match message {
            Some(message) => {
                let tag = Tag::new(
                    target_oid,
                    ObjectType::Commit,
                    tag_name.to_string(),
                    self.author()?,
                    message.to_string(),
                );
                self.database().store(&tag)?;
                tag.object_id()?
            }
            None => target_oid,
        };

        self.refs().update_ref(&tag_path, &ref_target, None)
    }

    pub fn delete_tag(&self, name: &str) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let tag_name = BranchName::try_parse(name)?;
        self.refs().delete_ref(&format!("refs/tags/{tag_name}"))?;
        writeln!(self.writer(), "Deleted tag '{tag_name}'")?;

        Ok(())
    }

    pub fn list_tags(&self) -> anyhow::Result<()> {
        for (name, _) in self.refs().list_tags()? {
            writeln!(self.writer(), "{name}")?;
        }

        Ok(())
    }
}

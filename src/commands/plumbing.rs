//! Plumbing operations
//!
//! Low-level inspection commands: `cat-file`, `ls-tree`, `hash-object`,
//! `show-ref`, `symbolic-ref`, `count-objects`.

use crate::areas::repository::Repository;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::{Object, ObjectBox};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use std::path::Path;

impl Repository {
    /// `cat-file -p` / `cat-file -t`
    pub fn cat_file(&self, revision: &str, type_only: bool) -> anyhow::Result<()> {
        let oid = self.refs().resolve(revision, self.database())?;
        let object = self.database().parse_object(&oid)?;

        if type_only {
            writeln!(self.writer(), "{}", object.object_type())?;
        } else {
            let rendered = object.display();
            write!(self.writer(), "{rendered}")?;
            if !rendered.ends_with('\n') {
                writeln!(self.writer())?;
            }
        }

        Ok(())
    }

    /// `ls-tree [-r] <rev>`
    pub fn ls_tree(&self, revision: &str, recursive: bool) -> anyhow::Result<()> {
        let oid = self.rev_parse(revision)?;
        let tree_oid = match self.database().parse_object(&oid)? {
            ObjectBox::Commit(commit) => commit.tree_oid().clone(),
            ObjectBox::Tree(_) => oid,
            _ => {
                return Err(LitError::BadObject {
                    oid: oid.to_string(),
                }
                .into());
            }
        };

        if recursive {
            for (path, entry) in self.database().flatten_tree(&tree_oid)? {
                writeln!(
                    self.writer(),
                    "{} blob {}\t{}",
                    entry.mode.as_padded_str(),
                    entry.oid,
                    path.display()
                )?;
            }
        } else {
            let tree = self.database().load_tree(&tree_oid)?;
            writeln!(self.writer(), "{}", tree.display())?;
        }

        Ok(())
    }

    /// `hash-object [-w] <file>`
    pub fn hash_object(&self, file: &Path, write: bool) -> anyhow::Result<ObjectId> {
        let content = std::fs::read(file)?;
        let blob = Blob::from_bytes(content);

        let oid = if write {
            self.database().store(&blob)?
        } else {
            blob.object_id()?
        };

        writeln!(self.writer(), "{oid}")?;
        Ok(oid)
    }

    /// `show-ref`: every ref with its target
    pub fn show_ref(&self) -> anyhow::Result<()> {
        for (name, oid) in self.refs().list_all_refs()? {
            writeln!(self.writer(), "{oid} {name}")?;
        }

        Ok(())
    }

    /// `symbolic-ref <name>`: print the target of a symbolic ref
    pub fn symbolic_ref(&self, name: &str) -> anyhow::Result<()> {
        let path = self.lit_dir().join(name);
        let content = std::fs::read_to_string(&path).map_err(|_| LitError::NotFound {
            kind: "ref",
            name: name.to_string(),
        })?;

        match content.trim().strip_prefix("ref: ") {
            Some(target) => {
                writeln!(self.writer(), "{target}")?;
                Ok(())
            }
            None => anyhow::bail!("{name} is not a symbolic ref"),
        }
    }

    /// `count-objects`
    pub fn count_objects(&self) -> anyhow::Result<()> {
        let oids = self.database().iter_oids()?;

        let mut size = 0u64;
        for oid in &oids {
            let path = self.database().objects_path().join(oid.to_path());
            size += std::fs::metadata(path)?.len();
        }

        writeln!(
            self.writer(),
            "{} objects, {} kilobytes",
            oids.len(),
            size / 1024
        )?;

        Ok(())
    }
}

//! Tree object
//!
//! Trees are directory snapshots: an ordered sequence of
//! `(mode, name, object-id)` entries. Files point at blobs, subdirectories
//! at nested trees, symlinks at blobs holding the link target.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`, each entry `<mode> <name>\0<20-byte-id>`.
//!
//! ## Entry ordering
//!
//! Entries are sorted by name with Git's collation: directories compare as
//! if their name carried a trailing `/`, so `foo` sorts before `foo-bar`
//! while the directory `foo/` sorts after it.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::LitError;
use anyhow::Context;
use bytes::Bytes;
use derive_new::new;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// A single `(mode, oid)` entry; the name is the key in the owning tree
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeEntry {
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }
}

/// Directory snapshot object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
}

/// Compare entry names the way Git sorts tree entries: a directory name is
/// compared as if it ended with `/`.
pub fn tree_name_order(a: &str, a_is_tree: bool, b: &str, b_is_tree: bool) -> Ordering {
    let a_iter = a.bytes().chain(if a_is_tree { Some(b'/') } else { None });
    let b_iter = b.bytes().chain(if b_is_tree { Some(b'/') } else { None });
    a_iter.cmp(b_iter)
}

impl Tree {
    /// Insert an entry, validating the name
    ///
    /// The empty name and names containing `/` or NUL are forbidden; names
    /// are unique within a tree (the last insert wins).
    pub fn insert(&mut self, name: impl Into<String>, entry: TreeEntry) -> anyhow::Result<()> {
        let name = name.into();
        if name.is_empty() || name.contains('/') || name.contains('\0') {
            return Err(LitError::Corrupt {
                kind: "tree",
                detail: format!("invalid entry name {name:?}"),
            }
            .into());
        }

        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, TreeEntry)> {
        self.entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in Git's serialization order
    fn sorted_entries(&self) -> Vec<(&String, &TreeEntry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|(a_name, a_entry), (b_name, b_entry)| {
            tree_name_order(a_name, a_entry.is_tree(), b_name, b_entry.is_tree())
        });
        entries
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();
        for (name, entry) in self.sorted_entries() {
            let header = format!("{} {}", entry.mode.as_str(), name);
            content_bytes.write_all(header.as_bytes())?;
            content_bytes.push(0);
            entry.oid.write_raw_to(&mut content_bytes)?;
        }

        let mut tree_bytes = Vec::new();
        let header = format!("{} {}\0", self.object_type().as_str(), content_bytes.len());
        tree_bytes.write_all(header.as_bytes())?;
        tree_bytes.write_all(&content_bytes)?;

        Ok(Bytes::from(tree_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut tree = Tree::default();
        let mut reader = reader;

        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF, no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(LitError::Corrupt {
                    kind: "tree",
                    detail: "unexpected EOF in mode".to_string(),
                }
                .into());
            }

            let mode_str = std::str::from_utf8(&mode_bytes)?;
            let mode = EntryMode::from_octal_str(mode_str)?;

            name_bytes.clear();
            let n = reader.read_until(b'\0', &mut name_bytes)?;
            if n == 0 || name_bytes.pop() != Some(b'\0') {
                return Err(LitError::Corrupt {
                    kind: "tree",
                    detail: "unexpected EOF in name".to_string(),
                }
                .into());
            }
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid =
                ObjectId::read_raw_from(&mut reader).context("unexpected EOF in object id")?;

            tree.insert(name, TreeEntry::new(oid, mode))?;
        }

        Ok(tree)
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.sorted_entries()
            .iter()
            .map(|(name, entry)| {
                let object_type = if entry.is_tree() { "tree" } else { "blob" };
                format!(
                    "{} {} {}\t{}",
                    entry.mode.as_padded_str(),
                    object_type,
                    entry.oid,
                    name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

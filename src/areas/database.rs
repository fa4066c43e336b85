//! Object database
//!
//! Content-addressed storage for all objects (blobs, trees, commits, tags).
//! Objects are identified by the SHA-1 of their serialized form and stored
//! zlib-compressed under a two-level fan-out.
//!
//! ## Storage format
//!
//! - Path: `objects/ab/cdef123...` (first 2 hex chars as directory)
//! - Content: `zlib(deflate("<type> <size>\0<payload>"))`
//!
//! Writes are atomic (temp file + rename) and idempotent; an existing
//! object file is never rewritten. Reads verify that the decompressed
//! bytes hash back to the requested id.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use crate::errors::LitError;
use anyhow::Context;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Cursor, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Database {
    /// Path to the objects directory
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Store an object, returning its id
    ///
    /// A no-op when the object already exists.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let oid = object.object_id()?;
        let object_path = self.path.join(oid.to_path());

        if !object_path.exists() {
            self.write_object(object_path, object.serialize()?)?;
        }

        Ok(oid)
    }

    /// Store already-serialized object bytes under a known id
    ///
    /// Used by the remote transfer path, which moves raw objects between
    /// stores. The bytes are re-hashed to guard against corruption.
    pub fn store_raw(&self, oid: &ObjectId, content: &Bytes) -> anyhow::Result<()> {
        let mut hasher = Sha1::new();
        hasher.update(content);
        let actual = format!("{:x}", hasher.finalize());
        if actual != oid.as_ref() {
            return Err(LitError::HashMismatch {
                oid: oid.to_string(),
            }
            .into());
        }

        let object_path = self.path.join(oid.to_path());
        if !object_path.exists() {
            self.write_object(object_path, content.clone())?;
        }

        Ok(())
    }

    /// Load the raw decompressed bytes of an object (header included)
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(object_id.to_path());

        if !object_path.exists() {
            return Err(LitError::NotFound {
                kind: "object",
                name: object_id.to_string(),
            }
            .into());
        }

        let compressed = std::fs::read(&object_path)
            .with_context(|| format!("unable to read object file {}", object_path.display()))?;
        let content = Self::decompress(compressed.into())?;

        let mut hasher = Sha1::new();
        hasher.update(&content);
        let actual = format!("{:x}", hasher.finalize());
        if actual != object_id.as_ref() {
            return Err(LitError::HashMismatch {
                oid: object_id.to_string(),
            }
            .into());
        }

        Ok(content)
    }

    pub fn has(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).exists()
    }

    /// Parse an object into its typed representation
    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(object_reader)?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(object_reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(
                object_reader,
            )?))),
            ObjectType::Tag => Ok(ObjectBox::Tag(Box::new(Tag::deserialize(object_reader)?))),
        }
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(Some(Blob::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tree>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tree => Ok(Some(Tree::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Commit => Ok(Some(Commit::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tag(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tag>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tag => Ok(Some(Tag::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    /// Load a commit, failing when the object is something else
    pub fn load_commit(&self, object_id: &ObjectId) -> anyhow::Result<Commit> {
        self.parse_object_as_commit(object_id)?
            .ok_or_else(|| {
                LitError::BadObject {
                    oid: object_id.to_string(),
                }
                .into()
            })
    }

    /// Load a blob, failing when the object is something else
    pub fn load_blob(&self, object_id: &ObjectId) -> anyhow::Result<Blob> {
        self.parse_object_as_blob(object_id)?
            .ok_or_else(|| {
                LitError::BadObject {
                    oid: object_id.to_string(),
                }
                .into()
            })
    }

    /// Load a tree, following a commit to its tree when given a commit id
    pub fn load_tree(&self, object_id: &ObjectId) -> anyhow::Result<Tree> {
        match self.parse_object(object_id)? {
            ObjectBox::Tree(tree) => Ok(*tree),
            ObjectBox::Commit(commit) => self.load_tree(commit.tree_oid()),
            _ => Err(LitError::BadObject {
                oid: object_id.to_string(),
            }
            .into()),
        }
    }

    pub fn object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        let (object_type, _) = self.parse_object_as_bytes(object_id)?;
        Ok(object_type)
    }

    fn parse_object_as_bytes(
        &self,
        object_id: &ObjectId,
    ) -> anyhow::Result<(ObjectType, impl BufRead)> {
        let object_content = self.load(object_id)?;
        let mut object_reader = Cursor::new(object_content);

        let (object_type, _) = ObjectType::parse_header(&mut object_reader)?;

        Ok((object_type, object_reader))
    }

    fn write_object(&self, object_path: PathBuf, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .with_context(|| format!("invalid object path {}", object_path.display()))?;
        std::fs::create_dir_all(object_dir).with_context(|| {
            format!("unable to create object directory {}", object_dir.display())
        })?;

        let temp_object_path = object_dir.join(Self::generate_temp_name());
        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .with_context(|| {
                format!("unable to open object file {}", temp_object_path.display())
            })?;
        file.write_all(&object_content).with_context(|| {
            format!("unable to write object file {}", temp_object_path.display())
        })?;

        // rename-into-place makes the write atomic
        std::fs::rename(&temp_object_path, &object_path).with_context(|| {
            format!("unable to rename object file to {}", object_path.display())
        })?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed| compressed.into())
            .context("unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| LitError::Corrupt {
                kind: "object",
                detail: format!("zlib inflate failed: {e}"),
            })?;

        Ok(decompressed.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    /// Enumerate every object id in the store
    pub fn iter_oids(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut oids = Vec::new();

        if !self.path.exists() {
            return Ok(oids);
        }

        for dir_entry in std::fs::read_dir(&self.path)? {
            let dir_entry = dir_entry?;
            let dir_name = dir_entry.file_name().to_string_lossy().to_string();
            if dir_name.len() != 2 || !dir_entry.path().is_dir() {
                continue;
            }

            for file_entry in std::fs::read_dir(dir_entry.path())? {
                let file_entry = file_entry?;
                let file_name = file_entry.file_name().to_string_lossy().to_string();
                if let Ok(oid) = ObjectId::try_parse(format!("{dir_name}{file_name}")) {
                    oids.push(oid);
                }
            }
        }

        oids.sort();
        Ok(oids)
    }

    /// Find all objects whose id starts with the given hex prefix
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let mut matches = Vec::new();

        if prefix.len() >= 2 {
            let dir_name = &prefix[..2];
            let file_prefix = &prefix[2..];
            let dir_path = self.path.join(dir_name);

            if dir_path.is_dir() {
                for entry in std::fs::read_dir(&dir_path)? {
                    let entry = entry?;
                    let file_name = entry.file_name();
                    let file_name = file_name.to_string_lossy();

                    if file_name.starts_with(file_prefix)
                        && let Ok(oid) = ObjectId::try_parse(format!("{dir_name}{file_name}"))
                    {
                        matches.push(oid);
                    }
                }
            }
        } else {
            matches = self
                .iter_oids()?
                .into_iter()
                .filter(|oid| oid.as_ref().starts_with(prefix))
                .collect();
        }

        matches.sort();
        Ok(matches)
    }

    /// Resolve an abbreviated id to exactly one stored object
    pub fn resolve_prefix(&self, prefix: &str) -> anyhow::Result<ObjectId> {
        if !ObjectId::looks_like_prefix(prefix) {
            return Err(LitError::BadObject {
                oid: prefix.to_string(),
            }
            .into());
        }

        let matches = self.find_objects_by_prefix(prefix)?;
        match matches.len() {
            0 => Err(LitError::NotFound {
                kind: "object",
                name: prefix.to_string(),
            }
            .into()),
            1 => Ok(matches.into_iter().next().expect("one match")),
            _ => Err(LitError::Ambiguous {
                prefix: prefix.to_string(),
                candidates: matches.iter().map(|oid| oid.to_string()).collect(),
            }
            .into()),
        }
    }

    /// Build nested tree objects from a flat `path -> entry` map,
    /// returning the root tree id
    ///
    /// The inverse of [`Database::flatten_tree`]; empty directories
    /// cannot occur since the map only holds file entries.
    pub fn write_flat_tree(
        &self,
        files: &BTreeMap<PathBuf, TreeEntry>,
    ) -> anyhow::Result<ObjectId> {
        #[derive(Debug)]
        enum Node {
            File(TreeEntry),
            Dir(BTreeMap<String, Node>),
        }

        let mut root = BTreeMap::new();

        for (path, entry) in files {
            let components: Vec<String> = path
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            if components.is_empty() {
                continue;
            }

            let mut node = &mut root;
            for component in &components[..components.len() - 1] {
                let child = node
                    .entry(component.clone())
                    .or_insert_with(|| Node::Dir(BTreeMap::new()));
                node = match child {
                    Node::Dir(children) => children,
                    Node::File(_) => {
                        return Err(LitError::Corrupt {
                            kind: "tree",
                            detail: format!(
                                "path {} is both a file and a directory",
                                path.display()
                            ),
                        }
                        .into());
                    }
                };
            }
            node.insert(
                components[components.len() - 1].clone(),
                Node::File(entry.clone()),
            );
        }

        fn write_level(
            database: &Database,
            children: &BTreeMap<String, Node>,
        ) -> anyhow::Result<ObjectId> {
            let mut tree = Tree::default();
            for (name, node) in children {
                match node {
                    Node::File(entry) => tree.insert(name.clone(), entry.clone())?,
                    Node::Dir(grandchildren) => {
                        let subtree_oid = write_level(database, grandchildren)?;
                        tree.insert(
                            name.clone(),
                            TreeEntry::new(
                                subtree_oid,
                                crate::artifacts::index::entry_mode::EntryMode::Directory,
                            ),
                        )?;
                    }
                }
            }

            database.store(&tree)
        }

        write_level(self, &root)
    }

    /// Flatten a tree into `path -> entry` for every blob it reaches
    pub fn flatten_tree(&self, tree_oid: &ObjectId) -> anyhow::Result<BTreeMap<PathBuf, TreeEntry>> {
        let mut files = BTreeMap::new();
        self.flatten_tree_into(tree_oid, PathBuf::new(), &mut files)?;
        Ok(files)
    }

    fn flatten_tree_into(
        &self,
        tree_oid: &ObjectId,
        prefix: PathBuf,
        files: &mut BTreeMap<PathBuf, TreeEntry>,
    ) -> anyhow::Result<()> {
        let tree = self.load_tree(tree_oid)?;

        for (name, entry) in tree.entries() {
            let path = prefix.join(name);
            if entry.is_tree() {
                self.flatten_tree_into(&entry.oid, path, files)?;
            } else {
                files.insert(path, entry.clone());
            }
        }

        Ok(())
    }
}

/// Commit cache for graph traversal algorithms
///
/// Merge-base searches and revision walks visit the same commits many
/// times; this cache keeps the slim form (id, parents, timestamp) around so
/// repeated lookups avoid re-reading the store.
#[derive(Debug, Default)]
pub struct CommitCache {
    commits: HashMap<ObjectId, SlimCommit>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the slim form of a commit, loading it on first access
    pub fn get_or_load(
        &mut self,
        database: &Database,
        object_id: &ObjectId,
    ) -> anyhow::Result<SlimCommit> {
        if let Some(slim) = self.commits.get(object_id) {
            return Ok(slim.clone());
        }

        let commit = database.load_commit(object_id)?;
        let slim = SlimCommit {
            oid: object_id.clone(),
            parents: commit.parents().to_vec(),
            timestamp: commit.timestamp(),
        };
        self.commits.insert(object_id.clone(), slim.clone());

        Ok(slim)
    }
}

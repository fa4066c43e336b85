//! Index (staging area)
//!
//! The index binds repository-relative paths to blob ids plus cached stat
//! data, and is the sole input for the next commit's tree. Conflicted paths
//! carry entries at stages 1/2/3 instead of a single stage-0 entry.
//!
//! ## Persistence
//!
//! The DIRC v2 binary format (see `artifacts::index`). Writes go to
//! `index.lock` and rename into place so readers always observe a complete
//! file; a left-over lock file from a concurrent writer fails the update.

use crate::areas::database::Database;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{ENTRY_BLOCK, ENTRY_MIN_SIZE, IndexEntry};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{
    HEADER_SIZE, SIGNATURE, STAGE_BASE, STAGE_CLEAN, STAGE_OURS, STAGE_THEIRS, Stage, VERSION,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use crate::errors::LitError;
use anyhow::Context;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file
    path: Box<Path>,
    /// Entries keyed by `(path, stage)`
    entries: BTreeMap<(PathBuf, Stage), IndexEntry>,
    /// Set when in-memory state diverges from disk
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.changed = false;
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Load the index from disk, replacing in-memory state
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let file = std::fs::File::open(&self.path)?;
        if file.metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(file);
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;

        reader.verify()
    }

    fn parse_header(&self, reader: &mut Checksum<std::fs::File>) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(&header_bytes)?;

        if header.marker != SIGNATURE {
            return Err(LitError::Corrupt {
                kind: "index",
                detail: format!("invalid signature {:?}", header.marker),
            }
            .into());
        }
        if header.version != VERSION {
            return Err(LitError::Corrupt {
                kind: "index",
                detail: format!("unsupported version {}", header.version),
            }
            .into());
        }

        Ok(header.entries_count)
    }

    fn parse_entries(
        &mut self,
        entries_count: u32,
        reader: &mut Checksum<std::fs::File>,
    ) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            // entries are NUL-padded to the block size, so the final byte
            // of a complete entry is always NUL
            while entry_bytes[entry_bytes.len() - 1] != 0 {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(&entry_bytes)?;
            self.entries
                .insert((entry.name.clone(), entry.stage), entry);
        }

        Ok(())
    }

    /// Persist the index through `index.lock`
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        let lock_path = {
            let mut lock = self.path.as_os_str().to_owned();
            lock.push(".lock");
            PathBuf::from(lock)
        };

        let lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .with_context(|| {
                format!(
                    "unable to create {}: another process seems to be writing the index",
                    lock_path.display()
                )
            })?;

        let result = self.write_to(lock_file).and_then(|_| {
            std::fs::rename(&lock_path, &self.path).map_err(anyhow::Error::from)
        });

        if result.is_err() {
            let _ = std::fs::remove_file(&lock_path);
        }
        result?;

        self.changed = false;
        Ok(())
    }

    fn write_to(&self, file: std::fs::File) -> anyhow::Result<()> {
        let mut writer = Checksum::new(file);

        let header = IndexHeader::new(
            String::from(SIGNATURE),
            VERSION,
            self.entries.len() as u32,
        );
        writer.write(&header.serialize()?)?;

        for entry in self.entries.values() {
            writer.write(&entry.serialize()?)?;
        }

        writer.write_checksum()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    // ------------------------------------------------------------------
    // Entry manipulation
    // ------------------------------------------------------------------

    /// Upsert a stage-0 entry, clearing any conflict stages for the path
    pub fn add(&mut self, entry: IndexEntry) {
        self.discard_conflicting_paths(&entry.name);
        self.clear_conflict(&entry.name);
        self.entries
            .insert((entry.name.clone(), STAGE_CLEAN), entry);
        self.changed = true;
    }

    /// Remove every stage of a path
    pub fn remove(&mut self, path: &Path) {
        for stage in [STAGE_CLEAN, STAGE_BASE, STAGE_OURS, STAGE_THEIRS] {
            self.entries.remove(&(path.to_path_buf(), stage));
        }
        self.changed = true;
    }

    /// A file at `a/b` conflicts with a file entry at `a` and with any
    /// entries below `a/b/`; both are evicted when `a/b` is staged.
    fn discard_conflicting_paths(&mut self, path: &Path) {
        let mut to_remove: Vec<PathBuf> = path
            .ancestors()
            .skip(1)
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .filter(|ancestor| {
                self.entries.contains_key(&(ancestor.to_path_buf(), STAGE_CLEAN))
            })
            .map(Path::to_path_buf)
            .collect();

        to_remove.extend(
            self.entries
                .keys()
                .filter(|(name, _)| name.starts_with(path) && name.as_path() != path)
                .map(|(name, _)| name.clone()),
        );

        for name in to_remove {
            self.remove(&name);
        }
    }

    /// Replace a path's entries with conflict stages
    pub fn put_conflict(
        &mut self,
        path: &Path,
        base: Option<(ObjectId, EntryMode)>,
        ours: Option<(ObjectId, EntryMode)>,
        theirs: Option<(ObjectId, EntryMode)>,
    ) {
        self.remove(path);

        let stages = [
            (STAGE_BASE, base),
            (STAGE_OURS, ours),
            (STAGE_THEIRS, theirs),
        ];
        for (stage, side) in stages {
            if let Some((oid, mode)) = side {
                self.entries.insert(
                    (path.to_path_buf(), stage),
                    IndexEntry::new_at_stage(path.to_path_buf(), oid, stage, mode),
                );
            }
        }
        self.changed = true;
    }

    /// Resolve a conflicted path back to a single stage-0 entry
    pub fn clear_conflict(&mut self, path: &Path) {
        for stage in [STAGE_BASE, STAGE_OURS, STAGE_THEIRS] {
            self.entries.remove(&(path.to_path_buf(), stage));
        }
    }

    /// The (base, ours, theirs) stages recorded for a path
    pub fn conflict_entries(
        &self,
        path: &Path,
    ) -> (Option<&IndexEntry>, Option<&IndexEntry>, Option<&IndexEntry>) {
        (
            self.entries.get(&(path.to_path_buf(), STAGE_BASE)),
            self.entries.get(&(path.to_path_buf(), STAGE_OURS)),
            self.entries.get(&(path.to_path_buf(), STAGE_THEIRS)),
        )
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.keys().any(|(_, stage)| *stage != STAGE_CLEAN)
    }

    pub fn conflict_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|(_, stage)| *stage != STAGE_CLEAN)
            .map(|(name, _)| name.clone())
            .collect();
        paths.dedup();

        paths
    }

    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_path_buf(), STAGE_CLEAN))
    }

    /// Update only the cached stat data of an existing entry
    pub fn update_entry_stat(
        &mut self,
        path: &Path,
        metadata: crate::artifacts::index::index_entry::EntryMetadata,
    ) {
        if let Some(entry) = self.entries.get_mut(&(path.to_path_buf(), STAGE_CLEAN)) {
            entry.metadata = metadata;
            self.changed = true;
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Stage-0 entries only
    pub fn clean_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries
            .iter()
            .filter(|((_, stage), _)| *stage == STAGE_CLEAN)
            .map(|(_, entry)| entry)
    }

    pub fn tracked_paths(&self) -> BTreeSet<PathBuf> {
        self.entries.keys().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        [STAGE_CLEAN, STAGE_BASE, STAGE_OURS, STAGE_THEIRS]
            .iter()
            .any(|stage| self.entries.contains_key(&(path.to_path_buf(), *stage)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ------------------------------------------------------------------
    // Tree conversion
    // ------------------------------------------------------------------

    /// Build tree objects bottom-up from the stage-0 entries
    ///
    /// Produces one tree object per directory; empty directories cannot
    /// occur since trees are derived from file paths. Fails `Conflict`
    /// while unresolved stages remain.
    pub fn write_tree(&self, database: &Database) -> anyhow::Result<ObjectId> {
        if self.has_conflicts() {
            return Err(LitError::Conflict {
                paths: self.conflict_paths(),
            }
            .into());
        }

        let files: BTreeMap<PathBuf, TreeEntry> = self
            .clean_entries()
            .map(|entry| {
                (
                    entry.name.clone(),
                    TreeEntry::new(entry.oid.clone(), entry.metadata.mode),
                )
            })
            .collect();

        database.write_flat_tree(&files)
    }

    /// Replace the index with the flattened entries of a tree at stage 0
    ///
    /// Stat data is zeroed; the next status pass rehashes and refreshes it.
    pub fn read_tree(&mut self, database: &Database, tree_oid: &ObjectId) -> anyhow::Result<()> {
        let files = database.flatten_tree(tree_oid)?;

        self.entries.clear();
        for (path, tree_entry) in files {
            let entry = IndexEntry::new_at_stage(
                path.clone(),
                tree_entry.oid,
                STAGE_CLEAN,
                tree_entry.mode,
            );
            self.entries.insert((path, STAGE_CLEAN), entry);
        }
        self.changed = true;

        Ok(())
    }
}

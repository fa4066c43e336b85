//! Checkout migration
//!
//! Applies the delta `from-tree -> target-tree` to the working tree and
//! index. Before anything is touched, every affected path is checked
//! against the working tree: an overwrite or deletion of a path whose
//! content no longer matches the `from` side aborts with `Dirty`, listing
//! all offending paths. Only after the whole plan passes are deletions
//! and writes applied, so a failed checkout leaves the tree untouched.

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeChangeType, TreeDiff};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use crate::errors::LitError;
use std::path::Path;
use tracing::debug;

pub struct Migration<'r> {
    database: &'r Database,
    workspace: &'r Workspace,
    changes: ChangeSet,
}

impl<'r> Migration<'r> {
    /// Plan the migration between two trees (`None` = empty tree)
    pub fn plan(
        database: &'r Database,
        workspace: &'r Workspace,
        from_tree: Option<&ObjectId>,
        target_tree: Option<&ObjectId>,
    ) -> anyhow::Result<Self> {
        let mut tree_diff = TreeDiff::new(database);
        tree_diff.compare_oids(from_tree, target_tree)?;

        Ok(Migration {
            database,
            workspace,
            changes: tree_diff.into_changes(),
        })
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Verify no affected path carries uncommitted local changes
    ///
    /// A path is dirty when its working-tree content differs from the
    /// `from` side of the migration. The index's cached stat data short-
    /// circuits the content hash for unmodified files.
    pub fn check_dirty(&self, index: &Index) -> anyhow::Result<()> {
        let mut dirty = Vec::new();

        for (path, change) in &self.changes {
            let expected = change.old_entry();

            match (self.workspace.file_exists(path), expected) {
                // deleting or rewriting an absent file touches nothing
                (false, _) => continue,
                // a file in the way of a brand-new path: only identical
                // content is allowed to be overwritten
                (true, None) => {
                    let new_entry = change.new_entry();
                    if self.worktree_oid(path, index)?.as_ref() != new_entry.map(|e| &e.oid) {
                        dirty.push(path.clone());
                    }
                }
                (true, Some(expected)) => {
                    if self.worktree_oid(path, index)?.as_ref() != Some(&expected.oid) {
                        dirty.push(path.clone());
                    }
                }
            }
        }

        if dirty.is_empty() {
            Ok(())
        } else {
            Err(LitError::Dirty { paths: dirty }.into())
        }
    }

    fn worktree_oid(&self, path: &Path, index: &Index) -> anyhow::Result<Option<ObjectId>> {
        let Ok(stat) = self.workspace.stat_file(path) else {
            return Ok(None);
        };

        if let Some(entry) = index.entry_by_path(path)
            && entry.stat_match(&stat)
            && entry.times_match(&stat)
        {
            return Ok(Some(entry.oid.clone()));
        }

        let content = self.workspace.read_file(path)?;
        let blob = Blob::from_bytes(content);
        Ok(Some(blob.object_id()?))
    }

    /// Apply the planned changes to the working tree and index
    ///
    /// Deletions run first so a directory emptied by them can be replaced
    /// by a file of the same name; writes create directories on demand.
    pub fn apply(&self, index: &mut Index) -> anyhow::Result<()> {
        for (path, change) in &self.changes {
            if let TreeChangeType::Deleted(_) = change {
                debug!(path = %path.display(), "checkout: delete");
                self.workspace.remove_file(path)?;
                index.remove(path);
            }
        }

        for (path, change) in &self.changes {
            if let Some(entry) = change.new_entry() {
                debug!(path = %path.display(), "checkout: write");
                self.write_entry(path, entry, index)?;
            }
        }

        Ok(())
    }

    fn write_entry(
        &self,
        path: &Path,
        entry: &TreeEntry,
        index: &mut Index,
    ) -> anyhow::Result<()> {
        let blob = self.database.load_blob(&entry.oid)?;
        self.workspace.write_file(path, blob.content(), entry.mode)?;

        let stat = self.workspace.stat_file(path)?;
        index.add(IndexEntry::new(path.to_path_buf(), entry.oid.clone(), stat));

        Ok(())
    }
}

/// Overwrite the working tree with `target_tree` unconditionally
///
/// Used by `reset --hard` and conflict-state restoration: tracked paths
/// are rewritten or removed without a dirty check, untracked files are
/// preserved, and the index is replaced by the target tree.
pub fn force_checkout(
    database: &Database,
    workspace: &Workspace,
    index: &mut Index,
    target_tree: &ObjectId,
) -> anyhow::Result<()> {
    let target_files = database.flatten_tree(target_tree)?;

    // drop tracked files that have no counterpart in the target
    let tracked = index.tracked_paths();
    for path in tracked {
        if !target_files.contains_key(&path) {
            workspace.remove_file(&path)?;
        }
    }

    index.read_tree(database, target_tree)?;

    for (path, entry) in &target_files {
        let blob = database.load_blob(&entry.oid)?;
        workspace.write_file(path, blob.content(), entry.mode)?;
        let stat = workspace.stat_file(path)?;
        index.update_entry_stat(path, stat);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::collections::BTreeMap;
    use std::ffi::OsString;
    use std::path::PathBuf;

    struct Setup {
        database: Database,
        workspace: Workspace,
        index: Index,
        _dir: TempDir,
    }

    #[fixture]
    fn setup() -> Setup {
        let dir = TempDir::new().unwrap();
        Setup {
            database: Database::new(dir.path().join(".lit/objects").into()),
            workspace: Workspace::new(dir.path().to_path_buf().into(), OsString::from(".lit")),
            index: Index::new(dir.path().join(".lit/index").into()),
            _dir: dir,
        }
    }

    fn tree_of(database: &Database, files: &[(&str, &[u8])]) -> ObjectId {
        let mut flat = BTreeMap::new();
        for (path, content) in files {
            let oid = database.store(&Blob::from_bytes(content.to_vec())).unwrap();
            flat.insert(
                PathBuf::from(path),
                TreeEntry::new(oid, EntryMode::File(FileMode::Regular)),
            );
        }
        database.write_flat_tree(&flat).unwrap()
    }

    #[rstest]
    fn materializes_target_tree_from_scratch(mut setup: Setup) {
        let target = tree_of(&setup.database, &[("a.txt", b"a\n"), ("d/b.txt", b"b\n")]);

        let migration =
            Migration::plan(&setup.database, &setup.workspace, None, Some(&target)).unwrap();
        migration.check_dirty(&setup.index).unwrap();
        migration.apply(&mut setup.index).unwrap();

        assert_eq!(
            &setup.workspace.read_file(Path::new("a.txt")).unwrap()[..],
            b"a\n"
        );
        assert_eq!(
            &setup.workspace.read_file(Path::new("d/b.txt")).unwrap()[..],
            b"b\n"
        );
        assert!(setup.index.entry_by_path(Path::new("a.txt")).is_some());
    }

    #[rstest]
    fn switches_between_trees(mut setup: Setup) {
        let from = tree_of(&setup.database, &[("stay.txt", b"s\n"), ("old.txt", b"o\n")]);
        let to = tree_of(&setup.database, &[("stay.txt", b"s\n"), ("new.txt", b"n\n")]);

        let first = Migration::plan(&setup.database, &setup.workspace, None, Some(&from)).unwrap();
        first.apply(&mut setup.index).unwrap();

        let second =
            Migration::plan(&setup.database, &setup.workspace, Some(&from), Some(&to)).unwrap();
        second.check_dirty(&setup.index).unwrap();
        second.apply(&mut setup.index).unwrap();

        assert!(!setup.workspace.file_exists(Path::new("old.txt")));
        assert_eq!(
            &setup.workspace.read_file(Path::new("new.txt")).unwrap()[..],
            b"n\n"
        );
    }

    #[rstest]
    fn dirty_modification_aborts_before_any_change(mut setup: Setup) {
        let from = tree_of(&setup.database, &[("f.txt", b"v1\n"), ("g.txt", b"g\n")]);
        let to = tree_of(&setup.database, &[("f.txt", b"v2\n"), ("g.txt", b"g2\n")]);

        let first = Migration::plan(&setup.database, &setup.workspace, None, Some(&from)).unwrap();
        first.apply(&mut setup.index).unwrap();

        // local edit to f.txt must block the checkout
        setup
            .workspace
            .write_file(Path::new("f.txt"), b"local change\n", EntryMode::File(FileMode::Regular))
            .unwrap();

        let second =
            Migration::plan(&setup.database, &setup.workspace, Some(&from), Some(&to)).unwrap();
        let err = second.check_dirty(&setup.index).unwrap_err();
        match err.downcast_ref::<LitError>() {
            Some(LitError::Dirty { paths }) => {
                assert_eq!(paths, &vec![PathBuf::from("f.txt")]);
            }
            other => panic!("expected Dirty, got {other:?}"),
        }

        // nothing was applied
        assert_eq!(
            &setup.workspace.read_file(Path::new("g.txt")).unwrap()[..],
            b"g\n"
        );
    }

    #[rstest]
    fn untracked_file_in_the_way_is_dirty(mut setup: Setup) {
        let target = tree_of(&setup.database, &[("new.txt", b"tracked\n")]);
        setup
            .workspace
            .write_file(
                Path::new("new.txt"),
                b"untracked local\n",
                EntryMode::File(FileMode::Regular),
            )
            .unwrap();

        let migration =
            Migration::plan(&setup.database, &setup.workspace, None, Some(&target)).unwrap();
        assert!(migration.check_dirty(&setup.index).is_err());
    }

    #[rstest]
    fn force_checkout_overwrites_tracked_and_keeps_untracked(mut setup: Setup) {
        let from = tree_of(&setup.database, &[("f.txt", b"v1\n")]);
        let first = Migration::plan(&setup.database, &setup.workspace, None, Some(&from)).unwrap();
        first.apply(&mut setup.index).unwrap();

        setup
            .workspace
            .write_file(Path::new("f.txt"), b"dirty\n", EntryMode::File(FileMode::Regular))
            .unwrap();
        setup
            .workspace
            .write_file(
                Path::new("untracked.txt"),
                b"keep me\n",
                EntryMode::File(FileMode::Regular),
            )
            .unwrap();

        let target = tree_of(&setup.database, &[("g.txt", b"v2\n")]);
        force_checkout(&setup.database, &setup.workspace, &mut setup.index, &target).unwrap();

        assert!(!setup.workspace.file_exists(Path::new("f.txt")));
        assert_eq!(
            &setup.workspace.read_file(Path::new("g.txt")).unwrap()[..],
            b"v2\n"
        );
        assert_eq!(
            &setup.workspace.read_file(Path::new("untracked.txt")).unwrap()[..],
            b"keep me\n"
        );
        assert!(setup.index.entry_by_path(Path::new("g.txt")).is_some());
        assert!(setup.index.entry_by_path(Path::new("f.txt")).is_none());
    }
}

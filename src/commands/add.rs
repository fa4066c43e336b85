use crate::areas::repository::Repository;
use crate::artifacts::ignore::IgnoreMatcher;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::errors::LitError;
use std::path::{Path, PathBuf};
use tracing::debug;

impl Repository {
    /// Stage files: hash their content into blobs and upsert stage-0
    /// index entries
    ///
    /// Directory arguments are expanded through the ignore matcher;
    /// explicitly named files are staged regardless (tracked files are
    /// never ignored).
    pub fn add(&self, raw_paths: &[String]) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let matcher = IgnoreMatcher::load(self.root(), &self.lit_dir().join("info/exclude"));
        let mut index = self.index();

        let mut to_stage: Vec<PathBuf> = Vec::new();
        for raw in raw_paths {
            let requested = self.normalize_path(raw)?;
            let absolute = self.root().join(&requested);

            if absolute.is_dir() {
                let subpath = if requested.as_os_str().is_empty() {
                    None
                } else {
                    Some(requested.as_path())
                };
                for file in self.workspace().list_files(subpath)? {
                    if index.is_tracked(&file) || !matcher.is_ignored(&file, false) {
                        to_stage.push(file);
                    }
                }
            } else if self.workspace().file_exists(&requested) {
                to_stage.push(requested);
            } else if index.entry_by_path(&requested).is_some() {
                // staging a deleted file records the deletion
                index.remove(&requested);
            } else {
                return Err(LitError::NotFound {
                    kind: "path",
                    name: raw.clone(),
                }
                .into());
            }
        }

        for path in to_stage {
            let content = self.workspace().read_file(&path)?;
            let blob = Blob::from_bytes(content);
            let oid = self.database().store(&blob)?;
            let stat = self.workspace().stat_file(&path)?;

            debug!(path = %path.display(), %oid, "staged");
            index.add(IndexEntry::new(path, oid, stat));
        }

        index.write_updates()
    }

    /// Revert a path's index entry to the HEAD tree's version, or drop
    /// the entry entirely when HEAD does not know the path
    pub fn unstage(&self, raw_paths: &[String]) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let head_files = match self.head_tree_oid()? {
            Some(tree_oid) => self.database().flatten_tree(&tree_oid)?,
            None => Default::default(),
        };

        let mut index = self.index();
        for raw in raw_paths {
            let path = self.normalize_path(raw)?;

            match head_files.get(&path) {
                Some(entry) => {
                    index.add(IndexEntry::new_at_stage(
                        path,
                        entry.oid.clone(),
                        crate::artifacts::index::STAGE_CLEAN,
                        entry.mode,
                    ));
                }
                None => index.remove(&path),
            }
        }

        index.write_updates()
    }

    /// Remove a path from the index (and optionally the working tree)
    pub fn remove_path(&self, raw_paths: &[String], cached: bool) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let mut index = self.index();
        for raw in raw_paths {
            let path = self.normalize_path(raw)?;
            if index.entry_by_path(&path).is_none() {
                return Err(LitError::NotFound {
                    kind: "path",
                    name: raw.clone(),
                }
                .into());
            }

            index.remove(&path);
            if !cached {
                self.workspace().remove_file(&path)?;
            }
        }

        index.write_updates()
    }

    /// Make a user-supplied path repository-relative
    pub(crate) fn normalize_path(&self, raw: &str) -> anyhow::Result<PathBuf> {
        let candidate = Path::new(raw);

        if candidate.is_absolute() {
            return candidate
                .strip_prefix(self.root())
                .map(Path::to_path_buf)
                .map_err(|_| {
                    LitError::NotFound {
                        kind: "path",
                        name: raw.to_string(),
                    }
                    .into()
                });
        }

        if raw == "." {
            return Ok(PathBuf::new());
        }

        Ok(candidate
            .components()
            .filter(|c| !matches!(c, std::path::Component::CurDir))
            .collect())
    }
}

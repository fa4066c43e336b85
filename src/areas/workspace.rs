//! Working tree access
//!
//! File IO for the checked-out tree: reading and hashing candidate files,
//! materialising blobs (including the executable bit and symlinks), and
//! enumerating files while skipping the repository metadata directory.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::EntryMetadata;
use anyhow::Context;
use bytes::Bytes;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct Workspace {
    /// Repository root
    path: Box<Path>,
    /// Name of the metadata directory to skip (usually `.lit`)
    repo_dir_name: OsString,
}

impl Workspace {
    pub fn new(path: Box<Path>, repo_dir_name: OsString) -> Self {
        Workspace {
            path,
            repo_dir_name,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn absolute(&self, file_path: &Path) -> PathBuf {
        self.path.join(file_path)
    }

    fn is_ignored_component(&self, path: &Path) -> bool {
        path.components().any(|component| {
            matches!(
                component,
                std::path::Component::Normal(name) if name == self.repo_dir_name.as_os_str()
            )
        })
    }

    /// Read the raw content of a working-tree file
    ///
    /// Symlinks yield their target path as content, matching how links
    /// are stored in blobs.
    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let absolute = self.absolute(file_path);
        let metadata = std::fs::symlink_metadata(&absolute)
            .with_context(|| format!("unable to stat {}", absolute.display()))?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&absolute)?;
            return Ok(Bytes::from(target.as_os_str().to_string_lossy().into_owned()));
        }

        let content = std::fs::read(&absolute)
            .with_context(|| format!("unable to read {}", absolute.display()))?;

        Ok(Bytes::from(content))
    }

    pub fn file_exists(&self, file_path: &Path) -> bool {
        let absolute = self.absolute(file_path);
        std::fs::symlink_metadata(absolute).is_ok()
    }

    /// Stat a file without following symlinks
    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        let absolute = self.absolute(file_path);
        let metadata = std::fs::symlink_metadata(&absolute)
            .with_context(|| format!("unable to stat {}", absolute.display()))?;

        Ok(EntryMetadata::capture(&absolute, &metadata))
    }

    /// Materialise blob content at a path with the given mode
    pub fn write_file(
        &self,
        file_path: &Path,
        data: &[u8],
        mode: EntryMode,
    ) -> anyhow::Result<()> {
        let absolute = self.absolute(file_path);

        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("unable to create directory {}", parent.display()))?;
        }

        // replace whatever occupies the path
        if let Ok(metadata) = std::fs::symlink_metadata(&absolute) {
            if metadata.is_dir() {
                std::fs::remove_dir_all(&absolute)?;
            } else {
                std::fs::remove_file(&absolute)?;
            }
        }

        if mode == EntryMode::Symlink {
            let target = PathBuf::from(String::from_utf8_lossy(data).into_owned());
            #[cfg(unix)]
            std::os::unix::fs::symlink(target, &absolute)
                .with_context(|| format!("unable to create symlink {}", absolute.display()))?;
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&absolute)
            .with_context(|| format!("unable to open {}", absolute.display()))?;
        file.write_all(data)
            .with_context(|| format!("unable to write {}", absolute.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = if mode.is_executable() {
                std::fs::Permissions::from_mode(0o755)
            } else {
                std::fs::Permissions::from_mode(0o644)
            };
            std::fs::set_permissions(&absolute, permissions).with_context(|| {
                format!("unable to set permissions on {}", absolute.display())
            })?;
        }

        Ok(())
    }

    /// Delete a file and any directories the deletion empties
    pub fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let absolute = self.absolute(file_path);

        if absolute.exists() || std::fs::symlink_metadata(&absolute).is_ok() {
            std::fs::remove_file(&absolute)
                .with_context(|| format!("unable to remove {}", absolute.display()))?;
        }
        self.prune_empty_dirs(file_path.parent());

        Ok(())
    }

    fn prune_empty_dirs(&self, dir: Option<&Path>) {
        let mut current = dir;
        while let Some(rel) = current {
            if rel.as_os_str().is_empty() {
                break;
            }
            let absolute = self.absolute(rel);
            match absolute.read_dir() {
                Ok(mut entries) => {
                    if entries.next().is_none() {
                        if std::fs::remove_dir(&absolute).is_err() {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
            current = rel.parent();
        }
    }

    /// All files under the root (or a subpath), repository-relative,
    /// skipping the metadata directory
    pub fn list_files(&self, subpath: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root = match subpath {
            Some(p) => self.absolute(p),
            None => self.path.to_path_buf(),
        };

        if !root.exists() {
            return Ok(Vec::new());
        }

        if root.is_file() {
            let relative = root
                .strip_prefix(self.path.as_ref())
                .map(Path::to_path_buf)
                .unwrap_or_default();
            return Ok(vec![relative]);
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&root)
            .into_iter()
            .filter_entry(|entry| {
                entry.file_name() != self.repo_dir_name.as_os_str()
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() || entry.file_type().is_symlink())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(self.path.as_ref()).ok()?;
                if self.is_ignored_component(relative) {
                    None
                } else {
                    Some(relative.to_path_buf())
                }
            })
            .collect();

        files.sort();
        Ok(files)
    }
}

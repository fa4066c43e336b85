use crate::areas::repository::Repository;
use crate::artifacts::ignore::IgnoreMatcher;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Snapshot of working-tree and index state
#[derive(Debug, Default)]
pub struct StatusReport {
    /// Path -> status char (A/M/D) for index vs HEAD
    pub staged: BTreeMap<PathBuf, char>,
    /// Path -> status char (M/D) for working tree vs index
    pub unstaged: BTreeMap<PathBuf, char>,
    pub untracked: Vec<PathBuf>,
    pub conflicted: Vec<PathBuf>,
    /// In-progress operation, if any ("merge", "cherry-pick", "rebase")
    pub in_progress: Option<&'static str>,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
            && self.conflicted.is_empty()
    }
}

impl Repository {
    /// Compute the current status
    ///
    /// Stat comparison against the index entry short-circuits hashing;
    /// entries whose stats drifted but whose content still matches get
    /// their cached stats refreshed.
    pub fn status(&self) -> anyhow::Result<StatusReport> {
        let mut report = StatusReport::default();

        let head_files = match self.head_tree_oid()? {
            Some(tree_oid) => self.database().flatten_tree(&tree_oid)?,
            None => Default::default(),
        };

        let mut index = self.index();
        report.conflicted = index.conflict_paths();

        // index vs HEAD
        for entry in index.clean_entries() {
            match head_files.get(&entry.name) {
                None => {
                    report.staged.insert(entry.name.clone(), 'A');
                }
                Some(head_entry) => {
                    if head_entry.oid != entry.oid || head_entry.mode != entry.metadata.mode {
                        report.staged.insert(entry.name.clone(), 'M');
                    }
                }
            }
        }
        for path in head_files.keys() {
            if index.entry_by_path(path).is_none() && !report.conflicted.contains(path) {
                report.staged.insert(path.clone(), 'D');
            }
        }

        // working tree vs index
        let mut refreshed: Vec<(PathBuf, crate::artifacts::index::index_entry::EntryMetadata)> =
            Vec::new();
        for entry in index.clean_entries() {
            if !self.workspace().file_exists(&entry.name) {
                report.unstaged.insert(entry.name.clone(), 'D');
                continue;
            }

            let stat = self.workspace().stat_file(&entry.name)?;
            if entry.stat_match(&stat) && entry.times_match(&stat) {
                continue;
            }

            let content = self.workspace().read_file(&entry.name)?;
            let oid = Blob::from_bytes(content).object_id()?;
            if oid != entry.oid || stat.mode != entry.metadata.mode {
                report.unstaged.insert(entry.name.clone(), 'M');
            } else {
                refreshed.push((entry.name.clone(), stat));
            }
        }
        for (path, stat) in refreshed {
            index.update_entry_stat(&path, stat);
        }
        if index.is_changed() && !self.is_bare() {
            index.write_updates()?;
        }

        // untracked files
        let matcher = IgnoreMatcher::load(self.root(), &self.lit_dir().join("info/exclude"));
        for file in self.workspace().list_files(None)? {
            if !index.is_tracked(&file) && !matcher.is_ignored(&file, false) {
                report.untracked.push(file);
            }
        }

        report.in_progress = if self.refs().read_merge_head()?.is_some() {
            Some("merge")
        } else if self.refs().read_cherry_pick_head()?.is_some() {
            Some("cherry-pick")
        } else if self.rebase_state_dir().exists() {
            Some("rebase")
        } else {
            None
        };

        Ok(report)
    }

    /// Print the status in the long format
    pub fn print_status(&self) -> anyhow::Result<()> {
        let report = self.status()?;

        match self.refs().current_branch()? {
            Some(branch) => writeln!(self.writer(), "On branch {branch}")?,
            None => {
                if let Some(head) = self.refs().read_head()? {
                    writeln!(self.writer(), "HEAD detached at {}", head.to_short_oid())?;
                }
            }
        }

        if let Some(operation) = report.in_progress {
            writeln!(self.writer(), "You are in the middle of a {operation}.")?;
        }

        if !report.conflicted.is_empty() {
            writeln!(self.writer(), "\nUnmerged paths:")?;
            for path in &report.conflicted {
                writeln!(
                    self.writer(),
                    "\t{}",
                    format!("both modified:   {}", path.display()).red()
                )?;
            }
        }

        if !report.staged.is_empty() {
            writeln!(self.writer(), "\nChanges to be committed:")?;
            for (path, status) in &report.staged {
                let label = match status {
                    'A' => "new file",
                    'D' => "deleted",
                    _ => "modified",
                };
                writeln!(
                    self.writer(),
                    "\t{}",
                    format!("{label}:   {}", path.display()).green()
                )?;
            }
        }

        if !report.unstaged.is_empty() {
            writeln!(self.writer(), "\nChanges not staged for commit:")?;
            for (path, status) in &report.unstaged {
                let label = if *status == 'D' { "deleted" } else { "modified" };
                writeln!(
                    self.writer(),
                    "\t{}",
                    format!("{label}:   {}", path.display()).red()
                )?;
            }
        }

        if !report.untracked.is_empty() {
            writeln!(self.writer(), "\nUntracked files:")?;
            for path in &report.untracked {
                writeln!(self.writer(), "\t{}", path.display().to_string().red())?;
            }
        }

        if report.is_clean() {
            writeln!(self.writer(), "nothing to commit, working tree clean")?;
        }

        Ok(())
    }
}

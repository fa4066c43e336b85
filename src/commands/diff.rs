use crate::areas::repository::Repository;
use crate::artifacts::diff::diff_algorithm::MyersDiff;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::blob::{Blob, is_binary};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use bytes::Bytes;
use colored::Colorize;
use std::path::Path;

/// One side of a file diff
struct DiffTarget {
    oid: String,
    mode: Option<EntryMode>,
    content: Bytes,
}

impl DiffTarget {
    fn absent() -> Self {
        DiffTarget {
            oid: "0".repeat(40),
            mode: None,
            content: Bytes::new(),
        }
    }

    fn from_blob(oid: &ObjectId, mode: EntryMode, content: Bytes) -> Self {
        DiffTarget {
            oid: oid.to_string(),
            mode: Some(mode),
            content,
        }
    }

    fn short_oid(&self) -> &str {
        &self.oid[..7]
    }

    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.content)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Repository {
    /// `diff` (worktree vs index), `diff --cached` (index vs HEAD) or
    /// `diff <a> <b>` (two revisions)
    pub fn diff(&self, cached: bool, revisions: &[String]) -> anyhow::Result<()> {
        match revisions {
            [a, b] => {
                let old = self.rev_parse(a)?;
                let new = self.rev_parse(b)?;
                let old_tree = self.database().load_commit(&old)?.tree_oid().clone();
                let new_tree = self.database().load_commit(&new)?.tree_oid().clone();
                self.print_tree_diff(Some(&old_tree), Some(&new_tree))
            }
            [] if cached => {
                let head_tree = self.head_tree_oid()?;
                self.diff_head_index(head_tree.as_ref())
            }
            [] => self.diff_index_worktree(),
            _ => anyhow::bail!("diff takes zero or two revisions"),
        }
    }

    fn diff_index_worktree(&self) -> anyhow::Result<()> {
        let index = self.index();

        for entry in index.clean_entries() {
            let old = DiffTarget::from_blob(
                &entry.oid,
                entry.metadata.mode,
                Bytes::copy_from_slice(self.database().load_blob(&entry.oid)?.content()),
            );

            if !self.workspace().file_exists(&entry.name) {
                self.print_file_diff(&entry.name, old, DiffTarget::absent())?;
                continue;
            }

            let stat = self.workspace().stat_file(&entry.name)?;
            if entry.stat_match(&stat) && entry.times_match(&stat) {
                continue;
            }

            let content = self.workspace().read_file(&entry.name)?;
            let blob = Blob::from_bytes(content.clone());
            let worktree_oid = blob.object_id()?;
            if worktree_oid == entry.oid && stat.mode == entry.metadata.mode {
                continue;
            }

            let new = DiffTarget::from_blob(&worktree_oid, stat.mode, content);
            self.print_file_diff(&entry.name, old, new)?;
        }

        Ok(())
    }

    fn diff_head_index(&self, head_tree: Option<&ObjectId>) -> anyhow::Result<()> {
        let head_files = match head_tree {
            Some(tree_oid) => self.database().flatten_tree(tree_oid)?,
            None => Default::default(),
        };
        let index = self.index();

        for entry in index.clean_entries() {
            match head_files.get(&entry.name) {
                None => {
                    let new = DiffTarget::from_blob(
                        &entry.oid,
                        entry.metadata.mode,
                        Bytes::copy_from_slice(
                            self.database().load_blob(&entry.oid)?.content(),
                        ),
                    );
                    self.print_file_diff(&entry.name, DiffTarget::absent(), new)?;
                }
                Some(head_entry)
                    if head_entry.oid != entry.oid
                        || head_entry.mode != entry.metadata.mode =>
                {
                    let old = DiffTarget::from_blob(
                        &head_entry.oid,
                        head_entry.mode,
                        Bytes::copy_from_slice(
                            self.database().load_blob(&head_entry.oid)?.content(),
                        ),
                    );
                    let new = DiffTarget::from_blob(
                        &entry.oid,
                        entry.metadata.mode,
                        Bytes::copy_from_slice(
                            self.database().load_blob(&entry.oid)?.content(),
                        ),
                    );
                    self.print_file_diff(&entry.name, old, new)?;
                }
                Some(_) => {}
            }
        }

        for (path, head_entry) in &head_files {
            if index.entry_by_path(path).is_none() {
                let old = DiffTarget::from_blob(
                    &head_entry.oid,
                    head_entry.mode,
                    Bytes::copy_from_slice(self.database().load_blob(&head_entry.oid)?.content()),
                );
                self.print_file_diff(path, old, DiffTarget::absent())?;
            }
        }

        Ok(())
    }

    /// Full-content diff between two trees
    pub(crate) fn print_tree_diff(
        &self,
        old_tree: Option<&ObjectId>,
        new_tree: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        let mut tree_diff = crate::artifacts::diff::tree_diff::TreeDiff::new(self.database());
        tree_diff.compare_oids(old_tree, new_tree)?;

        for (path, change) in tree_diff.changes() {
            let old = match change.old_entry() {
                Some(entry) => DiffTarget::from_blob(
                    &entry.oid,
                    entry.mode,
                    Bytes::copy_from_slice(self.database().load_blob(&entry.oid)?.content()),
                ),
                None => DiffTarget::absent(),
            };
            let new = match change.new_entry() {
                Some(entry) => DiffTarget::from_blob(
                    &entry.oid,
                    entry.mode,
                    Bytes::copy_from_slice(self.database().load_blob(&entry.oid)?.content()),
                ),
                None => DiffTarget::absent(),
            };

            self.print_file_diff(path, old, new)?;
        }

        Ok(())
    }

    fn print_file_diff(&self, path: &Path, a: DiffTarget, b: DiffTarget) -> anyhow::Result<()> {
        if a.oid == b.oid && a.mode == b.mode {
            return Ok(());
        }

        let a_label = format!("a/{}", path.display());
        let b_label = format!("b/{}", path.display());

        writeln!(
            self.writer(),
            "{}",
            format!("diff --lit {a_label} {b_label}").bold()
        )?;

        match (a.mode, b.mode) {
            (None, Some(mode)) => {
                writeln!(
                    self.writer(),
                    "{}",
                    format!("new file mode {}", mode.as_padded_str()).bold()
                )?;
            }
            (Some(mode), None) => {
                writeln!(
                    self.writer(),
                    "{}",
                    format!("deleted file mode {}", mode.as_padded_str()).bold()
                )?;
            }
            (Some(old_mode), Some(new_mode)) if old_mode != new_mode => {
                writeln!(
                    self.writer(),
                    "{}",
                    format!("old mode {}", old_mode.as_padded_str()).bold()
                )?;
                writeln!(
                    self.writer(),
                    "{}",
                    format!("new mode {}", new_mode.as_padded_str()).bold()
                )?;
            }
            _ => {}
        }

        if a.oid == b.oid {
            return Ok(());
        }

        writeln!(
            self.writer(),
            "{}",
            format!("index {}..{}", a.short_oid(), b.short_oid()).bold()
        )?;

        // NUL in the first 8 KiB of either side: no textual hunks
        if is_binary(&a.content) || is_binary(&b.content) {
            writeln!(
                self.writer(),
                "Binary files {a_label} and {b_label} differ"
            )?;
            return Ok(());
        }

        let from_label = if a.mode.is_none() {
            "--- /dev/null".to_string()
        } else {
            format!("--- {a_label}")
        };
        let to_label = if b.mode.is_none() {
            "+++ /dev/null".to_string()
        } else {
            format!("+++ {b_label}")
        };
        writeln!(self.writer(), "{}", from_label.bold())?;
        writeln!(self.writer(), "{}", to_label.bold())?;

        let a_lines = a.lines();
        let b_lines = b.lines();
        for hunk in MyersDiff::new(&a_lines, &b_lines).hunks() {
            writeln!(self.writer(), "{}", hunk.header().cyan())?;
            for edit in hunk.edits() {
                let rendered = edit.as_string();
                let line = if rendered.starts_with('+') {
                    rendered.green().to_string()
                } else if rendered.starts_with('-') {
                    rendered.red().to_string()
                } else {
                    rendered
                };
                writeln!(self.writer(), "{line}")?;
            }
        }

        Ok(())
    }
}

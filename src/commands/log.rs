use crate::areas::repository::Repository;
use crate::artifacts::log::graph::GraphRenderer;
use crate::artifacts::log::rev_list::{RevList, commit_touches_path};
use crate::errors::LitError;
use colored::Colorize;
use std::path::PathBuf;

/// Options for the history walk
#[derive(Debug, Default)]
pub struct LogOptions {
    /// Revisions to start from (`A..B` ranges supported); HEAD if empty
    pub revisions: Vec<String>,
    pub oneline: bool,
    pub max_count: Option<usize>,
    pub path: Option<PathBuf>,
    pub graph: bool,
}

impl Repository {
    pub fn log(&self, options: &LogOptions) -> anyhow::Result<()> {
        let mut walk = RevList::new(self.database());

        if options.revisions.is_empty() {
            let head_oid = self
                .refs()
                .read_head()?
                .ok_or_else(|| LitError::UnbornBranch {
                    reference: "HEAD".to_string(),
                })?;
            walk.push(&head_oid)?;
        } else {
            for revision in &options.revisions {
                match revision.split_once("..") {
                    Some((excluded, included)) => {
                        let excluded_oid =
                            self.rev_parse(excluded)?;
                        let included = if included.is_empty() { "HEAD" } else { included };
                        let included_oid =
                            self.rev_parse(included)?;
                        walk.exclude(&excluded_oid)?;
                        walk.push(&included_oid)?;
                    }
                    None => {
                        let oid = self.rev_parse(revision)?;
                        walk.push(&oid)?;
                    }
                }
            }
        }

        let reverse_refs = self.refs().reverse_refs()?;
        let mut graph = GraphRenderer::new();
        let mut shown = 0usize;

        while let Some((oid, commit)) = walk.next_commit()? {
            if let Some(path) = &options.path
                && !commit_touches_path(self.database(), &commit, path)?
            {
                continue;
            }
            if let Some(max) = options.max_count
                && shown >= max
            {
                break;
            }
            shown += 1;

            let decoration = reverse_refs
                .get(&oid)
                .map(|names| format!(" ({})", names.join(", ")))
                .unwrap_or_default();

            if options.graph {
                let (prefix, connectors) = graph.render(&oid, commit.parents());
                if options.oneline {
                    writeln!(
                        self.writer(),
                        "{}{} {}",
                        prefix,
                        oid.to_short_oid().yellow(),
                        commit.short_message()
                    )?;
                } else {
                    writeln!(
                        self.writer(),
                        "{}{}{}",
                        prefix,
                        format!("commit {oid}").yellow(),
                        decoration.cyan()
                    )?;
                    writeln!(self.writer(), "Author: {}", commit.author().display_name())?;
                    writeln!(
                        self.writer(),
                        "Date:   {}",
                        commit.author().readable_timestamp()
                    )?;
                    writeln!(self.writer())?;
                    for line in commit.message().lines() {
                        writeln!(self.writer(), "    {line}")?;
                    }
                    writeln!(self.writer())?;
                }
                for connector in connectors {
                    writeln!(self.writer(), "{connector}")?;
                }
            } else if options.oneline {
                writeln!(
                    self.writer(),
                    "{}{} {}",
                    oid.to_short_oid().yellow(),
                    decoration.cyan(),
                    commit.short_message()
                )?;
            } else {
                writeln!(
                    self.writer(),
                    "{}{}",
                    format!("commit {oid}").yellow(),
                    decoration.cyan()
                )?;
                if commit.is_merge() {
                    let parents = commit
                        .parents()
                        .iter()
                        .map(|p| p.to_short_oid())
                        .collect::<Vec<_>>()
                        .join(" ");
                    writeln!(self.writer(), "Merge: {parents}")?;
                }
                writeln!(self.writer(), "Author: {}", commit.author().display_name())?;
                writeln!(
                    self.writer(),
                    "Date:   {}",
                    commit.author().readable_timestamp()
                )?;
                writeln!(self.writer())?;
                for line in commit.message().lines() {
                    writeln!(self.writer(), "    {line}")?;
                }
                writeln!(self.writer())?;
            }
        }

        Ok(())
    }

    /// `show`: one commit with its diff summary
    pub fn show(&self, revision: Option<&str>) -> anyhow::Result<()> {
        let oid = match revision {
            Some(rev) => self.rev_parse(rev)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| LitError::UnbornBranch {
                    reference: "HEAD".to_string(),
                })?,
        };
        let commit = self.database().load_commit(&oid)?;

        writeln!(self.writer(), "{}", format!("commit {oid}").yellow())?;
        writeln!(self.writer(), "Author: {}", commit.author().display_name())?;
        writeln!(
            self.writer(),
            "Date:   {}",
            commit.author().readable_timestamp()
        )?;
        writeln!(self.writer())?;
        for line in commit.message().lines() {
            writeln!(self.writer(), "    {line}")?;
        }
        writeln!(self.writer())?;

        let parent_tree = match commit.parent() {
            Some(parent) => Some(self.database().load_commit(parent)?.tree_oid().clone()),
            None => None,
        };
        self.print_tree_diff(parent_tree.as_ref(), Some(commit.tree_oid()))
    }
}

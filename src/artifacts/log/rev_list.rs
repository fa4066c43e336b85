//! Revision walk
//!
//! Yields commits reachable from the pushed tips, newest committer
//! timestamp first, each commit exactly once. The walk is a restartable
//! cursor: the frontier (priority queue) and visited set are explicit
//! state, and consumers pull one commit at a time.
//!
//! Excluded tips mark their whole ancestry uninteresting, giving
//! `A..B`-style ranges.

use crate::areas::database::{CommitCache, Database};
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashSet};
use std::path::Path;

pub struct RevList<'a> {
    database: &'a Database,
    cache: CommitCache,
    frontier: BinaryHeap<(DateTime<FixedOffset>, ObjectId)>,
    visited: HashSet<ObjectId>,
    uninteresting: HashSet<ObjectId>,
}

impl<'a> RevList<'a> {
    pub fn new(database: &'a Database) -> Self {
        RevList {
            database,
            cache: CommitCache::new(),
            frontier: BinaryHeap::new(),
            visited: HashSet::new(),
            uninteresting: HashSet::new(),
        }
    }

    /// Add a tip to walk from
    pub fn push(&mut self, tip: &ObjectId) -> anyhow::Result<()> {
        if self.visited.insert(tip.clone()) {
            let slim = self.cache.get_or_load(self.database, tip)?;
            self.frontier.push((slim.timestamp, tip.clone()));
        }

        Ok(())
    }

    /// Mark a tip and its entire ancestry uninteresting
    pub fn exclude(&mut self, tip: &ObjectId) -> anyhow::Result<()> {
        let mut stack = vec![tip.clone()];
        while let Some(oid) = stack.pop() {
            if !self.uninteresting.insert(oid.clone()) {
                continue;
            }
            let slim = self.cache.get_or_load(self.database, &oid)?;
            stack.extend(slim.parents.iter().cloned());
        }

        Ok(())
    }

    /// Pull the next commit, or `None` when the walk is exhausted
    pub fn next_commit(&mut self) -> anyhow::Result<Option<(ObjectId, Commit)>> {
        while let Some((_, oid)) = self.frontier.pop() {
            let commit = self.database.load_commit(&oid)?;

            for parent in commit.parents() {
                if self.visited.insert(parent.clone()) {
                    let slim = self.cache.get_or_load(self.database, parent)?;
                    self.frontier.push((slim.timestamp, parent.clone()));
                }
            }

            if self.uninteresting.contains(&oid) {
                continue;
            }

            return Ok(Some((oid, commit)));
        }

        Ok(None)
    }

    /// Collect the whole remaining walk
    pub fn collect_all(&mut self) -> anyhow::Result<Vec<(ObjectId, Commit)>> {
        let mut commits = Vec::new();
        while let Some(entry) = self.next_commit()? {
            commits.push(entry);
        }

        Ok(commits)
    }
}

/// Whether a commit changed anything under `path` relative to its first
/// parent (the root commit compares against the empty tree)
pub fn commit_touches_path(
    database: &Database,
    commit: &Commit,
    path: &Path,
) -> anyhow::Result<bool> {
    let parent_tree = match commit.parent() {
        Some(parent_oid) => Some(database.load_commit(parent_oid)?.tree_oid().clone()),
        None => None,
    };

    let mut tree_diff = TreeDiff::new(database);
    tree_diff.compare_oids(parent_tree.as_ref(), Some(commit.tree_oid()))?;

    Ok(tree_diff
        .changes()
        .keys()
        .any(|changed| changed.starts_with(path) || path.starts_with(changed)))
}

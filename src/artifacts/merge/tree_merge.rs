//! Three-way tree merge
//!
//! For every path present in at least one of base/ours/theirs, decides
//! the merged entry or records a conflict:
//!
//! | base | ours | theirs | result |
//! |------|------|--------|--------|
//! | X | X | X | unchanged |
//! | X | X | Y | theirs |
//! | X | Y | X | ours |
//! | X | Y | Y | same change, taken once |
//! | X | Y | Z | text merge, conflict on overlap |
//! | - | Y | - | ours |
//! | - | - | Z | theirs |
//! | - | Y | Z | add/add conflict (text-merged against empty base) |
//! | X | - | X | deleted |
//! | X | X | - | deleted |
//! | X | - | Z | modify/delete conflict |
//! | X | Y | - | modify/delete conflict |
//!
//! Binary content never goes through the text merge; an overlapping
//! binary change is a conflict outright.

use crate::areas::database::Database;
use crate::artifacts::merge::text_merge::{MergedText, ResolvedSide, merge_text};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::debug;

/// One unresolved path with its three stage entries and the content to
/// leave in the working tree (markers, or the surviving side)
#[derive(Debug, Clone)]
pub struct PathConflict {
    pub path: PathBuf,
    pub base: Option<TreeEntry>,
    pub ours: Option<TreeEntry>,
    pub theirs: Option<TreeEntry>,
    pub working: Bytes,
}

#[derive(Debug, Default)]
pub struct TreeMergeOutcome {
    /// Cleanly merged entries (the future tree)
    pub merged: BTreeMap<PathBuf, TreeEntry>,
    pub conflicts: Vec<PathConflict>,
}

impl TreeMergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflict_paths(&self) -> Vec<PathBuf> {
        self.conflicts.iter().map(|c| c.path.clone()).collect()
    }

    /// Materialise the merged map as tree objects
    pub fn write_tree(&self, database: &Database) -> anyhow::Result<ObjectId> {
        database.write_flat_tree(&self.merged)
    }
}

/// Merge `ours` and `theirs` trees against `base` (`None` = empty tree)
pub fn merge_trees(
    database: &Database,
    base: Option<&ObjectId>,
    ours: &ObjectId,
    theirs: &ObjectId,
    resolve: Option<ResolvedSide>,
    labels: (&str, &str),
) -> anyhow::Result<TreeMergeOutcome> {
    let base_files = match base {
        Some(oid) => database.flatten_tree(oid)?,
        None => BTreeMap::new(),
    };
    let ours_files = database.flatten_tree(ours)?;
    let theirs_files = database.flatten_tree(theirs)?;

    let mut paths: BTreeSet<PathBuf> = BTreeSet::new();
    paths.extend(base_files.keys().cloned());
    paths.extend(ours_files.keys().cloned());
    paths.extend(theirs_files.keys().cloned());

    let mut outcome = TreeMergeOutcome::default();

    for path in paths {
        let base_entry = base_files.get(&path);
        let ours_entry = ours_files.get(&path);
        let theirs_entry = theirs_files.get(&path);

        // agreement (both unchanged, both same change, both deleted)
        if ours_entry == theirs_entry {
            if let Some(entry) = ours_entry {
                outcome.merged.insert(path, entry.clone());
            }
            continue;
        }

        // one-sided change
        if base_entry == ours_entry {
            if let Some(entry) = theirs_entry {
                outcome.merged.insert(path, entry.clone());
            }
            continue;
        }
        if base_entry == theirs_entry {
            if let Some(entry) = ours_entry {
                outcome.merged.insert(path, entry.clone());
            }
            continue;
        }

        debug!(path = %path.display(), "overlapping change, attempting content merge");

        match (ours_entry, theirs_entry) {
            // both sides carry content: text merge (add/add merges
            // against the empty base)
            (Some(ours_entry), Some(theirs_entry)) => {
                let base_blob = match base_entry {
                    Some(entry) => Some(database.load_blob(&entry.oid)?),
                    None => None,
                };
                let ours_blob = database.load_blob(&ours_entry.oid)?;
                let theirs_blob = database.load_blob(&theirs_entry.oid)?;

                let any_binary = ours_blob.is_binary()
                    || theirs_blob.is_binary()
                    || base_blob.as_ref().is_some_and(|b| b.is_binary());

                if any_binary {
                    match resolve {
                        Some(ResolvedSide::Ours) => {
                            outcome.merged.insert(path, ours_entry.clone());
                        }
                        Some(ResolvedSide::Theirs) | Some(ResolvedSide::Union) => {
                            outcome.merged.insert(path, theirs_entry.clone());
                        }
                        None => outcome.conflicts.push(PathConflict {
                            path,
                            base: base_entry.cloned(),
                            ours: Some(ours_entry.clone()),
                            theirs: Some(theirs_entry.clone()),
                            working: Bytes::copy_from_slice(ours_blob.content()),
                        }),
                    }
                    continue;
                }

                let base_content = base_blob
                    .as_ref()
                    .map(|b| b.content().to_vec())
                    .unwrap_or_default();
                let MergedText { content, clean } = merge_text(
                    &base_content,
                    ours_blob.content(),
                    theirs_blob.content(),
                    labels,
                    resolve,
                );

                // a mode changed on one side only follows that side
                let mode = if base_entry.map(|e| e.mode) == Some(ours_entry.mode) {
                    theirs_entry.mode
                } else {
                    ours_entry.mode
                };

                if clean {
                    let merged_blob = Blob::from_bytes(content);
                    let merged_oid = database.store(&merged_blob)?;
                    outcome
                        .merged
                        .insert(path, TreeEntry::new(merged_oid, mode));
                } else {
                    outcome.conflicts.push(PathConflict {
                        path,
                        base: base_entry.cloned(),
                        ours: Some(ours_entry.clone()),
                        theirs: Some(theirs_entry.clone()),
                        working: Bytes::from(content),
                    });
                }
            }
            // modify/delete
            (present, absent_side) => {
                let surviving = present.or(absent_side).expect("one side present");

                match resolve {
                    Some(ResolvedSide::Ours) => {
                        if let Some(entry) = ours_entry {
                            outcome.merged.insert(path, entry.clone());
                        }
                    }
                    Some(ResolvedSide::Theirs) => {
                        if let Some(entry) = theirs_entry {
                            outcome.merged.insert(path, entry.clone());
                        }
                    }
                    Some(ResolvedSide::Union) => {
                        outcome.merged.insert(path, surviving.clone());
                    }
                    None => {
                        let blob = database.load_blob(&surviving.oid)?;
                        outcome.conflicts.push(PathConflict {
                            path,
                            base: base_entry.cloned(),
                            ours: ours_entry.cloned(),
                            theirs: theirs_entry.cloned(),
                            working: Bytes::copy_from_slice(blob.content()),
                        });
                    }
                }
            }
        }
    }

    Ok(outcome)
}

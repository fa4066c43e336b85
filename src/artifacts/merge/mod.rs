//! Merge algorithms
//!
//! - `merge_base`: lowest common ancestor search over the commit DAG
//! - `text_merge`: diff3-style three-way line merge with conflict markers
//!   and auto-resolution strategies
//! - `tree_merge`: per-path three-way tree merge producing a merged tree
//!   or a conflict set

pub mod merge_base;
pub mod text_merge;
pub mod tree_merge;

use crate::areas::database::Database;
use crate::artifacts::objects::object_id::ObjectId;
use text_merge::ResolvedSide;

/// Reduce a set of merge-base candidates to a single base tree
///
/// One candidate uses its tree directly. Multiple candidates (criss-cross
/// histories) are folded into a virtual base by recursively three-way
/// merging their trees, resolving any conflict toward the first side; the
/// result exists only as a throwaway tree, never as a commit. No
/// candidate at all yields `None`, the empty tree.
pub fn virtual_base_tree(
    database: &Database,
    bases: &[ObjectId],
) -> anyhow::Result<Option<ObjectId>> {
    match bases {
        [] => Ok(None),
        [single] => {
            let commit = database.load_commit(single)?;
            Ok(Some(commit.tree_oid().clone()))
        }
        [first, rest @ ..] => {
            let mut finder = merge_base::MergeBaseFinder::new(database);
            let mut acc_commit = first.clone();
            let mut acc_tree = database.load_commit(first)?.tree_oid().clone();

            for other in rest {
                let inner_bases = finder.find_all(&acc_commit, other)?;
                // recursion depth is capped at one level: several inner
                // candidates fall back to the first of them
                let inner_base_tree = match inner_bases.as_slice() {
                    [] => None,
                    [one, ..] => Some(database.load_commit(one)?.tree_oid().clone()),
                };

                let other_tree = database.load_commit(other)?.tree_oid().clone();
                let outcome = tree_merge::merge_trees(
                    database,
                    inner_base_tree.as_ref(),
                    &acc_tree,
                    &other_tree,
                    Some(ResolvedSide::Ours),
                    ("ours", "theirs"),
                )?;
                acc_tree = outcome.write_tree(database)?;
                // keep walking relative to the first candidate
                acc_commit = other.clone();
            }

            Ok(Some(acc_tree))
        }
    }
}

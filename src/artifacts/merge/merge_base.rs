//! Merge-base (lowest common ancestor) search
//!
//! Colours two frontiers through the commit DAG, processing commits
//! newest-first off a priority queue. A commit reached from both sides is
//! a common ancestor; its own ancestors are marked stale so only the
//! lowest ancestors survive. A final filtering pass removes candidates
//! reachable from another candidate, which handles criss-cross histories
//! where the colouring alone leaves redundant results.

use crate::areas::database::{CommitCache, Database};
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::debug;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct VisitState: u8 {
        const FROM_SOURCE = 0b001;
        const FROM_TARGET = 0b010;
        const FROM_BOTH = Self::FROM_SOURCE.bits() | Self::FROM_TARGET.bits();
        /// Ancestor of an already-found common ancestor
        const STALE = 0b100;
        /// Identified common ancestor
        const RESULT = 0b1000;
    }
}

pub struct MergeBaseFinder<'a> {
    database: &'a Database,
    cache: CommitCache,
}

impl<'a> MergeBaseFinder<'a> {
    pub fn new(database: &'a Database) -> Self {
        Self {
            database,
            cache: CommitCache::new(),
        }
    }

    /// All best common ancestors of `source` and `target`
    pub fn find_all(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
    ) -> anyhow::Result<Vec<ObjectId>> {
        if source == target {
            return Ok(vec![source.clone()]);
        }

        let states = self.colour_frontiers(source, target)?;

        let mut candidates: Vec<ObjectId> = states
            .iter()
            .filter(|(_, state)| state.contains(VisitState::RESULT) && !state.contains(VisitState::STALE))
            .map(|(oid, _)| oid.clone())
            .collect();
        candidates.sort();
        debug!(?candidates, "merge-base candidates after colouring");

        // drop any candidate that is an ancestor of another candidate
        let snapshot = candidates.clone();
        let mut best = Vec::new();
        for candidate in snapshot {
            let redundant = candidates
                .iter()
                .filter(|other| **other != candidate)
                .map(|other| self.is_ancestor(&candidate, other))
                .collect::<anyhow::Result<Vec<bool>>>()?
                .into_iter()
                .any(|is_ancestor| is_ancestor);

            if !redundant {
                best.push(candidate);
            }
        }

        debug!(?best, "best common ancestors");
        Ok(best)
    }

    /// A single merge base; with several candidates the newest wins
    pub fn find_one(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
    ) -> anyhow::Result<Option<ObjectId>> {
        let mut all = self.find_all(source, target)?;

        if all.len() > 1 {
            all.sort_by_key(|oid| {
                self.cache
                    .get_or_load(self.database, oid)
                    .ok()
                    .map(|slim| slim.timestamp)
            });
        }

        Ok(all.pop())
    }

    /// Whether `ancestor` is reachable from `descendant`
    pub fn is_ancestor(
        &mut self,
        ancestor: &ObjectId,
        descendant: &ObjectId,
    ) -> anyhow::Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }

        let mut visited = HashSet::new();
        let mut frontier = vec![descendant.clone()];

        while let Some(oid) = frontier.pop() {
            if !visited.insert(oid.clone()) {
                continue;
            }
            if oid == *ancestor {
                return Ok(true);
            }

            let slim = self.cache.get_or_load(self.database, &oid)?;
            frontier.extend(slim.parents.iter().cloned());
        }

        Ok(false)
    }

    fn colour_frontiers(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
    ) -> anyhow::Result<HashMap<ObjectId, VisitState>> {
        let mut states: HashMap<ObjectId, VisitState> = HashMap::new();
        let mut queue = BinaryHeap::new();

        let source_commit = self.cache.get_or_load(self.database, source)?;
        let target_commit = self.cache.get_or_load(self.database, target)?;

        states.insert(source.clone(), VisitState::FROM_SOURCE);
        states.insert(target.clone(), VisitState::FROM_TARGET);
        queue.push((source_commit.timestamp, source.clone()));
        queue.push((target_commit.timestamp, target.clone()));

        while let Some((_, oid)) = queue.pop() {
            let mut state = states.get(&oid).copied().unwrap_or(VisitState::empty());

            if state.contains(VisitState::FROM_BOTH) && !state.contains(VisitState::RESULT) {
                state |= VisitState::RESULT;
                states.insert(oid.clone(), state);
            }

            // what flows down to parents: the visit colours, plus STALE
            // below an identified result
            let mut inherited = state & (VisitState::FROM_BOTH | VisitState::STALE);
            if state.contains(VisitState::RESULT) {
                inherited |= VisitState::STALE;
            }

            let slim = self.cache.get_or_load(self.database, &oid)?;
            for parent in &slim.parents {
                let previous = states.get(parent).copied().unwrap_or(VisitState::empty());
                let updated = previous | inherited;

                if updated != previous || !states.contains_key(parent) {
                    states.insert(parent.clone(), updated);
                    let parent_commit = self.cache.get_or_load(self.database, parent)?;
                    queue.push((parent_commit.timestamp, parent.clone()));
                }
            }
        }

        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::commit::{Author, Commit, parse_timestamp};
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::tree::Tree;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    struct Dag {
        database: Database,
        clock: i64,
        _dir: TempDir,
    }

    impl Dag {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            Dag {
                database: Database::new(dir.path().join("objects").into()),
                clock: 1_700_000_000,
                _dir: dir,
            }
        }

        fn commit(&mut self, parents: &[&ObjectId], message: &str) -> ObjectId {
            self.clock += 10;
            let tree = Tree::default();
            let tree_oid = self.database.store(&tree).unwrap();
            let author = Author::new_with_timestamp(
                "T".to_string(),
                "t@x".to_string(),
                parse_timestamp(self.clock, "+0000").unwrap(),
            );
            let commit = Commit::new(
                parents.iter().map(|p| (*p).clone()).collect(),
                tree_oid,
                author.clone(),
                author,
                message.to_string(),
            );
            self.database.store(&commit).unwrap();
            commit.object_id().unwrap()
        }
    }

    #[fixture]
    fn dag() -> Dag {
        Dag::new()
    }

    #[rstest]
    fn linear_history_base_is_older_commit(mut dag: Dag) {
        let a = dag.commit(&[], "a");
        let b = dag.commit(&[&a], "b");
        let c = dag.commit(&[&b], "c");

        let mut finder = MergeBaseFinder::new(&dag.database);
        assert_eq!(finder.find_all(&b, &c).unwrap(), vec![b.clone()]);
        assert_eq!(finder.find_all(&c, &b).unwrap(), vec![b]);
    }

    #[rstest]
    fn simple_fork_base_is_fork_point(mut dag: Dag) {
        let a = dag.commit(&[], "a");
        let b = dag.commit(&[&a], "b");
        let c = dag.commit(&[&a], "c");

        let mut finder = MergeBaseFinder::new(&dag.database);
        assert_eq!(finder.find_all(&b, &c).unwrap(), vec![a]);
    }

    #[rstest]
    fn merge_base_is_symmetric(mut dag: Dag) {
        let root = dag.commit(&[], "root");
        let a = dag.commit(&[&root], "a");
        let b1 = dag.commit(&[&a], "b1");
        let c1 = dag.commit(&[&a], "c1");
        let b2 = dag.commit(&[&b1], "b2");
        let c2 = dag.commit(&[&c1], "c2");

        let mut finder = MergeBaseFinder::new(&dag.database);
        let forward = finder.find_all(&b2, &c2).unwrap();
        let backward = finder.find_all(&c2, &b2).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, vec![a]);
    }

    #[rstest]
    fn diamond_base_is_merge_commit(mut dag: Dag) {
        let a = dag.commit(&[], "a");
        let b = dag.commit(&[&a], "b");
        let c = dag.commit(&[&a], "c");
        let m = dag.commit(&[&b, &c], "m");
        let d = dag.commit(&[&m], "d");
        let e = dag.commit(&[&m], "e");

        let mut finder = MergeBaseFinder::new(&dag.database);
        assert_eq!(finder.find_all(&d, &e).unwrap(), vec![m]);
    }

    #[rstest]
    fn criss_cross_has_two_bases(mut dag: Dag) {
        let a = dag.commit(&[], "a");
        let b = dag.commit(&[&a], "b");
        let c = dag.commit(&[&a], "c");
        let m1 = dag.commit(&[&b, &c], "m1");
        let m2 = dag.commit(&[&c, &b], "m2");
        let d = dag.commit(&[&m1], "d");
        let e = dag.commit(&[&m2], "e");

        let mut finder = MergeBaseFinder::new(&dag.database);
        let mut bases = finder.find_all(&d, &e).unwrap();
        bases.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(bases, expected);
    }

    #[rstest]
    fn disjoint_histories_have_no_base(mut dag: Dag) {
        let a = dag.commit(&[], "a");
        let b = dag.commit(&[], "b");

        let mut finder = MergeBaseFinder::new(&dag.database);
        assert!(finder.find_all(&a, &b).unwrap().is_empty());
    }

    #[rstest]
    fn ancestor_check(mut dag: Dag) {
        let a = dag.commit(&[], "a");
        let b = dag.commit(&[&a], "b");
        let c = dag.commit(&[&b], "c");

        let mut finder = MergeBaseFinder::new(&dag.database);
        assert!(finder.is_ancestor(&a, &c).unwrap());
        assert!(!finder.is_ancestor(&c, &a).unwrap());
    }
}

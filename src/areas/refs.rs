//! Reference store
//!
//! References are human-readable names pointing at commits. A ref file
//! contains either a 40-hex object id (direct) or `ref: <path>` (symbolic).
//! `HEAD` is symbolic while a branch is checked out and direct when
//! detached; before the first commit it points at a branch file that does
//! not exist yet (unborn HEAD).
//!
//! ## Layout
//!
//! - Branches: `refs/heads/*`
//! - Tags: `refs/tags/*`
//! - Remote-tracking branches: `refs/remotes/<remote>/*`
//!
//! Updates go through a `<ref>.lock` file and rename into place, so a
//! concurrent reader observes either the old or the new value, never a
//! partial write. Compare-and-set updates fail `Stale` when the ref moved
//! under the caller.

use crate::areas::database::Database;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use anyhow::Context;
use derive_new::new;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Maximum number of symbolic hops followed during resolution
const MAX_SYMREF_DEPTH: usize = 10;

const SYMREF_PREFIX: &str = "ref: ";

/// Where HEAD currently points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// On a branch; `oid` is `None` while the branch is unborn
    Attached {
        branch: BranchName,
        oid: Option<ObjectId>,
    },
    /// Detached at a commit
    Detached(ObjectId),
}

impl HeadState {
    pub fn oid(&self) -> Option<&ObjectId> {
        match self {
            HeadState::Attached { oid, .. } => oid.as_ref(),
            HeadState::Detached(oid) => Some(oid),
        }
    }

    pub fn branch(&self) -> Option<&BranchName> {
        match self {
            HeadState::Attached { branch, .. } => Some(branch),
            HeadState::Detached(_) => None,
        }
    }
}

/// Content of a single ref file
#[derive(Debug, Clone)]
enum RefValue {
    Symbolic(String),
    Direct(ObjectId),
}

impl RefValue {
    fn read(path: &Path) -> anyhow::Result<Option<RefValue>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        // the stash ref keeps a list; only the first line names the tip
        let content = content.lines().next().unwrap_or("").trim();

        if content.is_empty() {
            return Ok(None);
        }

        if let Some(target) = content.strip_prefix(SYMREF_PREFIX) {
            Ok(Some(RefValue::Symbolic(target.trim().to_string())))
        } else {
            Ok(Some(RefValue::Direct(ObjectId::try_parse(content)?)))
        }
    }
}

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the repository metadata directory (`.lit`)
    path: Box<Path>,
}

impl Refs {
    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.refs_path().join("heads")
    }

    pub fn tags_path(&self) -> PathBuf {
        self.refs_path().join("tags")
    }

    pub fn remotes_path(&self) -> PathBuf {
        self.refs_path().join("remotes")
    }

    // ------------------------------------------------------------------
    // HEAD
    // ------------------------------------------------------------------

    /// Resolve HEAD to a commit id, if any commit is checked out
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        Ok(self.head_state()?.oid().cloned())
    }

    pub fn head_state(&self) -> anyhow::Result<HeadState> {
        match RefValue::read(&self.head_path())? {
            Some(RefValue::Symbolic(target)) => {
                let branch = BranchName::from_ref_path(&target)?;
                let oid = self.read_ref_file(&self.path.join(&target), 1)?;
                Ok(HeadState::Attached { branch, oid })
            }
            Some(RefValue::Direct(oid)) => Ok(HeadState::Detached(oid)),
            None => Err(LitError::Corrupt {
                kind: "ref",
                detail: "HEAD is missing".to_string(),
            }
            .into()),
        }
    }

    pub fn current_branch(&self) -> anyhow::Result<Option<BranchName>> {
        Ok(self.head_state()?.branch().cloned())
    }

    pub fn is_detached(&self) -> anyhow::Result<bool> {
        Ok(matches!(self.head_state()?, HeadState::Detached(_)))
    }

    /// Attach HEAD to a branch (which may be unborn)
    pub fn set_head_to_branch(&self, branch: &BranchName) -> anyhow::Result<()> {
        self.write_ref_file(
            &self.head_path(),
            &format!("{SYMREF_PREFIX}{}\n", branch.to_ref_path()),
        )
    }

    /// Detach HEAD at a commit
    pub fn detach_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        self.write_ref_file(&self.head_path(), &format!("{oid}\n"))
    }

    /// Move HEAD to a commit, writing through a symbolic HEAD to the
    /// underlying branch file (creating it for an unborn branch).
    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        match RefValue::read(&self.head_path())? {
            Some(RefValue::Symbolic(target)) => {
                self.write_ref_file(&self.path.join(&target), &format!("{oid}\n"))
            }
            _ => self.detach_head(oid),
        }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Follow a ref file through symbolic hops to a commit id
    fn read_ref_file(&self, path: &Path, depth: usize) -> anyhow::Result<Option<ObjectId>> {
        if depth > MAX_SYMREF_DEPTH {
            return Err(LitError::TooDeep {
                reference: path.display().to_string(),
            }
            .into());
        }

        match RefValue::read(path)? {
            Some(RefValue::Symbolic(target)) => {
                let target_path = self.path.join(&target);
                if target_path == path {
                    return Err(LitError::Cyclic {
                        reference: target,
                    }
                    .into());
                }
                self.read_ref_file(&target_path, depth + 1)
            }
            Some(RefValue::Direct(oid)) => Ok(Some(oid)),
            None => Ok(None),
        }
    }

    /// Read a ref by name, trying the accepted name forms in priority
    /// order: `HEAD`, full `refs/...` path, branch, tag, remote-tracking
    /// branch.
    pub fn read_ref(&self, name: &str) -> anyhow::Result<Option<ObjectId>> {
        if name == HEAD_REF_NAME {
            return self.read_head();
        }

        let candidates = [
            self.path.join(name),
            self.heads_path().join(name),
            self.tags_path().join(name),
            self.remotes_path().join(name),
        ];

        for candidate in candidates {
            if candidate.is_file() {
                return self.read_ref_file(&candidate, 1);
            }
        }

        Ok(None)
    }

    /// Resolve any revision-ish name to an object id
    ///
    /// Priority: literal 40-hex id, then ref name forms, then an
    /// abbreviated object id prefix.
    pub fn resolve(&self, name: &str, database: &Database) -> anyhow::Result<ObjectId> {
        if name.len() == OBJECT_ID_LENGTH
            && name.chars().all(|c| c.is_ascii_hexdigit())
            && let Ok(oid) = ObjectId::try_parse(name)
            && database.has(&oid)
        {
            return Ok(oid);
        }

        if let Some(oid) = self.read_ref(name)? {
            return Ok(oid);
        }

        if ObjectId::looks_like_prefix(name) {
            return database.resolve_prefix(name);
        }

        Err(LitError::NotFound {
            kind: "revision",
            name: name.to_string(),
        }
        .into())
    }

    /// Resolve a name and peel annotated tags down to the commit
    pub fn resolve_commit(&self, name: &str, database: &Database) -> anyhow::Result<ObjectId> {
        let mut oid = self.resolve(name, database)?;

        loop {
            match database.parse_object(&oid)? {
                ObjectBox::Tag(tag) => oid = tag.target().clone(),
                ObjectBox::Commit(_) => return Ok(oid),
                _ => {
                    return Err(LitError::BadObject {
                        oid: oid.to_string(),
                    }
                    .into());
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    fn write_ref_file(&self, path: &Path, raw_content: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!("failed to locate parent directory for ref file {path:?}")
        })?)?;

        let lock_path = Self::lock_path(path);
        let mut lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .with_context(|| format!("failed to lock ref file {path:?}"))?;

        let result = lock_file
            .write_all(raw_content.as_bytes())
            .map_err(anyhow::Error::from)
            .and_then(|_| std::fs::rename(&lock_path, path).map_err(anyhow::Error::from));

        if result.is_err() {
            let _ = std::fs::remove_file(&lock_path);
        }

        result
    }

    fn lock_path(path: &Path) -> PathBuf {
        let mut lock = path.as_os_str().to_owned();
        lock.push(".lock");
        PathBuf::from(lock)
    }

    /// Update a ref under `refs/...`, optionally compare-and-set
    ///
    /// With `expected` provided, the update fails `Stale` unless the ref
    /// currently holds that value (`None` = must not exist).
    pub fn update_ref(
        &self,
        ref_path: &str,
        new_oid: &ObjectId,
        expected: Option<Option<&ObjectId>>,
    ) -> anyhow::Result<()> {
        let path = self.path.join(ref_path);

        if let Some(expected) = expected {
            let actual = if path.exists() {
                self.read_ref_file(&path, 1)?
            } else {
                None
            };

            if actual.as_ref() != expected {
                return Err(LitError::Stale {
                    reference: ref_path.to_string(),
                    expected: expected.map(|o| o.to_string()).unwrap_or_else(|| "<none>".into()),
                    actual: actual.map(|o| o.to_string()).unwrap_or_else(|| "<none>".into()),
                }
                .into());
            }
        }

        self.write_ref_file(&path, &format!("{new_oid}\n"))
    }

    pub fn delete_ref(&self, ref_path: &str) -> anyhow::Result<()> {
        let path = self.path.join(ref_path);
        if !path.exists() {
            return Err(LitError::NotFound {
                kind: "ref",
                name: ref_path.to_string(),
            }
            .into());
        }

        std::fs::remove_file(&path)
            .with_context(|| format!("failed to delete ref file {path:?}"))?;
        self.prune_empty_parent_dirs(&path)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Branches
    // ------------------------------------------------------------------

    pub fn create_branch(&self, name: &BranchName, oid: &ObjectId) -> anyhow::Result<()> {
        let branch_path = self.heads_path().join(name.as_ref());

        if branch_path.exists() {
            return Err(LitError::AlreadyExists {
                kind: "branch",
                name: name.to_string(),
            }
            .into());
        }

        self.write_ref_file(&branch_path, &format!("{oid}\n"))
    }

    pub fn delete_branch(&self, name: &BranchName) -> anyhow::Result<ObjectId> {
        if self.current_branch()?.as_ref() == Some(name) {
            return Err(LitError::CurrentBranch {
                name: name.to_string(),
            }
            .into());
        }

        let branch_path = self.heads_path().join(name.as_ref());
        let oid = self
            .read_ref_file(&branch_path, 1)?
            .ok_or_else(|| LitError::NotFound {
                kind: "branch",
                name: name.to_string(),
            })?;

        std::fs::remove_file(&branch_path)
            .with_context(|| format!("failed to delete branch file {branch_path:?}"))?;
        self.prune_empty_parent_dirs(&branch_path)?;

        Ok(oid)
    }

    pub fn branch_exists(&self, name: &BranchName) -> bool {
        self.heads_path().join(name.as_ref()).is_file()
    }

    pub fn list_branches(&self) -> anyhow::Result<Vec<(String, ObjectId)>> {
        self.list_refs_under(&self.heads_path())
    }

    pub fn list_tags(&self) -> anyhow::Result<Vec<(String, ObjectId)>> {
        self.list_refs_under(&self.tags_path())
    }

    pub fn list_remote_refs(&self, remote: &str) -> anyhow::Result<Vec<(String, ObjectId)>> {
        self.list_refs_under(&self.remotes_path().join(remote))
    }

    /// All refs as `(full ref path, oid)` pairs
    pub fn list_all_refs(&self) -> anyhow::Result<Vec<(String, ObjectId)>> {
        let mut refs = Vec::new();

        for entry in WalkDir::new(self.refs_path())
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.path().is_file() || entry.path().extension().is_some_and(|e| e == "lock") {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(self.path.as_ref())
                .map(|p| p.to_string_lossy().to_string());
            if let Ok(name) = relative
                && let Some(oid) = self.read_ref_file(entry.path(), 1)?
            {
                refs.push((name, oid));
            }
        }

        refs.sort();
        Ok(refs)
    }

    fn list_refs_under(&self, base: &Path) -> anyhow::Result<Vec<(String, ObjectId)>> {
        let mut refs = Vec::new();
        if !base.exists() {
            return Ok(refs);
        }

        for entry in WalkDir::new(base).into_iter().filter_map(|entry| entry.ok()) {
            if !entry.path().is_file() || entry.path().extension().is_some_and(|e| e == "lock") {
                continue;
            }
            let name = entry
                .path()
                .strip_prefix(base)
                .map(|p| p.to_string_lossy().to_string());
            if let Ok(name) = name
                && let Some(oid) = self.read_ref_file(entry.path(), 1)?
            {
                refs.push((name, oid));
            }
        }

        refs.sort();
        Ok(refs)
    }

    /// Reverse map `oid -> ref names`, for log decoration
    pub fn reverse_refs(&self) -> anyhow::Result<HashMap<ObjectId, Vec<String>>> {
        let mut reverse: HashMap<ObjectId, Vec<String>> = HashMap::new();

        for (name, oid) in self.list_all_refs()? {
            reverse.entry(oid).or_default().push(name);
        }
        if let Ok(Some(oid)) = self.read_head() {
            reverse.entry(oid).or_default().push(HEAD_REF_NAME.to_string());
        }

        Ok(reverse)
    }

    /// Tips used to seed "have" sets during fetch
    pub fn all_tips(&self) -> anyhow::Result<HashSet<ObjectId>> {
        let mut tips: HashSet<ObjectId> =
            self.list_all_refs()?.into_iter().map(|(_, oid)| oid).collect();
        if let Some(head) = self.read_head()? {
            tips.insert(head);
        }

        Ok(tips)
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let stop = self.refs_path();
        let mut parent = path.parent();

        while let Some(dir) = parent {
            if dir == stop.as_path() || dir == self.path.as_ref() {
                break;
            }
            if dir.read_dir()?.next().is_some() {
                break;
            }
            std::fs::remove_dir(dir)
                .with_context(|| format!("failed to remove empty ref directory {dir:?}"))?;
            parent = dir.parent();
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Operation state files
    // ------------------------------------------------------------------

    fn state_file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Record the pre-operation tip so a history-rewriting operation can
    /// be undone. Written before the operation touches any ref.
    pub fn write_orig_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        self.write_ref_file(&self.state_file("ORIG_HEAD"), &format!("{oid}\n"))
    }

    pub fn read_orig_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_ref_file(&self.state_file("ORIG_HEAD"), 1)
    }

    pub fn write_merge_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        self.write_ref_file(&self.state_file("MERGE_HEAD"), &format!("{oid}\n"))
    }

    pub fn read_merge_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_ref_file(&self.state_file("MERGE_HEAD"), 1)
    }

    pub fn write_merge_msg(&self, message: &str) -> anyhow::Result<()> {
        Ok(std::fs::write(self.state_file("MERGE_MSG"), message)?)
    }

    pub fn read_merge_msg(&self) -> anyhow::Result<Option<String>> {
        let path = self.state_file("MERGE_MSG");
        if path.exists() {
            Ok(Some(std::fs::read_to_string(path)?))
        } else {
            Ok(None)
        }
    }

    pub fn clear_merge_state(&self) -> anyhow::Result<()> {
        for name in ["MERGE_HEAD", "MERGE_MSG"] {
            let path = self.state_file(name);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    pub fn write_cherry_pick_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        self.write_ref_file(&self.state_file("CHERRY_PICK_HEAD"), &format!("{oid}\n"))
    }

    pub fn read_cherry_pick_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_ref_file(&self.state_file("CHERRY_PICK_HEAD"), 1)
    }

    pub fn clear_cherry_pick_state(&self) -> anyhow::Result<()> {
        for name in ["CHERRY_PICK_HEAD", "MERGE_MSG"] {
            let path = self.state_file(name);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stash list
    // ------------------------------------------------------------------

    /// The stash ref holds a newline-separated oid list, newest first
    pub fn read_stash_list(&self) -> anyhow::Result<Vec<ObjectId>> {
        let path = self.refs_path().join("stash");
        if !path.exists() {
            return Ok(Vec::new());
        }

        std::fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| ObjectId::try_parse(line.trim()))
            .collect()
    }

    pub fn write_stash_list(&self, entries: &[ObjectId]) -> anyhow::Result<()> {
        let path = self.refs_path().join("stash");

        if entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            return Ok(());
        }

        let content = entries
            .iter()
            .map(|oid| format!("{oid}\n"))
            .collect::<String>();
        self.write_ref_file(&path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    fn oid(fill: char) -> ObjectId {
        ObjectId::try_parse(fill.to_string().repeat(40)).unwrap()
    }

    #[fixture]
    fn refs() -> (TempDir, Refs) {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        let refs = Refs::new(dir.path().to_path_buf().into());
        refs.set_head_to_branch(&BranchName::try_parse("main").unwrap())
            .unwrap();
        (dir, refs)
    }

    #[rstest]
    fn unborn_head_resolves_to_none(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        assert_eq!(refs.read_head().unwrap(), None);

        let state = refs.head_state().unwrap();
        assert_eq!(
            state,
            HeadState::Attached {
                branch: BranchName::try_parse("main").unwrap(),
                oid: None,
            }
        );
    }

    #[rstest]
    fn update_head_writes_through_to_branch(refs: (TempDir, Refs)) {
        let (dir, refs) = refs;
        refs.update_head(&oid('a')).unwrap();

        assert_eq!(refs.read_head().unwrap(), Some(oid('a')));
        let branch_content =
            std::fs::read_to_string(dir.path().join("refs/heads/main")).unwrap();
        assert_eq!(branch_content.trim(), oid('a').as_ref());
    }

    #[rstest]
    fn detached_head_round_trip(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        refs.detach_head(&oid('b')).unwrap();

        assert!(refs.is_detached().unwrap());
        assert_eq!(refs.read_head().unwrap(), Some(oid('b')));
    }

    #[rstest]
    fn create_branch_twice_fails(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        let name = BranchName::try_parse("feature").unwrap();
        refs.create_branch(&name, &oid('a')).unwrap();

        let err = refs.create_branch(&name, &oid('b')).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LitError>(),
            Some(LitError::AlreadyExists { .. })
        ));
    }

    #[rstest]
    fn delete_current_branch_is_rejected(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        refs.update_head(&oid('a')).unwrap();

        let main = BranchName::try_parse("main").unwrap();
        assert!(refs.delete_branch(&main).is_err());
    }

    #[rstest]
    fn compare_and_set_detects_stale(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        refs.update_ref("refs/heads/topic", &oid('a'), Some(None)).unwrap();

        // expected value matches: allowed
        refs.update_ref("refs/heads/topic", &oid('b'), Some(Some(&oid('a'))))
            .unwrap();

        // expected value no longer matches: Stale
        let err = refs
            .update_ref("refs/heads/topic", &oid('c'), Some(Some(&oid('a'))))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LitError>(),
            Some(LitError::Stale { .. })
        ));
    }

    #[rstest]
    fn cyclic_symref_is_detected(refs: (TempDir, Refs)) {
        let (dir, refs) = refs;
        std::fs::write(
            dir.path().join("refs/heads/loop-a"),
            "ref: refs/heads/loop-b\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("refs/heads/loop-b"),
            "ref: refs/heads/loop-a\n",
        )
        .unwrap();

        let err = refs.read_ref("loop-a").unwrap_err();
        let kind = err.downcast_ref::<LitError>();
        assert!(matches!(
            kind,
            Some(LitError::TooDeep { .. }) | Some(LitError::Cyclic { .. })
        ));
    }

    #[rstest]
    fn stash_list_round_trip(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        assert!(refs.read_stash_list().unwrap().is_empty());

        refs.write_stash_list(&[oid('a'), oid('b')]).unwrap();
        assert_eq!(refs.read_stash_list().unwrap(), vec![oid('a'), oid('b')]);

        refs.write_stash_list(&[]).unwrap();
        assert!(refs.read_stash_list().unwrap().is_empty());
    }
}

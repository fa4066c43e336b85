//! Repository handle
//!
//! Coordinates the persistent stores (database, index, refs, workspace,
//! config) behind a single handle that operations receive explicitly.
//!
//! ## Layout
//!
//! A working repository keeps its metadata in `.lit/` (name overridable via
//! `LIT_DIR`); a bare repository stores the same layout at its top level
//! and carries `core.bare = true`.
//!
//! ## Locking
//!
//! Mutating operations take the advisory repository lock (`lock` file,
//! exclusive flock) for their duration. Readers take no lock and rely on
//! refs being updated by rename.

use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::commit::{Author, parse_timestamp};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use anyhow::Context;
use file_guard::{FileGuard, Lock};
use std::cell::{RefCell, RefMut};
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default metadata directory name
pub const DEFAULT_REPO_DIR: &str = ".lit";

/// Environment override for the metadata directory name
pub const REPO_DIR_ENV: &str = "LIT_DIR";

const DATABASE_DIR: &str = "objects";
const INDEX_FILE: &str = "index";
const CONFIG_FILE: &str = "config";
const LOCK_FILE: &str = "lock";

/// Branch a fresh repository's HEAD points at
pub const DEFAULT_BRANCH: &str = "main";

/// Holds the advisory repository lock for the duration of a mutating
/// operation. Dropping the guard releases the lock.
pub struct RepoLock {
    _guard: FileGuard<Box<File>>,
}

pub fn repo_dir_name() -> OsString {
    std::env::var_os(REPO_DIR_ENV).unwrap_or_else(|| OsString::from(DEFAULT_REPO_DIR))
}

pub struct Repository {
    /// Working-tree root (equals `lit_dir` for bare repositories)
    root: Box<Path>,
    /// Metadata directory
    lit_dir: Box<Path>,
    bare: bool,
    database: Database,
    workspace: Workspace,
    refs: Refs,
    index: RefCell<Index>,
    config: RefCell<Config>,
    writer: RefCell<Box<dyn std::io::Write>>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("lit_dir", &self.lit_dir)
            .field("bare", &self.bare)
            .field("database", &self.database)
            .field("workspace", &self.workspace)
            .field("refs", &self.refs)
            .field("index", &self.index)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Repository {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    fn from_dirs(
        root: PathBuf,
        lit_dir: PathBuf,
        bare: bool,
        writer: Box<dyn std::io::Write>,
    ) -> anyhow::Result<Self> {
        let config = Config::load(lit_dir.join(CONFIG_FILE).into())?;
        let mut index = Index::new(lit_dir.join(INDEX_FILE).into());
        index.rehydrate()?;

        Ok(Repository {
            database: Database::new(lit_dir.join(DATABASE_DIR).into()),
            workspace: Workspace::new(root.clone().into(), repo_dir_name()),
            refs: Refs::new(lit_dir.clone().into()),
            index: RefCell::new(index),
            config: RefCell::new(config),
            writer: RefCell::new(writer),
            root: root.into(),
            lit_dir: lit_dir.into(),
            bare,
        })
    }

    /// Initialize a new repository at `path`
    pub fn init(
        path: &Path,
        bare: bool,
        writer: Box<dyn std::io::Write>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)?;
        let root = path.canonicalize()?;
        let lit_dir = if bare {
            root.clone()
        } else {
            root.join(repo_dir_name())
        };

        if lit_dir.join("HEAD").exists() {
            return Err(LitError::AlreadyExists {
                kind: "repository",
                name: lit_dir.display().to_string(),
            }
            .into());
        }

        std::fs::create_dir_all(lit_dir.join(DATABASE_DIR))?;
        std::fs::create_dir_all(lit_dir.join("refs/heads"))?;
        std::fs::create_dir_all(lit_dir.join("refs/tags"))?;
        std::fs::create_dir_all(lit_dir.join("refs/remotes"))?;
        std::fs::create_dir_all(lit_dir.join("info"))?;
        if !lit_dir.join("info/exclude").exists() {
            std::fs::write(lit_dir.join("info/exclude"), "")?;
        }

        // unborn HEAD: points at a branch that does not exist yet
        std::fs::write(
            lit_dir.join("HEAD"),
            format!("ref: refs/heads/{DEFAULT_BRANCH}\n"),
        )?;

        let mut config = Config::load(lit_dir.join(CONFIG_FILE).into())?;
        config.set("core.repositoryformatversion", "0")?;
        config.set("core.bare", if bare { "true" } else { "false" })?;
        config.save()?;

        Self::from_dirs(root, lit_dir, bare, writer)
    }

    /// Open the repository containing `path`, searching upward
    pub fn open(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let start = path
            .canonicalize()
            .map_err(|_| LitError::NotARepository)?;
        let repo_dir = repo_dir_name();

        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            let candidate = dir.join(&repo_dir);
            if candidate.is_dir() && candidate.join("HEAD").exists() {
                return Self::from_dirs(dir.to_path_buf(), candidate, false, writer);
            }
            current = dir.parent();
        }

        Err(LitError::NotARepository.into())
    }

    /// Open a repository at exactly `path`, accepting both working and
    /// bare layouts. Used by the local-file transport.
    pub fn open_at(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let root = path.canonicalize().map_err(|_| LitError::NotARepository)?;

        let worktree_layout = root.join(repo_dir_name());
        if worktree_layout.is_dir() && worktree_layout.join("HEAD").exists() {
            return Self::from_dirs(root.clone(), worktree_layout, false, writer);
        }

        if root.join("HEAD").exists() && root.join(DATABASE_DIR).is_dir() {
            return Self::from_dirs(root.clone(), root, true, writer);
        }

        Err(LitError::NotARepository.into())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lit_dir(&self) -> &Path {
        &self.lit_dir
    }

    pub fn is_bare(&self) -> bool {
        self.bare
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn index(&self) -> RefMut<'_, Index> {
        self.index.borrow_mut()
    }

    pub fn config(&self) -> RefMut<'_, Config> {
        self.config.borrow_mut()
    }

    pub fn writer(&self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    /// Path of the rebase state directory
    pub fn rebase_state_dir(&self) -> PathBuf {
        self.lit_dir.join("REBASE_STATE")
    }

    // ------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------

    /// Acquire the advisory single-writer lock
    pub fn lock(&self) -> anyhow::Result<RepoLock> {
        let lock_path = self.lit_dir.join(LOCK_FILE);
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("unable to open lock file {}", lock_path.display()))?;

        let guard = file_guard::lock(Box::new(file), Lock::Exclusive, 0, 1)
            .context("unable to acquire repository lock")?;

        Ok(RepoLock { _guard: guard })
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Resolve the author identity from environment overrides, falling
    /// back to `user.name` / `user.email` in the config
    pub fn author(&self) -> anyhow::Result<Author> {
        self.identity("LIT_AUTHOR_NAME", "LIT_AUTHOR_EMAIL", "LIT_AUTHOR_DATE")
    }

    pub fn committer(&self) -> anyhow::Result<Author> {
        self.identity(
            "LIT_COMMITTER_NAME",
            "LIT_COMMITTER_EMAIL",
            "LIT_COMMITTER_DATE",
        )
    }

    fn identity(&self, name_var: &str, email_var: &str, date_var: &str) -> anyhow::Result<Author> {
        let config = self.config.borrow();
        let name = std::env::var(name_var)
            .ok()
            .or_else(|| config.get("user.name"))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "author identity unknown: set {name_var} or configure user.name"
                )
            })?;
        let email = std::env::var(email_var)
            .ok()
            .or_else(|| config.get("user.email"))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "author identity unknown: set {email_var} or configure user.email"
                )
            })?;

        // "<unix-ts> <+hhmm>" pins the identity to a reproducible instant
        if let Ok(date) = std::env::var(date_var)
            && let Some((seconds, tz)) = date.trim().split_once(' ')
            && let Ok(seconds) = seconds.parse::<i64>()
            && let Ok(timestamp) = parse_timestamp(seconds, tz)
        {
            return Ok(Author::new_with_timestamp(name, email, timestamp));
        }

        Ok(Author::new(name, email))
    }

    // ------------------------------------------------------------------
    // Common lookups
    // ------------------------------------------------------------------

    /// Resolve a revision expression (`main`, `HEAD^`, `abc123~2`, ...)
    /// to a commit id
    pub fn rev_parse(&self, revision: &str) -> anyhow::Result<ObjectId> {
        crate::artifacts::branch::revision::Revision::try_parse(revision)?.resolve(self)
    }

    /// Tree of the commit HEAD points at, if born
    pub fn head_tree_oid(&self) -> anyhow::Result<Option<ObjectId>> {
        match self.refs.read_head()? {
            Some(head_oid) => {
                let commit = self.database.load_commit(&head_oid)?;
                Ok(Some(commit.tree_oid().clone()))
            }
            None => Ok(None),
        }
    }

    /// The branch HEAD is attached to, failing when detached
    pub fn require_current_branch(&self) -> anyhow::Result<BranchName> {
        self.refs
            .current_branch()?
            .ok_or_else(|| LitError::DetachedHead.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    fn sink() -> Box<dyn std::io::Write> {
        Box::new(std::io::sink())
    }

    #[test]
    fn init_creates_expected_layout() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), false, sink()).unwrap();

        assert!(repo.lit_dir().join("objects").is_dir());
        assert!(repo.lit_dir().join("refs/heads").is_dir());
        assert!(repo.lit_dir().join("refs/tags").is_dir());
        assert!(repo.lit_dir().join("info/exclude").exists());

        let head = std::fs::read_to_string(repo.lit_dir().join("HEAD")).unwrap();
        assert_eq!(head, "ref: refs/heads/main\n");
        assert!(!repo.is_bare());
    }

    #[test]
    fn init_twice_fails() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path(), false, sink()).unwrap();
        assert!(Repository::init(dir.path(), false, sink()).is_err());
    }

    #[test]
    fn bare_layout_is_at_top_level() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), true, sink()).unwrap();

        assert!(repo.is_bare());
        assert_eq!(repo.lit_dir(), repo.root());
        assert!(dir.path().join("HEAD").exists());
        assert!(dir.path().join("objects").is_dir());
    }

    #[test]
    fn open_searches_upward() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path(), false, sink()).unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let repo = Repository::open(&nested, sink()).unwrap();
        assert_eq!(repo.root(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn open_outside_any_repository_fails() {
        let dir = TempDir::new().unwrap();
        let err = Repository::open(dir.path(), sink()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::errors::LitError>(),
            Some(crate::errors::LitError::NotARepository)
        ));
    }

    #[test]
    fn open_at_accepts_bare_layout() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path(), true, sink()).unwrap();

        let repo = Repository::open_at(dir.path(), sink()).unwrap();
        assert!(repo.is_bare());
    }
}

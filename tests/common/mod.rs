#![allow(dead_code)]

use assert_fs::TempDir;
use lit::Repository;
use lit::artifacts::objects::object::ObjectBox;
use lit::artifacts::objects::object_id::ObjectId;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Writer handing command output back to the test
#[derive(Clone, Default)]
pub struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl SharedWriter {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A repository in a temp dir with a configured identity
pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
    pub out: SharedWriter,
}

impl TestRepo {
    pub fn init() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let out = SharedWriter::default();
        let repo = Repository::init(dir.path(), false, Box::new(out.clone()))
            .expect("failed to init repository");
        configure_identity(&repo);

        TestRepo { dir, repo, out }
    }

    pub fn open(dir: TempDir) -> Self {
        let out = SharedWriter::default();
        let repo = Repository::open(dir.path(), Box::new(out.clone()))
            .expect("failed to open repository");

        TestRepo { dir, repo, out }
    }

    pub fn write(&self, path: &str, content: &str) {
        let absolute = self.dir.path().join(path);
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(absolute, content).expect("failed to write file");
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(path)).expect("failed to read file")
    }

    pub fn exists(&self, path: &str) -> bool {
        self.dir.path().join(path).exists()
    }

    pub fn add_all(&self) {
        self.repo.add(&[".".to_string()]).expect("add failed");
    }

    pub fn commit_all(&self, message: &str) -> ObjectId {
        self.add_all();
        self.repo.commit(message).expect("commit failed")
    }

    pub fn head(&self) -> ObjectId {
        self.repo
            .refs()
            .read_head()
            .expect("failed to read HEAD")
            .expect("HEAD is unborn")
    }

    pub fn branch_tip(&self, name: &str) -> ObjectId {
        self.repo
            .refs()
            .read_ref(name)
            .expect("failed to read ref")
            .expect("branch has no tip")
    }

    pub fn output(&self) -> String {
        self.out.contents()
    }

    /// Drop output accumulated by setup commands
    pub fn clear_output(&self) {
        self.out.clear();
    }
}

pub fn configure_identity(repo: &Repository) {
    let mut config = repo.config();
    config.set("user.name", "Test Author").unwrap();
    config.set("user.email", "test@example.com").unwrap();
    config.save().unwrap();
}

/// Closure invariant: every object referenced by a stored object is
/// itself stored
pub fn assert_object_closure(repo: &Repository) {
    let database = repo.database();
    for oid in database.iter_oids().expect("failed to enumerate objects") {
        let referenced: Vec<ObjectId> = match database.parse_object(&oid).expect("parse failed") {
            ObjectBox::Blob(_) => Vec::new(),
            ObjectBox::Tree(tree) => tree.into_entries().map(|(_, entry)| entry.oid).collect(),
            ObjectBox::Commit(commit) => {
                let mut refs = vec![commit.tree_oid().clone()];
                refs.extend(commit.parents().iter().cloned());
                refs
            }
            ObjectBox::Tag(tag) => vec![tag.target().clone()],
        };

        for referenced_oid in referenced {
            assert!(
                database.has(&referenced_oid),
                "object {oid} references missing object {referenced_oid}"
            );
        }
    }
}

/// Flattened `path -> blob content` view of a commit's tree
pub fn tree_contents(repo: &Repository, commit_oid: &ObjectId) -> Vec<(String, Vec<u8>)> {
    let commit = repo.database().load_commit(commit_oid).expect("not a commit");
    let files = repo
        .database()
        .flatten_tree(commit.tree_oid())
        .expect("failed to flatten tree");

    files
        .into_iter()
        .map(|(path, entry)| {
            let blob = repo.database().load_blob(&entry.oid).expect("missing blob");
            (
                path.to_string_lossy().to_string(),
                blob.content().to_vec(),
            )
        })
        .collect()
}

pub fn conflict_stage_oids(
    repo: &Repository,
    path: &str,
) -> (Option<ObjectId>, Option<ObjectId>, Option<ObjectId>) {
    let index = repo.index();
    let (base, ours, theirs) = index.conflict_entries(Path::new(path));
    (
        base.map(|e| e.oid.clone()),
        ours.map(|e| e.oid.clone()),
        theirs.map(|e| e.oid.clone()),
    )
}

mod common;

use assert_fs::TempDir;
use common::{SharedWriter, TestRepo, assert_object_closure, configure_identity};
use lit::Repository;
use lit::errors::LitError;
use pretty_assertions::assert_eq;

fn clone_to(url: &str, dir: &TempDir, bare: bool) -> Repository {
    let out = SharedWriter::default();
    let repo = Repository::clone_repository(
        &format!("file://{url}"),
        dir.path(),
        bare,
        Box::new(out.clone()),
    )
    .expect("clone failed");
    configure_identity(&repo);
    repo
}

#[test]
fn clone_copies_objects_refs_and_working_tree() {
    let source = TestRepo::init();
    source.write("README.md", "hello\n");
    source.write("src/lib.rs", "pub fn f() {}\n");
    let tip = source.commit_all("initial");

    let clone_dir = TempDir::new().unwrap();
    let cloned = clone_to(&source.dir.path().display().to_string(), &clone_dir, false);

    // same tip, same objects, checked-out working tree
    assert_eq!(cloned.refs().read_head().unwrap(), Some(tip.clone()));
    assert_eq!(
        cloned.refs().read_ref("refs/remotes/origin/main").unwrap(),
        Some(tip)
    );
    assert_eq!(
        std::fs::read_to_string(clone_dir.path().join("README.md")).unwrap(),
        "hello\n"
    );
    assert_object_closure(&cloned);
}

#[test]
fn bare_clone_has_no_working_tree() {
    let source = TestRepo::init();
    source.write("README.md", "hello\n");
    let tip = source.commit_all("initial");

    let clone_dir = TempDir::new().unwrap();
    let cloned = clone_to(&source.dir.path().display().to_string(), &clone_dir, true);

    assert!(cloned.is_bare());
    assert_eq!(cloned.refs().read_ref("main").unwrap(), Some(tip));
    // layout at the top level, no checkout
    assert!(clone_dir.path().join("objects").is_dir());
    assert!(!clone_dir.path().join("README.md").exists());
}

#[test]
fn clone_push_fetch_round_trip() {
    // X: origin repository with one commit
    let x = TestRepo::init();
    x.write("file.txt", "from x\n");
    x.commit_all("initial");

    // Y: bare clone of X; Z: working clone of Y
    let y_dir = TempDir::new().unwrap();
    clone_to(&x.dir.path().display().to_string(), &y_dir, true);

    let z_dir = TempDir::new().unwrap();
    let z = clone_to(&y_dir.path().display().to_string(), &z_dir, false);

    // commit on Z and push to Y
    std::fs::write(z_dir.path().join("file.txt"), "from z\n").unwrap();
    z.add(&[".".to_string()]).unwrap();
    let new_tip = z.commit("z change").unwrap();
    z.push("origin", Some("main"), false).unwrap();

    // Y saw the push
    let y = Repository::open_at(y_dir.path(), Box::new(std::io::sink())).unwrap();
    assert_eq!(y.refs().read_ref("main").unwrap(), Some(new_tip.clone()));

    // X fetches from Y and agrees on the tip
    x.repo
        .remote_add("origin", &y_dir.path().display().to_string())
        .unwrap();
    x.repo.fetch("origin", Some("main")).unwrap();
    assert_eq!(
        x.repo.refs().read_ref("refs/remotes/origin/main").unwrap(),
        Some(new_tip.clone())
    );
    assert!(x.repo.database().has(&new_tip));
    assert_object_closure(&x.repo);
}

#[test]
fn non_fast_forward_push_is_rejected() {
    let source = TestRepo::init();
    source.write("file.txt", "v1\n");
    source.commit_all("initial");

    let bare_dir = TempDir::new().unwrap();
    clone_to(&source.dir.path().display().to_string(), &bare_dir, true);

    let a_dir = TempDir::new().unwrap();
    let a = clone_to(&bare_dir.path().display().to_string(), &a_dir, false);
    let b_dir = TempDir::new().unwrap();
    let b = clone_to(&bare_dir.path().display().to_string(), &b_dir, false);

    // A pushes first
    std::fs::write(a_dir.path().join("file.txt"), "from a\n").unwrap();
    a.add(&[".".to_string()]).unwrap();
    a.commit("a change").unwrap();
    a.push("origin", Some("main"), false).unwrap();

    // B's divergent push must be rejected
    std::fs::write(b_dir.path().join("file.txt"), "from b\n").unwrap();
    b.add(&[".".to_string()]).unwrap();
    let b_tip = b.commit("b change").unwrap();
    let err = b.push("origin", Some("main"), false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LitError>(),
        Some(LitError::NonFastForward { .. })
    ));

    // forced push wins
    b.push("origin", Some("main"), true).unwrap();
    let bare = Repository::open_at(bare_dir.path(), Box::new(std::io::sink())).unwrap();
    assert_eq!(bare.refs().read_ref("main").unwrap(), Some(b_tip));
}

#[test]
fn fetch_is_atomic_per_ref() {
    let source = TestRepo::init();
    source.write("file.txt", "v1\n");
    source.commit_all("initial");

    let clone_dir = TempDir::new().unwrap();
    let cloned = clone_to(&source.dir.path().display().to_string(), &clone_dir, false);

    // two more commits upstream
    source.write("file.txt", "v2\n");
    source.commit_all("second");
    source.write("file.txt", "v3\n");
    let tip = source.commit_all("third");

    cloned.fetch("origin", Some("main")).unwrap();

    // the tracking ref moved and every reachable object is present
    assert_eq!(
        cloned.refs().read_ref("refs/remotes/origin/main").unwrap(),
        Some(tip)
    );
    assert_object_closure(&cloned);
}

#[test]
fn pull_fetches_and_merges() {
    let source = TestRepo::init();
    source.write("file.txt", "v1\n");
    source.commit_all("initial");

    let clone_dir = TempDir::new().unwrap();
    let cloned = clone_to(&source.dir.path().display().to_string(), &clone_dir, false);

    source.write("file.txt", "v2\n");
    let tip = source.commit_all("upstream change");

    cloned.pull(None, None).unwrap();
    assert_eq!(cloned.refs().read_head().unwrap(), Some(tip));
    assert_eq!(
        std::fs::read_to_string(clone_dir.path().join("file.txt")).unwrap(),
        "v2\n"
    );
}

#[test]
fn unsupported_transports_are_rejected() {
    let t = TestRepo::init();
    t.write("a.txt", "a\n");
    t.commit_all("initial");

    t.repo
        .remote_add("weird", "https://example.com/repo.git")
        .unwrap();
    let err = t.repo.fetch("weird", None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LitError>(),
        Some(LitError::UnsupportedTransport { .. })
    ));
}

#[test]
fn pushed_tag_overwrite_requires_force() {
    let source = TestRepo::init();
    source.write("a.txt", "a\n");
    source.commit_all("first");

    let bare_dir = TempDir::new().unwrap();
    clone_to(&source.dir.path().display().to_string(), &bare_dir, true);
    source
        .repo
        .remote_add("origin", &bare_dir.path().display().to_string())
        .unwrap();

    source.repo.create_tag("v1", None, None, false).unwrap();
    source.repo.push("origin", Some("v1"), false).unwrap();

    // retarget the tag locally, then try to push it again
    source.write("a.txt", "b\n");
    source.commit_all("second");
    source.repo.create_tag("v1", None, None, true).unwrap();

    let err = source.repo.push("origin", Some("v1"), false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LitError>(),
        Some(LitError::NonFastForward { .. })
    ));

    source.repo.push("origin", Some("v1"), true).unwrap();
}

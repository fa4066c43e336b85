mod common;

use common::{TestRepo, assert_object_closure};
use lit::commands::rebase::RebaseOutcome;
use lit::errors::LitError;
use pretty_assertions::assert_eq;

#[test]
fn rebase_replays_commits_on_the_new_base() {
    let t = TestRepo::init();
    t.write("base.txt", "base\n");
    let a = t.commit_all("A");

    t.repo.create_branch("f", None).unwrap();

    // main advances with its own files
    t.write("main1.txt", "m1\n");
    t.commit_all("B");
    t.write("main2.txt", "m2\n");
    let c = t.commit_all("C");

    // feature diverges with disjoint files
    t.repo.checkout("f", false).unwrap();
    t.write("feat1.txt", "f1\n");
    t.commit_all("D");
    t.write("feat2.txt", "f2\n");
    t.commit_all("E");

    let outcome = t.repo.rebase("main").unwrap();
    let new_tip = match outcome {
        RebaseOutcome::Finished(tip) => tip,
        other => panic!("expected finished rebase, got {other:?}"),
    };

    // linear history: E' -> D' -> C -> B -> A
    let e2 = t.repo.database().load_commit(&new_tip).unwrap();
    assert_eq!(e2.message(), "E");
    let d2 = t.repo.database().load_commit(&e2.parents()[0]).unwrap();
    assert_eq!(d2.message(), "D");
    assert_eq!(d2.parents(), &[c.clone()]);

    // all files of both lines are present
    for file in ["base.txt", "main1.txt", "main2.txt", "feat1.txt", "feat2.txt"] {
        assert!(t.exists(file), "missing {file}");
    }

    // the original root is still an ancestor
    let c_commit = t.repo.database().load_commit(&c).unwrap();
    let b_commit = t
        .repo
        .database()
        .load_commit(&c_commit.parents()[0])
        .unwrap();
    assert_eq!(b_commit.parents(), &[a]);

    assert_object_closure(&t.repo);
}

#[test]
fn rebase_preserves_the_picked_trees() {
    let t = TestRepo::init();
    t.write("base.txt", "base\n");
    t.commit_all("A");

    t.repo.create_branch("f", None).unwrap();
    t.write("main.txt", "m\n");
    t.commit_all("B");

    t.repo.checkout("f", false).unwrap();
    t.write("feat.txt", "f\n");
    let d = t.commit_all("D");

    let outcome = t.repo.rebase("main").unwrap();
    let new_tip = match outcome {
        RebaseOutcome::Finished(tip) => tip,
        other => panic!("unexpected {other:?}"),
    };

    // D' carries D's changes over the new base
    let d_files = t
        .repo
        .database()
        .flatten_tree(t.repo.database().load_commit(&d).unwrap().tree_oid())
        .unwrap();
    let d2_files = t
        .repo
        .database()
        .flatten_tree(t.repo.database().load_commit(&new_tip).unwrap().tree_oid())
        .unwrap();

    let feat = std::path::Path::new("feat.txt");
    assert_eq!(d_files[feat].oid, d2_files[feat].oid);
}

#[test]
fn conflicting_rebase_stops_and_continues() {
    let t = TestRepo::init();
    t.write("shared.txt", "original\n");
    t.commit_all("A");

    t.repo.create_branch("f", None).unwrap();

    // B and C on main touch the shared line
    t.write("shared.txt", "main version\n");
    t.commit_all("B");
    t.write("extra.txt", "extra\n");
    let c = t.commit_all("C");

    // D and E on the feature branch touch the same line
    t.repo.checkout("f", false).unwrap();
    t.write("shared.txt", "feature version\n");
    t.commit_all("D");
    t.write("late.txt", "late\n");
    t.commit_all("E");

    let outcome = t.repo.rebase("main").unwrap();
    let stopped_at = match outcome {
        RebaseOutcome::Stopped { commit, paths } => {
            assert_eq!(paths, vec![std::path::PathBuf::from("shared.txt")]);
            commit
        }
        other => panic!("expected a stop, got {other:?}"),
    };

    // stopped at D, with conflict markers in the tree
    let stopped_commit = t.repo.database().load_commit(&stopped_at).unwrap();
    assert_eq!(stopped_commit.message(), "D");
    assert!(t.read("shared.txt").contains("<<<<<<<"));
    assert!(t.repo.rebase_state_dir().exists());

    // a second rebase is refused while this one is unfinished
    let err = t.repo.rebase("main").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LitError>(),
        Some(LitError::RebaseInProgress)
    ));

    // resolve and continue
    t.write("shared.txt", "resolved version\n");
    t.repo.add(&["shared.txt".to_string()]).unwrap();
    let outcome = t.repo.rebase_continue().unwrap();
    let new_tip = match outcome {
        RebaseOutcome::Finished(tip) => tip,
        other => panic!("expected finish, got {other:?}"),
    };

    // history is A <- B <- C <- D' <- E'
    let e2 = t.repo.database().load_commit(&new_tip).unwrap();
    assert_eq!(e2.message(), "E");
    let d2 = t.repo.database().load_commit(&e2.parents()[0]).unwrap();
    assert_eq!(d2.message(), "D");
    assert_eq!(d2.parents(), &[c]);

    // the resolution made it into D's replayed tree
    let d2_files = t.repo.database().flatten_tree(d2.tree_oid()).unwrap();
    let shared = t
        .repo
        .database()
        .load_blob(&d2_files[std::path::Path::new("shared.txt")].oid)
        .unwrap();
    assert_eq!(shared.content(), b"resolved version\n");

    assert!(!t.repo.rebase_state_dir().exists());
    assert_eq!(t.read("late.txt"), "late\n");
}

#[test]
fn rebase_abort_restores_the_original_tip() {
    let t = TestRepo::init();
    t.write("shared.txt", "original\n");
    t.commit_all("A");

    t.repo.create_branch("f", None).unwrap();
    t.write("shared.txt", "main\n");
    t.commit_all("B");

    t.repo.checkout("f", false).unwrap();
    t.write("shared.txt", "feature\n");
    let feature_tip = t.commit_all("D");

    assert!(matches!(
        t.repo.rebase("main").unwrap(),
        RebaseOutcome::Stopped { .. }
    ));

    t.repo.rebase_abort().unwrap();
    assert_eq!(t.head(), feature_tip);
    assert_eq!(t.read("shared.txt"), "feature\n");
    assert!(!t.repo.rebase_state_dir().exists());
}

#[test]
fn rebase_onto_an_ancestor_is_up_to_date() {
    let t = TestRepo::init();
    t.write("a.txt", "a\n");
    let first = t.commit_all("first");
    t.write("b.txt", "b\n");
    t.commit_all("second");

    let outcome = t.repo.rebase(first.as_ref()).unwrap();
    assert_eq!(outcome, RebaseOutcome::UpToDate);
}

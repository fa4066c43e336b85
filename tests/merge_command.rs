mod common;

use common::{TestRepo, assert_object_closure, conflict_stage_oids};
use lit::artifacts::merge::text_merge::Strategy;
use lit::commands::merge::MergeOutcome;
use lit::errors::LitError;
use pretty_assertions::assert_eq;

#[test]
fn fast_forward_moves_the_branch_without_a_commit() {
    let t = TestRepo::init();
    t.write("base.txt", "base\n");
    let x = t.commit_all("X");

    t.repo.create_branch("f", None).unwrap();
    t.repo.checkout("f", false).unwrap();
    t.write("feature.txt", "feature work\n");
    let y = t.commit_all("Y");

    t.repo.checkout("main", false).unwrap();
    let outcome = t.repo.merge("f", None, None).unwrap();

    assert_eq!(outcome, MergeOutcome::FastForward(y.clone()));
    assert_eq!(t.branch_tip("main"), y);
    assert_eq!(t.read("feature.txt"), "feature work\n");

    // no merge commit was created: Y's parent is still X
    let tip = t.repo.database().load_commit(&y).unwrap();
    assert_eq!(tip.parents(), &[x]);
}

#[test]
fn fast_forward_of_up_to_date_branch_is_a_noop() {
    let t = TestRepo::init();
    t.write("a.txt", "a\n");
    t.commit_all("initial");

    t.repo.create_branch("same", None).unwrap();
    let before = t.repo.database().iter_oids().unwrap().len();

    let outcome = t.repo.merge("same", None, None).unwrap();
    assert_eq!(outcome, MergeOutcome::AlreadyUpToDate);

    // objects, index and working tree untouched
    assert_eq!(t.repo.database().iter_oids().unwrap().len(), before);
    assert_eq!(t.read("a.txt"), "a\n");
}

#[test]
fn three_way_clean_merge_combines_both_sides() {
    let t = TestRepo::init();
    t.write("a.txt", "1\n2\n3\n");
    let base = t.commit_all("base");

    t.repo.create_branch("theirs-branch", None).unwrap();

    // ours changes line 1
    t.write("a.txt", "one\n2\n3\n");
    let ours = t.commit_all("ours change");

    // theirs changes line 3
    t.repo.checkout("theirs-branch", false).unwrap();
    t.write("a.txt", "1\n2\nthree\n");
    let theirs = t.commit_all("theirs change");

    t.repo.checkout("main", false).unwrap();
    let outcome = t.repo.merge("theirs-branch", None, None).unwrap();

    let merged_oid = match outcome {
        MergeOutcome::Merged(oid) => oid,
        other => panic!("expected a merge commit, got {other:?}"),
    };

    assert_eq!(t.read("a.txt"), "one\n2\nthree\n");

    let merge_commit = t.repo.database().load_commit(&merged_oid).unwrap();
    assert_eq!(merge_commit.parents(), &[ours, theirs]);
    assert!(merge_commit.parents().iter().all(|p| *p != base));

    assert_object_closure(&t.repo);
}

#[test]
fn conflicting_merge_persists_stages_and_markers() {
    let t = TestRepo::init();
    t.write("a.txt", "x\n");
    t.commit_all("base");

    t.repo.create_branch("other", None).unwrap();
    t.write("a.txt", "y\n");
    t.commit_all("ours");

    t.repo.checkout("other", false).unwrap();
    t.write("a.txt", "z\n");
    let theirs = t.commit_all("theirs");

    t.repo.checkout("main", false).unwrap();
    let outcome = t.repo.merge("other", None, None).unwrap();

    match &outcome {
        MergeOutcome::Conflicted(paths) => {
            assert_eq!(paths, &vec![std::path::PathBuf::from("a.txt")]);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    // marker-annotated file in the working tree
    assert_eq!(
        t.read("a.txt"),
        "<<<<<<< ours\ny\n=======\nz\n>>>>>>> theirs\n"
    );

    // stages 1, 2, 3 in the index
    let (base_stage, ours_stage, theirs_stage) = conflict_stage_oids(&t.repo, "a.txt");
    assert!(base_stage.is_some());
    assert!(ours_stage.is_some());
    assert!(theirs_stage.is_some());

    // MERGE_HEAD names the other side
    assert_eq!(t.repo.refs().read_merge_head().unwrap(), Some(theirs));

    // committing with unresolved stages is refused
    let err = t.repo.commit("must fail").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LitError>(),
        Some(LitError::Conflict { .. })
    ));
}

#[test]
fn theirs_strategy_resolves_and_commits() {
    let t = TestRepo::init();
    t.write("a.txt", "x\n");
    t.commit_all("base");

    t.repo.create_branch("other", None).unwrap();
    t.write("a.txt", "y\n");
    t.commit_all("ours");

    t.repo.checkout("other", false).unwrap();
    t.write("a.txt", "z\n");
    t.commit_all("theirs");

    t.repo.checkout("main", false).unwrap();

    // first try conflicts; abort, then retry with the strategy
    let conflicted = t.repo.merge("other", None, None).unwrap();
    assert!(conflicted.is_conflicted());
    t.repo.merge_abort().unwrap();
    assert_eq!(t.read("a.txt"), "y\n");
    assert!(t.repo.refs().read_merge_head().unwrap().is_none());

    let outcome = t
        .repo
        .merge("other", Some(Strategy::Theirs), None)
        .unwrap();
    assert!(matches!(outcome, MergeOutcome::Merged(_)));
    assert_eq!(t.read("a.txt"), "z\n");
    assert!(!t.repo.index().has_conflicts());
}

#[test]
fn manual_resolution_concludes_the_merge() {
    let t = TestRepo::init();
    t.write("a.txt", "x\n");
    t.commit_all("base");

    t.repo.create_branch("other", None).unwrap();
    t.write("a.txt", "y\n");
    let ours = t.commit_all("ours");

    t.repo.checkout("other", false).unwrap();
    t.write("a.txt", "z\n");
    let theirs = t.commit_all("theirs");

    t.repo.checkout("main", false).unwrap();
    assert!(t.repo.merge("other", None, None).unwrap().is_conflicted());

    // resolve by hand and stage the result
    t.write("a.txt", "resolved\n");
    t.repo.add(&["a.txt".to_string()]).unwrap();
    assert!(!t.repo.index().has_conflicts());

    let merge_commit_oid = t.repo.commit("").unwrap();
    let merge_commit = t.repo.database().load_commit(&merge_commit_oid).unwrap();
    assert_eq!(merge_commit.parents(), &[ours, theirs]);

    // merge state is gone
    assert!(t.repo.refs().read_merge_head().unwrap().is_none());
    assert!(t.repo.status().unwrap().in_progress.is_none());
}

#[test]
fn merge_while_merge_in_progress_is_rejected() {
    let t = TestRepo::init();
    t.write("a.txt", "x\n");
    t.commit_all("base");

    t.repo.create_branch("other", None).unwrap();
    t.write("a.txt", "y\n");
    t.commit_all("ours");

    t.repo.checkout("other", false).unwrap();
    t.write("a.txt", "z\n");
    t.commit_all("theirs");

    t.repo.checkout("main", false).unwrap();
    assert!(t.repo.merge("other", None, None).unwrap().is_conflicted());

    let err = t.repo.merge("other", None, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LitError>(),
        Some(LitError::MergeInProgress)
    ));
}

#[test]
fn union_strategy_concatenates_both_sides() {
    let t = TestRepo::init();
    t.write("a.txt", "x\n");
    t.commit_all("base");

    t.repo.create_branch("other", None).unwrap();
    t.write("a.txt", "y\n");
    t.commit_all("ours");

    t.repo.checkout("other", false).unwrap();
    t.write("a.txt", "z\n");
    t.commit_all("theirs");

    t.repo.checkout("main", false).unwrap();
    let outcome = t.repo.merge("other", Some(Strategy::Union), None).unwrap();

    assert!(matches!(outcome, MergeOutcome::Merged(_)));
    assert_eq!(t.read("a.txt"), "y\nz\n");
}

#[test]
fn merge_base_of_criss_cross_still_merges() {
    let t = TestRepo::init();
    t.write("shared.txt", "start\n");
    t.commit_all("root");

    t.repo.create_branch("left", None).unwrap();
    t.repo.create_branch("right", None).unwrap();

    t.repo.checkout("left", false).unwrap();
    t.write("left.txt", "left\n");
    let left_work = t.commit_all("left work");

    t.repo.checkout("right", false).unwrap();
    t.write("right.txt", "right\n");
    let right_work = t.commit_all("right work");

    // cross-merge the pre-merge tips by id so both sides gain a merge
    // commit with the same pair of ancestors
    t.repo.checkout("left", false).unwrap();
    assert!(
        !t.repo
            .merge(right_work.as_ref(), None, None)
            .unwrap()
            .is_conflicted()
    );
    t.repo.checkout("right", false).unwrap();
    assert!(
        !t.repo
            .merge(left_work.as_ref(), None, None)
            .unwrap()
            .is_conflicted()
    );

    // diverge once more and merge across the criss-cross
    t.repo.checkout("left", false).unwrap();
    t.write("left.txt", "left again\n");
    t.commit_all("left refresh");

    let outcome = t.repo.merge("right", None, None).unwrap();
    assert!(!outcome.is_conflicted());
    assert_object_closure(&t.repo);
}

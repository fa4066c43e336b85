mod common;

use common::{TestRepo, tree_contents};
use lit::commands::merge::MergeOutcome;
use lit::commands::reset::ResetMode;
use pretty_assertions::assert_eq;

#[test]
fn soft_reset_moves_head_only() {
    let t = TestRepo::init();
    t.write("a.txt", "one\n");
    let first = t.commit_all("first");
    t.write("a.txt", "two\n");
    t.commit_all("second");

    t.repo.reset(first.as_ref(), ResetMode::Soft).unwrap();

    assert_eq!(t.head(), first);
    // index still holds the second commit's content
    let index_tree = t.repo.index().write_tree(t.repo.database()).unwrap();
    let first_tree = t
        .repo
        .database()
        .load_commit(&first)
        .unwrap()
        .tree_oid()
        .clone();
    assert_ne!(index_tree, first_tree);
    // working tree untouched
    assert_eq!(t.read("a.txt"), "two\n");
}

#[test]
fn mixed_reset_replaces_the_index() {
    let t = TestRepo::init();
    t.write("a.txt", "one\n");
    let first = t.commit_all("first");
    t.write("a.txt", "two\n");
    t.commit_all("second");

    t.repo.reset(first.as_ref(), ResetMode::Mixed).unwrap();

    assert_eq!(t.head(), first);
    let index_tree = t.repo.index().write_tree(t.repo.database()).unwrap();
    let first_tree = t
        .repo
        .database()
        .load_commit(&first)
        .unwrap()
        .tree_oid()
        .clone();
    assert_eq!(index_tree, first_tree);
    // working tree untouched
    assert_eq!(t.read("a.txt"), "two\n");
}

#[test]
fn hard_reset_restores_everything() {
    let t = TestRepo::init();
    t.write("a.txt", "one\n");
    t.write("keep/nested.txt", "nested\n");
    let first = t.commit_all("first");

    t.write("a.txt", "two\n");
    t.write("b.txt", "new file\n");
    t.commit_all("second");
    t.write("untracked.txt", "leave me alone\n");

    t.repo.reset(first.as_ref(), ResetMode::Hard).unwrap();

    // HEAD, index and working tree all at the target commit
    assert_eq!(t.head(), first);
    let index_tree = t.repo.index().write_tree(t.repo.database()).unwrap();
    let first_tree = t
        .repo
        .database()
        .load_commit(&first)
        .unwrap()
        .tree_oid()
        .clone();
    assert_eq!(index_tree, first_tree);

    assert_eq!(t.read("a.txt"), "one\n");
    assert!(!t.exists("b.txt"));
    // untracked files survive a hard reset
    assert_eq!(t.read("untracked.txt"), "leave me alone\n");
}

#[test]
fn orig_head_points_at_the_pre_reset_tip() {
    let t = TestRepo::init();
    t.write("a.txt", "one\n");
    let first = t.commit_all("first");
    t.write("a.txt", "two\n");
    let second = t.commit_all("second");

    t.repo.reset(first.as_ref(), ResetMode::Hard).unwrap();
    assert_eq!(t.repo.refs().read_orig_head().unwrap(), Some(second));
}

#[test]
fn stash_push_saves_and_cleans() {
    let t = TestRepo::init();
    t.write("a.txt", "committed\n");
    t.commit_all("base");

    t.write("a.txt", "work in progress\n");
    t.write("staged.txt", "staged content\n");
    t.repo.add(&["staged.txt".to_string()]).unwrap();

    let stash_oid = t.repo.stash_push(None).unwrap().expect("stash created");

    // the working tree is back at HEAD
    assert_eq!(t.read("a.txt"), "committed\n");
    assert!(!t.exists("staged.txt"));

    // the stash commit has (HEAD, index-commit) as parents
    let stash_commit = t.repo.database().load_commit(&stash_oid).unwrap();
    assert_eq!(stash_commit.parents().len(), 2);
    assert_eq!(stash_commit.parents()[0], t.head());

    // the stash list holds the entry
    assert_eq!(t.repo.refs().read_stash_list().unwrap(), vec![stash_oid]);
}

#[test]
fn stash_apply_restores_the_changes() {
    let t = TestRepo::init();
    t.write("a.txt", "committed\n");
    t.commit_all("base");

    t.write("a.txt", "work in progress\n");
    t.repo.stash_push(None).unwrap().expect("stash created");
    assert_eq!(t.read("a.txt"), "committed\n");

    let outcome = t.repo.stash_apply(0).unwrap();
    assert!(matches!(outcome, MergeOutcome::Merged(_)));
    assert_eq!(t.read("a.txt"), "work in progress\n");

    // apply keeps the entry, pop removes it
    assert_eq!(t.repo.refs().read_stash_list().unwrap().len(), 1);
}

#[test]
fn stash_pop_drops_the_entry_after_applying() {
    let t = TestRepo::init();
    t.write("a.txt", "committed\n");
    t.commit_all("base");

    t.write("a.txt", "stashed change\n");
    t.repo.stash_push(None).unwrap().expect("stash created");

    let outcome = t.repo.stash_pop(0).unwrap();
    assert!(matches!(outcome, MergeOutcome::Merged(_)));
    assert_eq!(t.read("a.txt"), "stashed change\n");
    assert!(t.repo.refs().read_stash_list().unwrap().is_empty());
}

#[test]
fn stash_entries_stack_newest_first() {
    let t = TestRepo::init();
    t.write("a.txt", "committed\n");
    t.commit_all("base");

    t.write("a.txt", "first change\n");
    let first = t.repo.stash_push(Some("first stash")).unwrap().unwrap();
    t.write("a.txt", "second change\n");
    let second = t.repo.stash_push(Some("second stash")).unwrap().unwrap();

    assert_eq!(
        t.repo.refs().read_stash_list().unwrap(),
        vec![second, first]
    );

    t.repo.stash_drop(0).unwrap();
    assert_eq!(t.repo.refs().read_stash_list().unwrap().len(), 1);

    t.repo.stash_clear().unwrap();
    assert!(t.repo.refs().read_stash_list().unwrap().is_empty());
}

#[test]
fn stash_with_no_changes_is_a_noop() {
    let t = TestRepo::init();
    t.write("a.txt", "committed\n");
    t.commit_all("base");

    assert!(t.repo.stash_push(None).unwrap().is_none());
    assert!(t.repo.refs().read_stash_list().unwrap().is_empty());
}

#[test]
fn stash_apply_after_head_moved_merges() {
    let t = TestRepo::init();
    t.write("a.txt", "v1\n");
    t.write("other.txt", "other\n");
    t.commit_all("base");

    // stash a change to other.txt
    t.write("other.txt", "stashed edit\n");
    t.repo.stash_push(None).unwrap().expect("stash created");

    // meanwhile history advances on a different file
    t.write("a.txt", "v2\n");
    t.commit_all("advance");

    let outcome = t.repo.stash_apply(0).unwrap();
    assert!(matches!(outcome, MergeOutcome::Merged(_)));
    assert_eq!(t.read("other.txt"), "stashed edit\n");
    assert_eq!(t.read("a.txt"), "v2\n");
}

#[test]
fn reset_equivalence_head_index_worktree() {
    let t = TestRepo::init();
    t.write("x.txt", "x1\n");
    t.write("y.txt", "y1\n");
    let target = t.commit_all("target");
    t.write("x.txt", "x2\n");
    t.commit_all("later");

    t.repo.reset(target.as_ref(), ResetMode::Hard).unwrap();

    // HEAD = C
    assert_eq!(t.head(), target);
    // index = tree(C)
    let target_tree = t
        .repo
        .database()
        .load_commit(&target)
        .unwrap()
        .tree_oid()
        .clone();
    assert_eq!(
        t.repo.index().write_tree(t.repo.database()).unwrap(),
        target_tree
    );
    // working tree = tree(C)
    let expected = tree_contents(&t.repo, &target);
    for (path, content) in expected {
        assert_eq!(t.read(&path).as_bytes(), content.as_slice());
    }
}

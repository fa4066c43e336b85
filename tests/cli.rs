use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::predicate;
use std::path::Path;

fn lit_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("lit").expect("failed to find lit binary");
    cmd.current_dir(dir);
    cmd.env("LIT_AUTHOR_NAME", "A");
    cmd.env("LIT_AUTHOR_EMAIL", "a@x");
    cmd.env("LIT_COMMITTER_NAME", "A");
    cmd.env("LIT_COMMITTER_EMAIL", "a@x");
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

#[test]
fn init_reports_the_repository_location() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    lit_command(dir.path(), &["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized empty Lit repository"));

    assert!(dir.path().join(".lit/HEAD").exists());
    assert!(dir.path().join(".lit/objects").is_dir());

    Ok(())
}

#[test]
fn add_commit_status_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    lit_command(dir.path(), &["init"]).assert().success();

    std::fs::write(dir.path().join("README.md"), "hello\n")?;
    lit_command(dir.path(), &["add", "README.md"])
        .assert()
        .success();
    lit_command(dir.path(), &["commit", "-m", "first"])
        .assert()
        .success()
        .stdout(predicate::str::contains("first"));

    lit_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to commit"));

    Ok(())
}

#[test]
fn fixed_author_date_produces_a_stable_commit_id()
-> Result<(), Box<dyn std::error::Error>> {
    let make_repo = || -> Result<String, Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        lit_command(dir.path(), &["init"]).assert().success();
        std::fs::write(dir.path().join("README.md"), "hello\n")?;
        lit_command(dir.path(), &["add", "README.md"])
            .assert()
            .success();

        let mut commit = lit_command(dir.path(), &["commit", "-m", "first"]);
        commit.env("LIT_AUTHOR_DATE", "1700000000 +0000");
        commit.env("LIT_COMMITTER_DATE", "1700000000 +0000");
        commit.assert().success();

        let output = lit_command(dir.path(), &["log", "--oneline"]).output()?;
        Ok(String::from_utf8(output.stdout)?)
    };

    // identical input, author and timestamp: identical commit id
    assert_eq!(make_repo()?, make_repo()?);

    Ok(())
}

#[test]
fn commands_outside_a_repository_fail() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    lit_command(dir.path(), &["status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a lit repository"));

    Ok(())
}

#[test]
fn conflicted_merge_exits_nonzero_and_lists_paths()
-> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    lit_command(dir.path(), &["init"]).assert().success();

    std::fs::write(dir.path().join("a.txt"), "x\n")?;
    lit_command(dir.path(), &["add", "."]).assert().success();
    lit_command(dir.path(), &["commit", "-m", "base"])
        .assert()
        .success();

    lit_command(dir.path(), &["branch", "other"]).assert().success();
    std::fs::write(dir.path().join("a.txt"), "y\n")?;
    lit_command(dir.path(), &["add", "."]).assert().success();
    lit_command(dir.path(), &["commit", "-m", "ours"])
        .assert()
        .success();

    lit_command(dir.path(), &["checkout", "other"])
        .assert()
        .success();
    std::fs::write(dir.path().join("a.txt"), "z\n")?;
    lit_command(dir.path(), &["add", "."]).assert().success();
    lit_command(dir.path(), &["commit", "-m", "theirs"])
        .assert()
        .success();

    lit_command(dir.path(), &["checkout", "main"])
        .assert()
        .success();
    lit_command(dir.path(), &["merge", "other"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("CONFLICT"))
        .stdout(predicate::str::contains("a.txt"));

    // the conflicted file carries markers
    let content = std::fs::read_to_string(dir.path().join("a.txt"))?;
    assert_eq!(content, "<<<<<<< ours\ny\n=======\nz\n>>>>>>> theirs\n");

    // status reports the in-progress merge
    lit_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("a.txt"));

    Ok(())
}

#[test]
fn cat_file_prints_blob_content() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    lit_command(dir.path(), &["init"]).assert().success();

    std::fs::write(dir.path().join("f.txt"), "payload\n")?;
    let output = lit_command(dir.path(), &["hash-object", "-w", "f.txt"]).output()?;
    let oid = String::from_utf8(output.stdout)?.trim().to_string();

    lit_command(dir.path(), &["cat-file", &oid])
        .assert()
        .success()
        .stdout(predicate::str::contains("payload"));

    lit_command(dir.path(), &["cat-file", "-t", &oid])
        .assert()
        .success()
        .stdout(predicate::str::contains("blob"));

    Ok(())
}

#[test]
fn config_get_and_set() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    lit_command(dir.path(), &["init"]).assert().success();

    lit_command(dir.path(), &["config", "user.name", "Config User"])
        .assert()
        .success();
    lit_command(dir.path(), &["config", "user.name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config User"));

    lit_command(dir.path(), &["config", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user.name=Config User"));

    Ok(())
}

#[test]
fn lit_dir_environment_override_is_honoured() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let mut init = lit_command(dir.path(), &["init"]);
    init.env("LIT_DIR", ".custom-lit");
    init.assert().success();

    assert!(dir.path().join(".custom-lit/HEAD").exists());
    assert!(!dir.path().join(".lit").exists());

    Ok(())
}

use crate::areas::repository::Repository;
use std::path::Path;

/// Initialize a repository and report where it landed
pub fn run(
    path: &Path,
    bare: bool,
    writer: Box<dyn std::io::Write>,
) -> anyhow::Result<Repository> {
    let repository = Repository::init(path, bare, writer)?;

    writeln!(
        repository.writer(),
        "Initialized empty Lit repository in {}",
        repository.lit_dir().display()
    )?;

    Ok(repository)
}

//! Local-file transport
//!
//! Accepts `file:///abs/path`, `/abs/path` and `./relative` URL forms and
//! opens the remote's object and ref stores directly. Any other scheme is
//! rejected with `UnsupportedTransport`.
//!
//! Object transfer computes the closure of objects reachable from the
//! wanted tips but absent from the destination store, then copies them
//! raw. Objects always land before any ref pointing at them is updated.

use crate::areas::database::Database;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve a remote URL to a filesystem path
pub fn parse_url(url: &str, base: &Path) -> anyhow::Result<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }

    if url.contains("://") || url.starts_with("git@") {
        return Err(LitError::UnsupportedTransport {
            url: url.to_string(),
        }
        .into());
    }

    let path = Path::new(url);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(base.join(path))
    }
}

/// An opened local remote repository
pub struct LocalTransport {
    repository: Repository,
}

impl LocalTransport {
    /// Open the repository a URL points at; relative paths resolve
    /// against `base`.
    pub fn open(url: &str, base: &Path) -> anyhow::Result<Self> {
        let path = parse_url(url, base)?;
        let repository = Repository::open_at(&path, Box::new(std::io::sink()))?;

        Ok(LocalTransport { repository })
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn database(&self) -> &Database {
        self.repository.database()
    }

    /// Advertise the remote's branches as `(name, tip)` pairs
    pub fn advertise_refs(&self) -> anyhow::Result<Vec<(String, ObjectId)>> {
        self.repository.refs().list_branches()
    }

    /// The branch the remote's HEAD points at
    pub fn head_branch(&self) -> anyhow::Result<Option<BranchName>> {
        self.repository.refs().current_branch()
    }
}

/// Ids directly referenced by an object
fn referenced_oids(database: &Database, oid: &ObjectId) -> anyhow::Result<Vec<ObjectId>> {
    match database.parse_object(oid)? {
        ObjectBox::Blob(_) => Ok(Vec::new()),
        ObjectBox::Tree(tree) => Ok(tree.into_entries().map(|(_, entry)| entry.oid).collect()),
        ObjectBox::Commit(commit) => {
            let mut refs = vec![commit.tree_oid().clone()];
            refs.extend(commit.parents().iter().cloned());
            Ok(refs)
        }
        ObjectBox::Tag(tag) => Ok(vec![tag.target().clone()]),
    }
}

/// Compute the objects reachable from `wants` in `source` that are
/// missing from `destination`
///
/// The traversal stops at any object the destination already stores,
/// which plays the role of the "have" set: everything below a known
/// object is known too, by the closure invariant.
pub fn missing_objects(
    source: &Database,
    destination: &Database,
    wants: &[ObjectId],
) -> anyhow::Result<Vec<ObjectId>> {
    let mut missing = Vec::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut frontier: Vec<ObjectId> = wants.to_vec();

    while let Some(oid) = frontier.pop() {
        if !seen.insert(oid.clone()) {
            continue;
        }
        if destination.has(&oid) {
            continue;
        }

        frontier.extend(referenced_oids(source, &oid)?);
        missing.push(oid);
    }

    debug!(count = missing.len(), "objects to transfer");
    Ok(missing)
}

/// Copy objects raw between stores, verifying each digest on write
pub fn copy_objects(
    source: &Database,
    destination: &Database,
    oids: &[ObjectId],
) -> anyhow::Result<()> {
    for oid in oids {
        let content = source.load(oid)?;
        destination.store_raw(oid, &content)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("file:///tmp/repo", "/tmp/repo")]
    #[case("/abs/path", "/abs/path")]
    fn absolute_urls_parse(#[case] url: &str, #[case] expected: &str) {
        let parsed = parse_url(url, Path::new("/base")).unwrap();
        assert_eq!(parsed, PathBuf::from(expected));
    }

    #[test]
    fn relative_url_resolves_against_base() {
        let parsed = parse_url("./sibling", Path::new("/base")).unwrap();
        assert_eq!(parsed, PathBuf::from("/base/sibling"));
    }

    #[rstest]
    #[case("https://example.com/repo.git")]
    #[case("ssh://host/repo")]
    #[case("git@host:repo.git")]
    fn network_schemes_are_rejected(#[case] url: &str) {
        let err = parse_url(url, Path::new("/base")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LitError>(),
            Some(LitError::UnsupportedTransport { .. })
        ));
    }
}

//! Revision specifications
//!
//! Supported forms:
//! - ref names and object ids, in the ref store's priority order
//! - `@` as an alias for `HEAD`
//! - `<rev>^` (first parent) and `<rev>~<n>` (n-th first-parent ancestor)
//!
//! Suffixes nest, so `main~2^` resolves the way Git resolves it.

use crate::areas::repository::Repository;
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// A ref name or (abbreviated) object id
    Name(String),
    /// First parent of a revision (`rev^`)
    Parent(Box<Revision>),
    /// N-th first-parent ancestor (`rev~n`)
    Ancestor(Box<Revision>, usize),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        let parent_re = regex::Regex::new(PARENT_REGEX)
            .with_context(|| format!("invalid parent regex {PARENT_REGEX}"))?;
        let ancestor_re = regex::Regex::new(ANCESTOR_REGEX)
            .with_context(|| format!("invalid ancestor regex {ANCESTOR_REGEX}"))?;

        if let Some(caps) = parent_re.captures(revision) {
            let base = Self::try_parse(&caps[1])?;
            return Ok(Revision::Parent(Box::new(base)));
        }

        if let Some(caps) = ancestor_re.captures(revision) {
            let base = Self::try_parse(&caps[1])?;
            let generations: usize = caps[2]
                .parse()
                .with_context(|| format!("invalid ancestor count in {revision:?}"))?;
            return Ok(Revision::Ancestor(Box::new(base), generations));
        }

        let name = if revision == "@" { "HEAD" } else { revision };
        if name.is_empty() {
            return Err(LitError::InvalidRefName {
                name: revision.to_string(),
            }
            .into());
        }

        Ok(Revision::Name(name.to_string()))
    }

    /// Resolve to a commit id, peeling annotated tags
    pub fn resolve(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Name(name) => repository
                .refs()
                .resolve_commit(name, repository.database()),
            Revision::Parent(base) => {
                let oid = base.resolve(repository)?;
                Self::first_parent(repository, &oid)
            }
            Revision::Ancestor(base, generations) => {
                let mut oid = base.resolve(repository)?;
                for _ in 0..*generations {
                    oid = Self::first_parent(repository, &oid)?;
                }
                Ok(oid)
            }
        }
    }

    fn first_parent(repository: &Repository, oid: &ObjectId) -> anyhow::Result<ObjectId> {
        let commit = repository.database().load_commit(oid)?;
        commit.parent().cloned().ok_or_else(|| {
            LitError::NotFound {
                kind: "parent of commit",
                name: oid.to_short_oid(),
            }
            .into()
        })
    }
}

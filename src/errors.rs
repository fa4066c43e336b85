//! Error taxonomy for repository operations
//!
//! Most functions in this crate return `anyhow::Result`; conditions a caller
//! is expected to branch on are raised as [`LitError`] values wrapped in the
//! `anyhow` error so they survive context annotation and can be recovered
//! with `downcast_ref`.
//!
//! Recoverable kinds (`Dirty`, `Stale`, `NonFastForward`, ...) are returned
//! to the caller, which decides whether to abort or retry. Corruption kinds
//! fail the operation and leave repository state untouched.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LitError {
    #[error("not a lit repository (or any of the parent directories)")]
    NotARepository,

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("corrupt {kind}: {detail}")]
    Corrupt { kind: &'static str, detail: String },

    #[error("object {oid} does not hash to its name")]
    HashMismatch { oid: String },

    #[error("short object id {prefix} is ambiguous ({} candidates)", candidates.len())]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("local changes would be overwritten: {}", format_paths(paths))]
    Dirty { paths: Vec<PathBuf> },

    #[error("unresolved conflicts in: {}", format_paths(paths))]
    Conflict { paths: Vec<PathBuf> },

    #[error("non-fast-forward update of {reference} rejected")]
    NonFastForward { reference: String },

    #[error("reference {reference} changed concurrently (expected {expected}, found {actual})")]
    Stale {
        reference: String,
        expected: String,
        actual: String,
    },

    #[error("cyclic symbolic reference at {reference}")]
    Cyclic { reference: String },

    #[error("symbolic reference chain too deep at {reference}")]
    TooDeep { reference: String },

    #[error("branch {reference} has no commits yet")]
    UnbornBranch { reference: String },

    #[error("cannot delete branch {name}: it is the checked-out branch")]
    CurrentBranch { name: String },

    #[error("invalid reference name: {name}")]
    InvalidRefName { name: String },

    #[error("bad object {oid}")]
    BadObject { oid: String },

    #[error("unsupported transport for url {url}")]
    UnsupportedTransport { url: String },

    #[error("a rebase is already in progress (use rebase --continue or --abort)")]
    RebaseInProgress,

    #[error("a merge is already in progress (resolve conflicts and commit, or merge --abort)")]
    MergeInProgress,

    #[error("a cherry-pick is already in progress (use cherry-pick --continue or --abort)")]
    CherryPickInProgress,

    #[error("HEAD is detached; this operation requires a branch")]
    DetachedHead,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl LitError {
    /// Exit code the CLI shell should report for this error kind.
    ///
    /// Known, recoverable conditions exit with 1; corruption and IO
    /// failures are fatal (128).
    pub fn exit_code(&self) -> i32 {
        match self {
            LitError::Corrupt { .. }
            | LitError::HashMismatch { .. }
            | LitError::BadObject { .. }
            | LitError::Io(_) => 128,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_exit_with_one() {
        let err = LitError::NonFastForward {
            reference: "refs/heads/main".to_string(),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn corruption_is_fatal() {
        let err = LitError::Corrupt {
            kind: "object",
            detail: "truncated zlib stream".to_string(),
        };
        assert_eq!(err.exit_code(), 128);
    }

    #[test]
    fn errors_survive_anyhow_wrapping() {
        let err: anyhow::Error = LitError::NotARepository.into();
        let recovered = err.downcast_ref::<LitError>();
        assert!(matches!(recovered, Some(LitError::NotARepository)));
    }
}

//! Lit: a Git-compatible distributed version control core
//!
//! The crate is organised in three layers:
//!
//! - [`areas`]: the persistent stores of a repository (object database,
//!   index, refs, working tree, config) behind an explicit
//!   [`areas::repository::Repository`] handle
//! - [`artifacts`]: the data structures and algorithms (object codecs,
//!   diff, merge, revision walks, ignore matching, transport)
//! - [`commands`]: porcelain operations composing the two, one
//!   `impl Repository` block per operation
//!
//! On-disk formats (loose objects, DIRC index, ref files, commit and tag
//! encodings) are bit-compatible with Git, so repositories can be
//! inspected with stock Git tooling.

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;

pub use areas::repository::Repository;
pub use errors::LitError;

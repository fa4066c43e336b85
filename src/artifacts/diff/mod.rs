//! Diff algorithms and tree comparison
//!
//! - `diff_algorithm`: Myers' shortest-edit-script diff over line
//!   sequences, plus unified-hunk assembly
//! - `tree_diff`: sorted two-tree walk detecting per-path changes

pub mod diff_algorithm;
pub mod tree_diff;

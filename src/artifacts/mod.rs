//! Data structures and algorithms
//!
//! - `objects`: object model (blob, tree, commit, tag) and codecs
//! - `index`: index entry encoding, modes, checksummed IO
//! - `branch`: ref-name validation and revision parsing
//! - `diff`: Myers line diff and tree diffing
//! - `merge`: merge base, diff3 text merge, three-way tree merge
//! - `ignore`: gitignore-style pattern matching
//! - `log`: revision walk and graph rendering
//! - `checkout`: tree to working-tree migration
//! - `remote`: local-file transport and object transfer

pub mod branch;
pub mod checkout;
pub mod diff;
pub mod ignore;
pub mod index;
pub mod log;
pub mod merge;
pub mod objects;
pub mod remote;

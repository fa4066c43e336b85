//! Branch names and revision specifications
//!
//! - Branch/tag name validation (Git's ref-name rules)
//! - Revision syntax: names, `@` alias, `rev^`, `rev~N`, full and
//!   abbreviated object ids

pub mod branch_name;
pub mod revision;

/// Regex matching the character sequences Git forbids in ref names
pub const INVALID_REF_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\.lock$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

/// `rev^` (first parent)
pub const PARENT_REGEX: &str = r"^(.+)\^$";

/// `rev~N` (Nth first-parent ancestor)
pub const ANCESTOR_REGEX: &str = r"^(.+)\~(\d+)$";

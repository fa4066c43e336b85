//! Index file format
//!
//! The index (staging area) binds repository-relative paths to blob ids and
//! file metadata. It is the source for the next commit's tree.
//!
//! ## File format (version 2)
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2 (u32 big-endian)
//!   - Entry count (u32 big-endian)
//!
//! Entries (variable length):
//!   - Fixed 62-byte prefix, NUL-terminated path, padded to 8-byte alignment
//!   - Flags word carries the conflict stage in bits 12-13
//!
//! Checksum (20 bytes):
//!   - SHA-1 of all preceding bytes
//! ```

pub mod checksum;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;

/// Size of the SHA-1 trailer in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Size of the index header in bytes
pub const HEADER_SIZE: usize = 12;

/// Magic signature identifying index files
pub const SIGNATURE: &str = "DIRC";

/// Index file format version
pub const VERSION: u32 = 2;

/// Conflict stage discriminator of an index entry
///
/// Stage 0 is a clean entry; stages 1/2/3 hold the base/ours/theirs sides
/// of an unresolved conflict.
pub type Stage = u8;

pub const STAGE_CLEAN: Stage = 0;
pub const STAGE_BASE: Stage = 1;
pub const STAGE_OURS: Stage = 2;
pub const STAGE_THEIRS: Stage = 3;

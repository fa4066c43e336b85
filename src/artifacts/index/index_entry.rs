//! Index entry representation
//!
//! Each entry binds a tracked path to a blob id plus the file metadata used
//! for fast change detection (mode, size, timestamps, inode). Conflicted
//! paths carry up to three entries at stages 1 (base), 2 (ours), 3 (theirs).
//!
//! ## Entry format
//!
//! 62 fixed bytes, then the NUL-terminated path, padded with NULs so the
//! whole entry is a multiple of 8 bytes. The 16-bit flags word holds the
//! stage in bits 12-13 and the path length (saturated at 0xFFF) below.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::index::{STAGE_CLEAN, Stage};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::LitError;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use is_executable::IsExecutable;
use std::cmp::min;
use std::fs::Metadata;
use std::io::Write;
use std::os::unix::prelude::MetadataExt;
use std::path::{Path, PathBuf};

/// Maximum path length representable in the flags word
const MAX_PATH_SIZE: usize = 0xFFF;

/// Alignment block for entries (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of a serialized entry in bytes
pub const ENTRY_MIN_SIZE: usize = 64;

/// Mask and shift for the stage bits inside the flags word
const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;

/// One tracked path at one stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    /// Repository-relative, forward-slash separated path
    pub name: PathBuf,
    /// Blob id of the staged content
    pub oid: ObjectId,
    /// Conflict stage (0 = clean)
    pub stage: Stage,
    /// Cached file metadata for dirty checks
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn new(name: PathBuf, oid: ObjectId, metadata: EntryMetadata) -> Self {
        IndexEntry {
            name,
            oid,
            stage: STAGE_CLEAN,
            metadata,
        }
    }

    pub fn new_at_stage(name: PathBuf, oid: ObjectId, stage: Stage, mode: EntryMode) -> Self {
        IndexEntry {
            name,
            oid,
            stage,
            metadata: EntryMetadata {
                mode,
                ..Default::default()
            },
        }
    }

    pub fn basename(&self) -> anyhow::Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid file name {:?}", self.name))
    }

    /// All ancestor directories of the entry, shallowest first
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs: Vec<&Path> = self
            .name
            .ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        dirs.reverse();

        dirs
    }

    /// Whether the cached stat data still describes `other`
    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    fn flags(&self) -> u16 {
        let name_length = self.name.as_os_str().len();
        ((self.stage as u16) << STAGE_SHIFT) | min(name_length, MAX_PATH_SIZE) as u16
    }

    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let entry_name = self
            .name
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("invalid entry name {:?}", self.name))?;

        let mut entry_bytes = Vec::new();
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_raw_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(self.flags())?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // at least one NUL terminator, padded to the alignment block
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(LitError::Corrupt {
                kind: "index",
                detail: "truncated entry".to_string(),
            }
            .into());
        }

        let ctime = byteorder::NetworkEndian::read_u32(&bytes[0..4]) as i64;
        let ctime_nsec = byteorder::NetworkEndian::read_u32(&bytes[4..8]) as i64;
        let mtime = byteorder::NetworkEndian::read_u32(&bytes[8..12]) as i64;
        let mtime_nsec = byteorder::NetworkEndian::read_u32(&bytes[12..16]) as i64;
        let dev = byteorder::NetworkEndian::read_u32(&bytes[16..20]) as u64;
        let ino = byteorder::NetworkEndian::read_u32(&bytes[20..24]) as u64;
        let mode = EntryMode::try_from(byteorder::NetworkEndian::read_u32(&bytes[24..28]))?;
        let uid = byteorder::NetworkEndian::read_u32(&bytes[28..32]);
        let gid = byteorder::NetworkEndian::read_u32(&bytes[32..36]);
        let size = byteorder::NetworkEndian::read_u32(&bytes[36..40]) as u64;
        let mut oid_bytes = std::io::Cursor::new(&bytes[40..60]);
        let oid = ObjectId::read_raw_from(&mut oid_bytes)?;
        let flags = byteorder::NetworkEndian::read_u16(&bytes[60..62]);
        let stage = ((flags & STAGE_MASK) >> STAGE_SHIFT) as Stage;

        let name_end = bytes[62..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| LitError::Corrupt {
                kind: "index",
                detail: "missing NUL terminator in entry name".to_string(),
            })?;
        let name_bytes = &bytes[62..62 + name_end];
        let name = PathBuf::from(std::str::from_utf8(name_bytes).map_err(|_| {
            LitError::Corrupt {
                kind: "index",
                detail: "non-utf8 entry name".to_string(),
            }
        })?);

        Ok(IndexEntry {
            name,
            oid,
            stage,
            metadata: EntryMetadata {
                ctime,
                ctime_nsec,
                mtime,
                mtime_nsec,
                dev,
                ino,
                mode,
                uid,
                gid,
                size,
            },
        })
    }
}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.stage.cmp(&other.stage))
    }
}

/// File metadata cached in index entries
///
/// Comparing these fields against a fresh stat lets change detection skip
/// rehashing unmodified files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl EntryMetadata {
    /// Capture metadata for a working-tree file
    ///
    /// `file_path` must be the absolute path so the executable bit can be
    /// probed; symlinks are detected from the (non-followed) metadata.
    pub fn capture(file_path: &Path, metadata: &Metadata) -> Self {
        let mode = if metadata.file_type().is_symlink() {
            EntryMode::Symlink
        } else if metadata.is_dir() {
            EntryMode::Directory
        } else if file_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        Self {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
        }
    }
}

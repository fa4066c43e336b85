pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tag;
pub mod tree;

/// Length of a hex-encoded object id
pub const OBJECT_ID_LENGTH: usize = 40;

/// Length of a raw SHA-1 digest in bytes
pub const OBJECT_ID_RAW_LENGTH: usize = 20;

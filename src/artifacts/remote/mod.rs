//! Remote synchronisation over a local filesystem transport
//!
//! The core exposes ref advertisement and object-set transfer; the only
//! bundled transport opens another repository through the filesystem.

pub mod transport;

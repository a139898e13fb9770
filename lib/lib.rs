//! codec-fs shared library.

/// Name and size caches shared across nodes and sessions.
pub mod cache;
pub mod codec;
/// Filesystem abstractions: the async inode front and its FUSE adapter.
pub mod fs;

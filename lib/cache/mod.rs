//! Process-wide caches shared by every node and transcode session.
//!
//! Both caches are plain concurrent maps owned by the [`Catalog`](crate::codec::Catalog) and
//! shared with transcode sessions by `Arc`. Every operation touches exactly one key.

/// Virtual-to-real path mapping registered during directory listing.
pub mod names;
/// Transcoded sizes observed at end-of-stream.
pub mod sizes;

pub use names::NameMap;
pub use sizes::SizeCache;

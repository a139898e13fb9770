//! Sizes of transcoded streams, learned when a stream is fully drained.

use std::path::{Path, PathBuf};

/// Maps a virtual file's path to the byte length its transcoded stream turned out to have.
///
/// Written by a transcode session when it observes end-of-stream. Two sessions over the same
/// file race benignly: the last one to finish wins, and both observed the same encoder output.
#[derive(Default)]
pub struct SizeCache {
    map: scc::HashMap<PathBuf, u64>,
}

impl SizeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the observed size for `identity`, replacing any earlier observation.
    pub fn publish(&self, identity: &Path, size: u64) {
        match self.map.entry_sync(identity.to_path_buf()) {
            scc::hash_map::Entry::Occupied(mut occ) => {
                *occ.get_mut() = size;
            }
            scc::hash_map::Entry::Vacant(vac) => {
                vac.insert_entry(size);
            }
        }
    }

    /// The observed size for `identity`, if a transcode of it has completed.
    #[must_use]
    pub fn get(&self, identity: &Path) -> Option<u64> {
        self.map.read_sync(identity, |_, &size| size)
    }

    /// Number of files with a known size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if no transcode has completed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

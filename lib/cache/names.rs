//! Virtual-to-real path mapping.

use std::path::{Path, PathBuf};

/// Maps a renamed virtual path back to the real file it was derived from.
///
/// Entries are only ever added, and only by directory listing. The first registration for a key
/// wins; later registrations of the same key are no-ops, which makes repeated listings of the
/// same directory idempotent.
#[derive(Default)]
pub struct NameMap {
    map: scc::HashMap<PathBuf, PathBuf>,
}

impl NameMap {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `virtual_path` is served from `source`.
    ///
    /// Returns `true` if this call created the mapping, `false` if one already existed.
    pub fn register(&self, virtual_path: PathBuf, source: PathBuf) -> bool {
        self.map.insert_sync(virtual_path, source).is_ok()
    }

    /// The real source path behind `virtual_path`, if one was registered.
    #[must_use]
    pub fn resolve(&self, virtual_path: &Path) -> Option<PathBuf> {
        self.map.read_sync(virtual_path, |_, source| source.clone())
    }

    /// Number of registered mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_resolve() {
        let names = NameMap::new();
        assert!(names.register("/music/a.ogg".into(), "/music/a.mp3".into()));
        assert_eq!(
            names.resolve(Path::new("/music/a.ogg")),
            Some(PathBuf::from("/music/a.mp3"))
        );
    }

    #[test]
    fn second_registration_keeps_first_source() {
        let names = NameMap::new();
        assert!(names.register("/music/a.ogg".into(), "/music/a.mp3".into()));
        assert!(
            !names.register("/music/a.ogg".into(), "/music/a.wav".into()),
            "second registration should be a no-op"
        );
        assert_eq!(
            names.resolve(Path::new("/music/a.ogg")),
            Some(PathBuf::from("/music/a.mp3"))
        );
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn resolve_unknown_is_none() {
        let names = NameMap::new();
        assert!(names.is_empty());
        assert_eq!(names.resolve(Path::new("/music/missing.ogg")), None);
    }
}

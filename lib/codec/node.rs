//! The virtual node hierarchy over a real source tree.
//!
//! Three kinds of node exist. [`Node::Root`] is fabricated and contains a single category
//! directory named after the target format. That category directory is the source root, and
//! every [`Node::Directory`] below it is a real directory. A [`Node::File`] is keyed by its
//! *virtual* path: either a real file, or a renamed audio file whose real source is found through
//! the [`NameMap`].

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, trace};

use super::classify;
use super::encoder::Encoder;
use super::error::CodecError;
use super::handle::CodecHandle;
use super::passthrough::PassthroughReader;
use super::session::TranscodeSession;
use crate::cache::{NameMap, SizeCache};
use crate::fs::INodeType;

/// Multiplier applied to a source's size to estimate its transcoded size before the real size
/// is known. Lossy output is normally smaller, so the estimate errs on the large side.
pub const DEFAULT_FABRICATION_FACTOR: u64 = 10;

/// A node in the virtual tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// The mount root.
    Root,
    /// A real directory.
    Directory(PathBuf),
    /// A virtual file, keyed by its virtual path.
    File(PathBuf),
}

impl Node {
    /// The kind of inode this node is presented as.
    #[must_use]
    pub fn kind(&self) -> INodeType {
        match self {
            Self::Root | Self::Directory(_) => INodeType::Directory,
            Self::File(_) => INodeType::File,
        }
    }
}

/// Attributes reported for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    /// File or directory.
    pub kind: INodeType,
    /// Size in bytes. Directories report 0.
    pub size: u64,
    /// Creation time, or modification time where the platform has none.
    pub created: SystemTime,
    /// Last modification time.
    pub modified: SystemTime,
}

impl NodeAttr {
    fn fabricated(kind: INodeType, size: u64, at: SystemTime) -> Self {
        Self {
            kind,
            size,
            created: at,
            modified: at,
        }
    }

    fn from_metadata(kind: INodeType, size: u64, meta: &Metadata, fallback: SystemTime) -> Self {
        let modified = meta.modified().unwrap_or(fallback);
        Self {
            kind,
            size,
            created: meta.created().unwrap_or(modified),
            modified,
        }
    }
}

/// The source tree together with everything needed to present it.
pub struct Catalog {
    source_root: PathBuf,
    category: OsString,
    extension: String,
    encoder: Encoder,
    fabrication_factor: u64,
    names: Arc<NameMap>,
    sizes: Arc<SizeCache>,
    mounted_at: SystemTime,
}

/// `symlink_metadata`, with "does not exist" folded into `None`.
async fn stat(path: &Path) -> Result<Option<Metadata>, CodecError> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Metadata of a regular file at `path`, if one is there.
async fn regular_file(path: &Path) -> Result<Option<Metadata>, CodecError> {
    Ok(stat(path).await?.filter(Metadata::is_file))
}

impl Catalog {
    /// Present `source_root` under a category named after the encoder's output format.
    ///
    /// The virtual extension defaults to the format name.
    pub fn new(source_root: PathBuf, encoder: Encoder) -> Self {
        Self {
            source_root,
            category: OsString::from(encoder.format()),
            extension: encoder.format().to_owned(),
            encoder,
            fabrication_factor: DEFAULT_FABRICATION_FACTOR,
            names: Arc::new(NameMap::new()),
            sizes: Arc::new(SizeCache::new()),
            mounted_at: SystemTime::now(),
        }
    }

    /// Use `extension` (without the dot) for renamed audio files.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Estimate untranscoded sizes as `factor` times the source size.
    #[must_use]
    pub fn with_fabrication_factor(mut self, factor: u64) -> Self {
        self.fabrication_factor = factor;
        self
    }

    /// The real directory presented as the category directory.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Name of the single entry in the root directory.
    #[must_use]
    pub fn category(&self) -> &OsStr {
        &self.category
    }

    /// Virtual-to-real mappings discovered so far.
    #[must_use]
    pub fn names(&self) -> &Arc<NameMap> {
        &self.names
    }

    /// Sizes of completed transcodes.
    #[must_use]
    pub fn sizes(&self) -> &Arc<SizeCache> {
        &self.sizes
    }

    /// The virtual path `path` is presented under if it is audio.
    ///
    /// Only the last extension is replaced. A dot-file such as `.mp3` has no extension and
    /// becomes `.mp3.ogg`.
    #[must_use]
    pub fn renamed(&self, path: &Path) -> PathBuf {
        path.with_extension(&self.extension)
    }

    /// List the children of a directory node, sorted by name.
    ///
    /// Audio files appear under their renamed name. A mapping back to the real file is
    /// registered unless something already exists at the renamed path.
    pub async fn list(&self, node: &Node) -> Result<Vec<(OsString, Node)>, CodecError> {
        let dir = match node {
            Node::Root => {
                return Ok(vec![(
                    self.category.clone(),
                    Node::Directory(self.source_root.clone()),
                )]);
            }
            Node::Directory(dir) => dir,
            Node::File(path) => return Err(CodecError::NotADirectory(path.clone())),
        };

        let mut entries = BTreeMap::new();
        let mut renamed = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                entries.insert(entry.file_name(), Node::Directory(path));
                continue;
            }
            if !file_type.is_file() {
                trace!(path = %path.display(), "skipping special file");
                continue;
            }

            if classify::is_audio(&path).await {
                let virtual_path = self.renamed(&path);
                if virtual_path != path
                    && let Some(name) = virtual_path.file_name().map(OsStr::to_os_string)
                {
                    if stat(&virtual_path).await?.is_none()
                        && self.names.register(virtual_path.clone(), path.clone())
                    {
                        debug!(
                            virtual_path = %virtual_path.display(),
                            source = %path.display(),
                            "registered mapping"
                        );
                    }
                    renamed.push((name, Node::File(virtual_path)));
                    continue;
                }
            }
            entries.insert(entry.file_name(), Node::File(path));
        }

        for (name, node) in renamed {
            entries.entry(name).or_insert(node);
        }

        debug!(dir = %dir.display(), count = entries.len(), "listed");
        Ok(entries.into_iter().collect())
    }

    /// Resolve `name` within a directory node.
    pub async fn resolve(&self, parent: &Node, name: &OsStr) -> Result<Node, CodecError> {
        let dir = match parent {
            Node::Root if name == self.category => {
                return Ok(Node::Directory(self.source_root.clone()));
            }
            Node::Root => return Err(CodecError::NotFound(PathBuf::from(name))),
            Node::Directory(dir) => dir,
            Node::File(path) => return Err(CodecError::NotADirectory(path.clone())),
        };

        let literal = dir.join(name);
        if name == "." || name == ".." || literal.parent() != Some(dir.as_path()) {
            return Err(CodecError::NotFound(literal));
        }

        if let Some(meta) = stat(&literal).await? {
            return if meta.is_dir() {
                Ok(Node::Directory(literal))
            } else if meta.is_file() {
                Ok(Node::File(literal))
            } else {
                Err(CodecError::NotFound(literal))
            };
        }

        match self.names.resolve(&literal) {
            Some(source) if regular_file(&source).await?.is_some() => Ok(Node::File(literal)),
            Some(_) | None => Err(CodecError::NotFound(literal)),
        }
    }

    /// Attributes of the fabricated root directory.
    #[must_use]
    pub fn root_attr(&self) -> NodeAttr {
        NodeAttr::fabricated(INodeType::Directory, 0, self.mounted_at)
    }

    /// Current attributes of `node`.
    ///
    /// For files the size is, in order of preference: the size a completed transcode observed,
    /// the real size of a file that exists at the virtual path, the fabricated estimate for a
    /// mapped source, and otherwise zero. A completed transcode's size is reported even after
    /// its source has gone; timestamps then fall back to mount time.
    pub async fn metadata(&self, node: &Node) -> Result<NodeAttr, CodecError> {
        let path = match node {
            Node::Root => return Ok(self.root_attr()),
            Node::Directory(dir) => {
                let meta = stat(dir)
                    .await?
                    .filter(Metadata::is_dir)
                    .ok_or_else(|| CodecError::NotFound(dir.clone()))?;
                return Ok(NodeAttr::from_metadata(
                    INodeType::Directory,
                    0,
                    &meta,
                    self.mounted_at,
                ));
            }
            Node::File(path) => path,
        };

        let real = regular_file(path).await?;
        let source = self.names.resolve(path);

        if let Some(size) = self.sizes.get(path) {
            let meta = match (real, &source) {
                (Some(meta), _) => Some(meta),
                (None, Some(source)) => regular_file(source).await?,
                (None, None) => None,
            };
            return Ok(match meta {
                Some(meta) => NodeAttr::from_metadata(INodeType::File, size, &meta, self.mounted_at),
                None => NodeAttr::fabricated(INodeType::File, size, self.mounted_at),
            });
        }

        if let Some(meta) = real {
            return Ok(NodeAttr::from_metadata(
                INodeType::File,
                meta.len(),
                &meta,
                self.mounted_at,
            ));
        }

        if let Some(source) = source {
            let meta = regular_file(&source)
                .await?
                .ok_or(CodecError::NotFound(source))?;
            let size = meta.len().saturating_mul(self.fabrication_factor);
            return Ok(NodeAttr::from_metadata(INodeType::File, size, &meta, self.mounted_at));
        }

        Ok(NodeAttr::fabricated(INodeType::File, 0, self.mounted_at))
    }

    /// Open a file node.
    ///
    /// A real file at the virtual path is read directly. Otherwise the mapped source is handed
    /// to the encoder and its output is served through a fresh [`TranscodeSession`].
    pub async fn open(&self, node: &Node) -> Result<CodecHandle, CodecError> {
        let path = match node {
            Node::Root => return Err(CodecError::IsADirectory(PathBuf::from("/"))),
            Node::Directory(dir) => return Err(CodecError::IsADirectory(dir.clone())),
            Node::File(path) => path,
        };

        if regular_file(path).await?.is_some() {
            debug!(path = %path.display(), "passthrough");
            return Ok(CodecHandle::Passthrough(PassthroughReader::open(path).await?));
        }

        let source = self
            .names
            .resolve(path)
            .ok_or_else(|| CodecError::NotFound(path.clone()))?;
        let process = self.encoder.spawn(&source)?;
        Ok(CodecHandle::Transcode(TranscodeSession::new(
            path.clone(),
            source,
            process,
            Arc::clone(&self.sizes),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(PathBuf::from("/music"), Encoder::ffmpeg("ogg"))
    }

    #[test]
    fn renaming_replaces_the_last_extension() {
        let cat = catalog();
        assert_eq!(
            cat.renamed(Path::new("/music/a.b.mp3")),
            PathBuf::from("/music/a.b.ogg")
        );
        assert_eq!(
            cat.renamed(Path::new("/music/track")),
            PathBuf::from("/music/track.ogg")
        );
        assert_eq!(
            cat.renamed(Path::new("/music/done.ogg")),
            PathBuf::from("/music/done.ogg")
        );
        assert_eq!(
            cat.renamed(Path::new("/music/.mp3")),
            PathBuf::from("/music/.mp3.ogg"),
            "a dot-file keeps its whole name as the stem"
        );
    }

    #[test]
    fn custom_extension() {
        let cat = catalog().with_extension("oga");
        assert_eq!(cat.renamed(Path::new("/x/a.wav")), PathBuf::from("/x/a.oga"));
        assert_eq!(cat.category(), OsStr::new("ogg"));
    }

    #[tokio::test]
    async fn root_lists_only_the_category() {
        let cat = catalog();
        let listing = cat.list(&Node::Root).await.unwrap();
        assert_eq!(
            listing,
            vec![(OsString::from("ogg"), Node::Directory(PathBuf::from("/music")))]
        );
    }

    #[tokio::test]
    async fn root_resolves_only_the_category() {
        let cat = catalog();
        assert_eq!(
            cat.resolve(&Node::Root, OsStr::new("ogg")).await.unwrap(),
            Node::Directory(PathBuf::from("/music"))
        );
        assert!(matches!(
            cat.resolve(&Node::Root, OsStr::new("mp3")).await,
            Err(CodecError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn file_nodes_are_not_directories() {
        let cat = catalog();
        let file = Node::File(PathBuf::from("/music/a.ogg"));
        assert!(matches!(cat.list(&file).await, Err(CodecError::NotADirectory(_))));
        assert!(matches!(
            cat.open(&Node::Root).await,
            Err(CodecError::IsADirectory(_))
        ));
    }
}

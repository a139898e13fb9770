//! Async `INode` table and open-file table which support concurrent access.

use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::{debug, error};

use crate::fs::{AsyncFsStats, DirEntry, FileHandle, INode, INodeType, InodeAddr, OpenFlags};

/// A reader for an open file, returned by [`FsDataProvider::open`].
///
/// Implementors provide the actual data for read operations. [`AsyncFs::release`] calls
/// [`close`](Self::close) to release resources explicitly.
pub trait FileReader: Send + Sync + 'static {
    /// Read up to `size` bytes starting at byte `offset`.
    ///
    /// Returning fewer bytes than requested is not an error. An empty result means there is
    /// nothing at or past `offset`.
    fn read(
        &self,
        offset: u64,
        size: u32,
    ) -> impl Future<Output = Result<Bytes, std::io::Error>> + Send;

    /// Release any resources held by this reader.
    ///
    /// The default implementation is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), std::io::Error>> + Send {
        async { Ok(()) }
    }
}

/// A data provider for [`AsyncFs`].
///
/// The provider owns the meaning of every inode; [`AsyncFs`] only remembers the last attributes
/// it was handed and tracks open handles.
pub trait FsDataProvider: Clone + Send + Sync + 'static {
    /// The reader type returned by [`open`](Self::open).
    type Reader: FileReader;

    /// Look up a child inode by name within the given parent directory.
    fn lookup(
        &self,
        parent: INode,
        name: &OsStr,
    ) -> impl Future<Output = Result<INode, std::io::Error>> + Send;

    /// List all children of a directory.
    ///
    /// Called on every [`AsyncFs::readdir`]; listings are never served from a cache because
    /// listing has side effects the provider relies on.
    fn readdir(
        &self,
        parent: INode,
    ) -> impl Future<Output = Result<Vec<(OsString, INode)>, std::io::Error>> + Send;

    /// Re-read the attributes of an inode.
    ///
    /// Attributes can change while an inode is loaded (a file's size, for instance), so
    /// [`AsyncFs::getattr`] always asks the provider.
    fn getattr(&self, inode: INode) -> impl Future<Output = Result<INode, std::io::Error>> + Send;

    /// Open a file and return a reader for subsequent read calls.
    fn open(
        &self,
        inode: INode,
        flags: OpenFlags,
    ) -> impl Future<Output = Result<Self::Reader, std::io::Error>> + Send;
}

/// An asynchronous filesystem front over an [`FsDataProvider`].
///
/// Holds two concurrent tables:
/// - `inode_table` maps an address to the last attributes seen for it. An address has to be
///   loaded (by lookup or readdir) before the kernel may use it.
/// - `open_files` maps a file handle to the reader backing it.
///
/// Every method takes `&self`, so a single instance can serve many requests at once.
///
/// **Known limitation:** `inode_table` grows monotonically. Addresses are stable for the life of
/// the mount, so `forget` never evicts anything.
pub struct AsyncFs<DP: FsDataProvider> {
    /// Canonical addr -> `INode` map.
    inode_table: scc::HashMap<InodeAddr, INode>,

    /// Readers for every handle the kernel currently holds.
    open_files: scc::HashMap<FileHandle, Arc<DP::Reader>>,

    /// The data provider every request is delegated to.
    data_provider: DP,

    /// Monotonically increasing file handle counter. Starts at 1 (0 is reserved).
    next_fh: AtomicU64,
}

impl<DP: FsDataProvider> AsyncFs<DP> {
    /// Create a new `AsyncFs`, seeding the root inode into the table.
    #[must_use]
    pub fn new(data_provider: DP, root: INode) -> Self {
        let inode_table = scc::HashMap::new();
        let _ = inode_table.insert_sync(root.addr, root);

        Self {
            inode_table,
            open_files: scc::HashMap::new(),
            data_provider,
            next_fh: AtomicU64::new(1),
        }
    }

    /// The data provider backing this filesystem.
    #[must_use]
    pub fn data_provider(&self) -> &DP {
        &self.data_provider
    }

    /// Get the total number of inodes currently stored in the inode table.
    #[must_use]
    pub fn inode_count(&self) -> usize {
        self.inode_table.len()
    }

    /// Get the number of file handles currently open.
    #[must_use]
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }

    /// Return filesystem statistics.
    ///
    /// Reports the current inode count from the table. Block-related fields default to values
    /// appropriate for a virtual read-only filesystem (4 KiB blocks, no free space).
    #[must_use]
    pub fn statfs(&self) -> AsyncFsStats {
        AsyncFsStats {
            block_size: 4096,
            total_blocks: 0,
            free_blocks: 0,
            available_blocks: 0,
            total_inodes: self.inode_count() as u64,
            free_inodes: 0,
            max_filename_length: 255,
        }
    }

    /// Retrieve an inode that is expected to already be loaded.
    pub fn loaded_inode(&self, addr: InodeAddr) -> Result<INode, std::io::Error> {
        self.inode_table.read_sync(&addr, |_, inode| *inode).ok_or_else(|| {
            error!(inode = addr, "inode was never loaded");
            std::io::Error::from_raw_os_error(libc::ENOENT)
        })
    }

    /// Record the latest attributes for an inode.
    fn remember(&self, inode: INode) {
        match self.inode_table.entry_sync(inode.addr) {
            scc::hash_map::Entry::Occupied(mut occ) => {
                *occ.get_mut() = inode;
            }
            scc::hash_map::Entry::Vacant(vac) => {
                vac.insert_entry(inode);
            }
        }
    }

    /// Look up `name` within the directory at `parent`.
    pub async fn lookup(&self, parent: InodeAddr, name: &OsStr) -> Result<INode, std::io::Error> {
        let parent_inode = self.loaded_inode(parent)?;
        if parent_inode.itype != INodeType::Directory {
            return Err(std::io::Error::from_raw_os_error(libc::ENOTDIR));
        }

        let child = self.data_provider.lookup(parent_inode, name).await?;
        self.remember(child);
        Ok(child)
    }

    /// Return fresh attributes for the inode at `addr`.
    pub async fn getattr(&self, addr: InodeAddr) -> Result<INode, std::io::Error> {
        let inode = self.loaded_inode(addr)?;
        let fresh = self.data_provider.getattr(inode).await?;
        self.remember(fresh);
        Ok(fresh)
    }

    /// Iterate directory entries for `parent`, starting after the first `offset` entries.
    ///
    /// The listing is fetched from the data provider on every call. For each entry, `filler` is
    /// called with the [`DirEntry`] and the offset of the entry that follows it. If `filler`
    /// returns `true` (indicating the caller's buffer is full), iteration stops early.
    pub async fn readdir(
        &self,
        parent: InodeAddr,
        offset: u64,
        mut filler: impl FnMut(DirEntry, u64) -> bool,
    ) -> Result<(), std::io::Error> {
        let parent_inode = self.loaded_inode(parent)?;
        if parent_inode.itype != INodeType::Directory {
            return Err(std::io::Error::from_raw_os_error(libc::ENOTDIR));
        }

        let children = self.data_provider.readdir(parent_inode).await?;
        for (idx, (name, inode)) in children.into_iter().enumerate() {
            self.remember(inode);
            let next_offset = idx as u64 + 1;
            if next_offset <= offset {
                continue;
            }
            if filler(DirEntry { name, inode }, next_offset) {
                break;
            }
        }

        Ok(())
    }

    /// Open a file for reading.
    ///
    /// Rejects directories and any request for write access, then delegates to the data
    /// provider. The returned handle stays valid until [`release`](Self::release).
    pub async fn open(
        &self,
        addr: InodeAddr,
        flags: OpenFlags,
    ) -> Result<FileHandle, std::io::Error> {
        let inode = self.loaded_inode(addr)?;
        if inode.itype == INodeType::Directory {
            return Err(std::io::Error::from_raw_os_error(libc::EISDIR));
        }
        if flags.wants_write() {
            return Err(std::io::Error::from_raw_os_error(libc::EROFS));
        }

        let reader = self.data_provider.open(inode, flags).await?;
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        let _ = self.open_files.insert_sync(fh, Arc::new(reader));
        debug!(fh, inode = addr, "opened");
        Ok(fh)
    }

    /// Read up to `size` bytes at `offset` from an open handle.
    pub async fn read(
        &self,
        fh: FileHandle,
        offset: u64,
        size: u32,
    ) -> Result<Bytes, std::io::Error> {
        let reader = self
            .open_files
            .read_sync(&fh, |_, reader| Arc::clone(reader))
            .ok_or_else(|| std::io::Error::from_raw_os_error(libc::EBADF))?;
        reader.read(offset, size).await
    }

    /// Close an open handle, releasing the reader behind it.
    ///
    /// The handle is forgotten even if closing the reader fails.
    pub async fn release(&self, fh: FileHandle) -> Result<(), std::io::Error> {
        let (_, reader) = self
            .open_files
            .remove_sync(&fh)
            .ok_or_else(|| std::io::Error::from_raw_os_error(libc::EBADF))?;
        reader.close().await
    }
}

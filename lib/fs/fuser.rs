//! FUSE adapter: maps [`fuser::Filesystem`] callbacks to [`AsyncFs`].

use std::ffi::OsStr;
use std::sync::Arc;

use super::async_fs::{AsyncFs, FsDataProvider};
use super::{INode, INodeType, OpenFlags};
use tracing::{debug, error, instrument};

/// Convert an I/O error to the corresponding errno value for FUSE replies.
#[expect(
    clippy::wildcard_enum_match_arm,
    reason = "ErrorKind is non_exhaustive; EIO is the safe default"
)]
pub(crate) fn io_to_errno(e: &std::io::Error) -> i32 {
    e.raw_os_error().unwrap_or_else(|| match e.kind() {
        std::io::ErrorKind::NotFound => libc::ENOENT,
        std::io::ErrorKind::PermissionDenied => libc::EACCES,
        std::io::ErrorKind::NotADirectory => libc::ENOTDIR,
        std::io::ErrorKind::IsADirectory => libc::EISDIR,
        std::io::ErrorKind::ReadOnlyFilesystem => libc::EROFS,
        _ => libc::EIO,
    })
}

/// Trait abstracting the `.error(errno)` method common to all fuser reply types.
trait FuseReply {
    fn error(self, errno: i32);
}

macro_rules! impl_fuse_reply {
    ($($ty:ty),* $(,)?) => {
        $(impl FuseReply for $ty {
            fn error(self, errno: i32) {
                // Calls the inherent fuser method (not this trait method).
                self.error(errno);
            }
        })*
    };
}

// ReplyDirectory and ReplyStatfs are excluded: readdir and statfs
// do not follow the result -> fuse_reply pattern.
impl_fuse_reply!(
    fuser::ReplyEntry,
    fuser::ReplyAttr,
    fuser::ReplyOpen,
    fuser::ReplyData,
    fuser::ReplyEmpty,
);

/// Extension trait on `Result<T, std::io::Error>` for FUSE reply handling.
///
/// Centralizes the error-logging + errno-reply path so each FUSE callback
/// only has to express its success path.
trait FuseResultExt<T> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R));
}

impl<T> FuseResultExt<T> for Result<T, std::io::Error> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R)) {
        match self {
            Ok(val) => on_ok(val, reply),
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(io_to_errno(&e));
            }
        }
    }
}

/// Convert an `INode` to the fuser-specific `FileAttr`.
fn inode_to_fuser_attr(inode: &INode, block_size: u32) -> fuser::FileAttr {
    fuser::FileAttr {
        ino: inode.addr,
        size: inode.size,
        blocks: inode.size.div_ceil(512),
        atime: inode.last_modified_at,
        mtime: inode.last_modified_at,
        ctime: inode.last_modified_at,
        crtime: inode.create_time,
        kind: inode_type_to_fuser(inode.itype),
        perm: inode.permissions.bits(),
        nlink: 1,
        uid: inode.uid,
        gid: inode.gid,
        rdev: 0,
        blksize: block_size,
        flags: 0,
    }
}

fn inode_type_to_fuser(itype: INodeType) -> fuser::FileType {
    match itype {
        INodeType::Directory => fuser::FileType::Directory,
        INodeType::File => fuser::FileType::RegularFile,
    }
}

const BLOCK_SIZE: u32 = 4096;

/// Bridges a generic [`FsDataProvider`] to the [`fuser::Filesystem`] trait.
///
/// Metadata callbacks block on the runtime. `open`, `read` and `release` may wait on an encoder
/// process, so they are spawned onto the runtime instead and reply from there, leaving the FUSE
/// session loop free to serve other handles in the meantime.
pub struct FuserAdapter<DP: FsDataProvider> {
    fs: Arc<AsyncFs<DP>>,
    runtime: tokio::runtime::Handle,
}

impl<DP: FsDataProvider> FuserAdapter<DP> {
    // TODO: a higher TTL paired with notify_inval_inode once a transcode publishes its size
    // would save the kernel a getattr round trip per stat.
    const SHAMEFUL_TTL: std::time::Duration = std::time::Duration::from_secs(1);

    /// Create a new adapter over `fs`, driving async work on `runtime`.
    pub fn new(fs: Arc<AsyncFs<DP>>, runtime: tokio::runtime::Handle) -> Self {
        Self { fs, runtime }
    }
}

impl<DP: FsDataProvider> fuser::Filesystem for FuserAdapter<DP> {
    #[instrument(name = "FuserAdapter::lookup", skip(self, _req, reply))]
    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        self.runtime
            .block_on(self.fs.lookup(parent, name))
            .fuse_reply(reply, |inode, reply| {
                let f_attr = inode_to_fuser_attr(&inode, BLOCK_SIZE);
                debug!(?f_attr, "replying...");
                reply.entry(&Self::SHAMEFUL_TTL, &f_attr, 0);
            });
    }

    #[instrument(name = "FuserAdapter::getattr", skip(self, _req, _fh, reply))]
    fn getattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        self.runtime
            .block_on(self.fs.getattr(ino))
            .fuse_reply(reply, |inode, reply| {
                let attr = inode_to_fuser_attr(&inode, BLOCK_SIZE);
                debug!(?attr, "replying...");
                reply.attr(&Self::SHAMEFUL_TTL, &attr);
            });
    }

    #[instrument(name = "FuserAdapter::readdir", skip(self, _req, _fh, offset, reply))]
    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let result = self
            .runtime
            .block_on(self.fs.readdir(ino, offset.cast_unsigned(), |de, next_offset| {
                let Ok(next): Result<i64, _> = next_offset.try_into() else {
                    error!(next_offset, "directory entry index too large for fuser");
                    return true;
                };
                debug!(name = ?de.name, ino = de.inode.addr, "adding entry to reply...");
                reply.add(de.inode.addr, next, inode_type_to_fuser(de.inode.itype), &de.name)
            }));

        match result {
            Ok(()) => {
                debug!("finalizing reply...");
                reply.ok();
            }
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(io_to_errno(&e));
            }
        }
    }

    #[instrument(name = "FuserAdapter::open", skip(self, _req, flags, reply))]
    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, flags: i32, reply: fuser::ReplyOpen) {
        let flags = OpenFlags::from_bits_truncate(flags);
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            fs.open(ino, flags).await.fuse_reply(reply, |fh, reply| {
                debug!(handle = fh, "replying...");
                reply.opened(fh, 0);
            });
        });
    }

    #[instrument(
        name = "FuserAdapter::read",
        skip(self, _req, _ino, offset, size, _flags, _lock_owner, reply)
    )]
    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            fs.read(fh, offset, size).await.fuse_reply(reply, |data, reply| {
                debug!(read_bytes = data.len(), "replying...");
                reply.data(&data);
            });
        });
    }

    #[instrument(
        name = "FuserAdapter::release",
        skip(self, _req, _ino, _flags, _lock_owner, _flush, reply)
    )]
    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            fs.release(fh).await.fuse_reply(reply, |(), reply| {
                debug!("replying ok");
                reply.ok();
            });
        });
    }

    #[instrument(name = "FuserAdapter::statfs", skip(self, _req, _ino, reply))]
    fn statfs(&mut self, _req: &fuser::Request<'_>, _ino: u64, reply: fuser::ReplyStatfs) {
        let stats = self.fs.statfs();
        debug!(?stats, "replying...");
        reply.statfs(
            stats.total_blocks,
            stats.free_blocks,
            stats.available_blocks,
            stats.total_inodes,
            stats.free_inodes,
            stats.block_size,
            stats.max_filename_length,
            0,
        );
    }
}

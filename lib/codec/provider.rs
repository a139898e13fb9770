//! [`FsDataProvider`] implementation over a [`Catalog`].

use std::ffi::{OsStr, OsString};
use std::sync::Arc;

use tracing::{instrument, trace, warn};

use super::error::CodecError;
use super::handle::CodecHandle;
use super::node::{Catalog, Node, NodeAttr};
use crate::fs::table::AddrTable;
use crate::fs::{FsDataProvider, INode, InodePerms, InodeAddr, OpenFlags};

/// Inode address of the mount root.
pub const ROOT_ADDR: InodeAddr = 1;

struct ProviderInner {
    catalog: Catalog,
    nodes: AddrTable<Node>,
    uid: u32,
    gid: u32,
}

/// Serves a [`Catalog`] to [`AsyncFs`](crate::fs::AsyncFs).
///
/// Every node gets one inode address, allocated the first time it is seen and kept for the life
/// of the provider. The root is pinned to [`ROOT_ADDR`] and the category directory takes the
/// address right after it.
#[derive(Clone)]
pub struct CodecProvider {
    inner: Arc<ProviderInner>,
}

impl CodecProvider {
    /// Create a provider whose inodes are owned by `uid`/`gid`.
    #[must_use]
    pub fn new(catalog: Catalog, uid: u32, gid: u32) -> Self {
        let nodes = AddrTable::new(ROOT_ADDR + 1);
        nodes.insert(ROOT_ADDR, Node::Root);
        nodes.addr_or_insert(Node::Directory(catalog.source_root().to_path_buf()));

        Self {
            inner: Arc::new(ProviderInner {
                catalog,
                nodes,
                uid,
                gid,
            }),
        }
    }

    /// The catalog being served.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// The root inode, for seeding [`AsyncFs`](crate::fs::AsyncFs).
    #[must_use]
    pub fn root_inode(&self) -> INode {
        self.inode(ROOT_ADDR, None, self.inner.catalog.root_attr())
    }

    fn inode(&self, addr: InodeAddr, parent: Option<InodeAddr>, attr: NodeAttr) -> INode {
        INode {
            addr,
            permissions: InodePerms::READ_ONLY,
            uid: self.inner.uid,
            gid: self.inner.gid,
            create_time: attr.created,
            last_modified_at: attr.modified,
            parent,
            size: attr.size,
            itype: attr.kind,
        }
    }

    fn node_of(&self, addr: InodeAddr) -> Result<Node, std::io::Error> {
        self.inner.nodes.key_of(addr).ok_or_else(|| {
            warn!(addr, "no node for inode address");
            std::io::Error::from_raw_os_error(libc::ENOENT)
        })
    }

    async fn child_inode(&self, parent: InodeAddr, node: Node) -> Result<INode, CodecError> {
        let attr = self.inner.catalog.metadata(&node).await?;
        let addr = self.inner.nodes.addr_or_insert(node);
        Ok(self.inode(addr, Some(parent), attr))
    }
}

impl FsDataProvider for CodecProvider {
    type Reader = CodecHandle;

    #[instrument(name = "CodecProvider::lookup", skip(self, parent), fields(parent = parent.addr))]
    async fn lookup(&self, parent: INode, name: &OsStr) -> Result<INode, std::io::Error> {
        let parent_node = self.node_of(parent.addr)?;
        let child = self.inner.catalog.resolve(&parent_node, name).await?;
        Ok(self.child_inode(parent.addr, child).await?)
    }

    #[instrument(name = "CodecProvider::readdir", skip(self, parent), fields(parent = parent.addr))]
    async fn readdir(&self, parent: INode) -> Result<Vec<(OsString, INode)>, std::io::Error> {
        let parent_node = self.node_of(parent.addr)?;
        let children = self.inner.catalog.list(&parent_node).await?;

        let mut entries = Vec::with_capacity(children.len());
        for (name, node) in children {
            match self.child_inode(parent.addr, node).await {
                Ok(inode) => entries.push((name, inode)),
                Err(e) => warn!(?name, error = %e, "skipping entry with unreadable metadata"),
            }
        }
        trace!(count = entries.len(), "readdir");
        Ok(entries)
    }

    async fn getattr(&self, inode: INode) -> Result<INode, std::io::Error> {
        let node = self.node_of(inode.addr)?;
        let attr = self.inner.catalog.metadata(&node).await?;
        Ok(self.inode(inode.addr, inode.parent, attr))
    }

    #[instrument(name = "CodecProvider::open", skip(self, inode, _flags), fields(ino = inode.addr))]
    async fn open(&self, inode: INode, _flags: OpenFlags) -> Result<CodecHandle, std::io::Error> {
        let node = self.node_of(inode.addr)?;
        Ok(self.inner.catalog.open(&node).await?)
    }
}

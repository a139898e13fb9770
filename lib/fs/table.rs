//! Stable inode address allocation.
//!
//! [`AddrTable`] hands out one inode address per distinct key and remembers the pairing in both
//! directions, using two [`scc::HashMap`]s guarded by a coordination lock for cross-map
//! atomicity.

use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::fs::InodeAddr;

/// Bidirectional mapping between inode addresses and the keys they were allocated for.
///
/// Reads are lock-free. Mutations that touch both maps are serialized by a `Mutex<()>` so that a
/// key can never end up with two addresses. Addresses are never reused.
pub struct AddrTable<K> {
    /// addr -> key
    fwd: scc::HashMap<InodeAddr, K>,
    /// key -> addr
    bwd: scc::HashMap<K, InodeAddr>,
    /// Next address handed out by [`addr_or_insert`](Self::addr_or_insert).
    next: AtomicU64,
    /// Serializes mutations that touch both maps.
    mu: Mutex<()>,
}

impl<K: Eq + Hash + Clone> AddrTable<K> {
    /// Creates an empty table whose first allocated address is `first_free`.
    #[must_use]
    pub fn new(first_free: InodeAddr) -> Self {
        Self {
            fwd: scc::HashMap::new(),
            bwd: scc::HashMap::new(),
            next: AtomicU64::new(first_free),
            mu: Mutex::new(()),
        }
    }

    /// Pin `key` to a caller-chosen address, e.g. the root inode.
    ///
    /// Serialized with other mutations via the coordination lock.
    pub fn insert(&self, addr: InodeAddr, key: K) {
        let _guard = self
            .mu
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let _ = self.fwd.insert_sync(addr, key.clone());
        let _ = self.bwd.insert_sync(key, addr);
    }

    /// Resolve addr -> key.
    #[must_use]
    pub fn key_of(&self, addr: InodeAddr) -> Option<K> {
        self.fwd.read_sync(&addr, |_, key| key.clone())
    }

    /// Resolve key -> addr.
    #[must_use]
    pub fn addr_of(&self, key: &K) -> Option<InodeAddr> {
        self.bwd.read_sync(key, |_, &addr| addr)
    }

    /// Look up the address for `key`, allocating a fresh one if it has none yet.
    ///
    /// Serialized with other mutations via the coordination lock.
    pub fn addr_or_insert(&self, key: K) -> InodeAddr {
        if let Some(addr) = self.addr_of(&key) {
            return addr;
        }

        let _guard = self
            .mu
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match self.bwd.entry_sync(key.clone()) {
            scc::hash_map::Entry::Occupied(occ) => *occ.get(),
            scc::hash_map::Entry::Vacant(vac) => {
                let addr = self.next.fetch_add(1, Ordering::Relaxed);
                let _ = self.fwd.insert_sync(addr, key);
                vac.insert_entry(addr);
                addr
            }
        }
    }

    /// Number of addresses handed out so far, including pinned ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fwd.len()
    }

    /// Returns `true` if no address has been handed out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fwd.is_empty()
    }
}

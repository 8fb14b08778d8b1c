//! Shared content-addressed node cache.
//!
//! The store is shared by every tree synchronization in the process:
//! nodes accepted by one acquisition short-circuit requests made by
//! another, and other subsystems read reconstructed trees out of it.
//! Implementations must be safe for concurrent readers and writers from
//! any worker thread.

use bytes::Bytes;
use parking_lot::RwLock;
use rill_common::Hash256;
use std::collections::HashMap;

/// Content-addressed byte cache.
///
/// Keys are content digests, so an entry can never change meaning:
/// `put` with an existing key is a harmless overwrite of identical data.
pub trait NodeStore: Send + Sync {
    /// Look up the bytes stored under `hash`.
    fn get(&self, hash: &Hash256) -> Option<Bytes>;

    /// Record `data` under `hash`.
    fn put(&self, hash: Hash256, data: Bytes);
}

/// In-memory [`NodeStore`] backed by a hash map.
#[derive(Default)]
pub struct MemoryNodeStore {
    entries: RwLock<HashMap<Hash256, Bytes>>,
}

impl MemoryNodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether `hash` is cached.
    pub fn contains(&self, hash: &Hash256) -> bool {
        self.entries.read().contains_key(hash)
    }
}

impl NodeStore for MemoryNodeStore {
    fn get(&self, hash: &Hash256) -> Option<Bytes> {
        self.entries.read().get(hash).cloned()
    }

    fn put(&self, hash: Hash256, data: Bytes) {
        self.entries.write().insert(hash, data);
    }
}

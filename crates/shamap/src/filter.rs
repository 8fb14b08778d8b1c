//! Synchronization filters.
//!
//! A filter sits between a syncing tree and the rest of the node: every
//! accepted node is reported through [`NodeFilter::got_node`], and before
//! a missing node is requested from the network the tree asks
//! [`NodeFilter::have_node`] whether the bytes are already available
//! locally.

use crate::node_id::NodeId;
use crate::store::NodeStore;
use bytes::Bytes;
use rill_common::Hash256;

/// Hook invoked as a syncing tree accepts and looks for nodes.
pub trait NodeFilter {
    /// Return the bytes for `hash` if they are available locally.
    fn have_node(&self, id: &NodeId, hash: &Hash256) -> Option<Bytes>;

    /// Record an accepted node.
    fn got_node(&self, id: &NodeId, hash: &Hash256, data: &[u8]);
}

/// Filter that reads and writes the shared [`NodeStore`].
pub struct StoreFilter<'a> {
    store: &'a dyn NodeStore,
}

impl<'a> StoreFilter<'a> {
    /// Create a filter over `store`.
    pub fn new(store: &'a dyn NodeStore) -> Self {
        Self { store }
    }
}

impl NodeFilter for StoreFilter<'_> {
    fn have_node(&self, _id: &NodeId, hash: &Hash256) -> Option<Bytes> {
        self.store.get(hash)
    }

    fn got_node(&self, _id: &NodeId, hash: &Hash256, data: &[u8]) {
        self.store.put(*hash, Bytes::copy_from_slice(data));
    }
}

/// Filter that caches nothing and short-circuits nothing.
#[derive(Default)]
pub struct NullFilter;

impl NodeFilter for NullFilter {
    fn have_node(&self, _id: &NodeId, _hash: &Hash256) -> Option<Bytes> {
        None
    }

    fn got_node(&self, _id: &NodeId, _hash: &Hash256, _data: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryNodeStore;

    #[test]
    fn test_store_filter_round_trip() {
        let store = MemoryNodeStore::new();
        let filter = StoreFilter::new(&store);
        let id = NodeId::root().child(3);
        let hash = Hash256::digest(b"blob");

        assert!(filter.have_node(&id, &hash).is_none());
        filter.got_node(&id, &hash, b"blob");
        assert_eq!(filter.have_node(&id, &hash).unwrap().as_ref(), b"blob");
    }

    #[test]
    fn test_null_filter() {
        let filter = NullFilter;
        let hash = Hash256::digest(b"blob");
        filter.got_node(&NodeId::root(), &hash, b"blob");
        assert!(filter.have_node(&NodeId::root(), &hash).is_none());
    }
}

//! Partial tree assembly.
//!
//! A [`ShaMap`] being synchronized holds whatever subset of a tree has
//! been verified so far. Nodes are indexed by [`NodeId`]; a node is
//! installed only after its bytes hash to the digest declared by its
//! parent (or, for the root, by the ledger header). The map never
//! contains an unverified byte.

use crate::error::{Result, ShaMapError};
use crate::filter::NodeFilter;
use crate::node::TreeNode;
use crate::node_id::NodeId;
use rill_common::Hash256;
use std::collections::HashMap;
use tracing::trace;

/// A content-addressed tree assembled out of order from network data.
#[derive(Default)]
pub struct ShaMap {
    nodes: HashMap<NodeId, (Hash256, TreeNode)>,
    root_hash: Option<Hash256>,
}

impl ShaMap {
    /// Create an empty syncing tree with no root installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest of the installed root, or `None` before the root arrives.
    pub fn root_hash(&self) -> Option<Hash256> {
        self.root_hash
    }

    /// Number of installed nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Install the root node.
    ///
    /// `expected` is the root digest the ledger header declares. Success
    /// without effect if a root is already installed; rejection if the
    /// bytes do not hash to `expected` or do not parse.
    pub fn add_root_node(&mut self, expected: Hash256, data: &[u8]) -> Result<()> {
        if self.root_hash.is_some() {
            return Ok(());
        }
        let digest = Hash256::digest(data);
        if digest != expected {
            return Err(ShaMapError::DigestMismatch {
                expected: expected.to_hex(),
                actual: digest.to_hex(),
            });
        }
        let node = TreeNode::from_bytes(data)?;
        trace!("installed tree root {}", digest);
        self.nodes.insert(NodeId::root(), (digest, node));
        self.root_hash = Some(digest);
        Ok(())
    }

    /// Install a non-root node whose digest its parent already declared.
    ///
    /// The parent must be installed and must declare a child at this
    /// branch; the bytes must hash to that declared digest. Re-feeding an
    /// installed node is success without effect. Accepted nodes are
    /// reported to `filter`.
    pub fn add_known_node(
        &mut self,
        id: &NodeId,
        data: &[u8],
        filter: &dyn NodeFilter,
    ) -> Result<()> {
        let Some(parent_id) = id.parent() else {
            return Err(ShaMapError::InvalidNodeId(
                "root must be installed with add_root_node".to_string(),
            ));
        };
        if self.nodes.contains_key(id) {
            return Ok(());
        }
        let Some((_, parent)) = self.nodes.get(&parent_id) else {
            return Err(ShaMapError::OrphanNode(*id));
        };
        let branch = id.branch_at(id.depth() - 1);
        let Some(expected) = parent.child_digest(branch) else {
            return Err(ShaMapError::EmptyBranch(*id));
        };
        let digest = Hash256::digest(data);
        if digest != expected {
            return Err(ShaMapError::DigestMismatch {
                expected: expected.to_hex(),
                actual: digest.to_hex(),
            });
        }
        let node = TreeNode::from_bytes(data)?;
        self.nodes.insert(*id, (digest, node));
        filter.got_node(id, &digest, data);
        Ok(())
    }

    /// Enumerate up to `limit` nodes that must be fetched next.
    ///
    /// Walks the installed portion of the tree; children whose bytes the
    /// `filter` already has locally are installed on the spot and
    /// descended into instead of being reported. Returns an empty list
    /// when the reachable tree is fully linked (or no root is installed
    /// yet — the root is requested through a separate path).
    pub fn missing_nodes(
        &mut self,
        limit: usize,
        filter: &dyn NodeFilter,
    ) -> Vec<(NodeId, Hash256)> {
        let mut missing = Vec::new();
        if self.root_hash.is_none() || limit == 0 {
            return missing;
        }
        let mut stack = vec![NodeId::root()];
        while let Some(id) = stack.pop() {
            let children = match self.nodes.get(&id) {
                Some((_, TreeNode::Inner { children })) => *children,
                _ => continue,
            };
            for branch in 0..children.len() as u8 {
                let declared = children[branch as usize];
                if declared.is_zero() {
                    continue;
                }
                let child_id = id.child(branch);
                if self.nodes.contains_key(&child_id) {
                    stack.push(child_id);
                    continue;
                }
                if self.install_from_filter(&child_id, &declared, filter) {
                    stack.push(child_id);
                    continue;
                }
                missing.push((child_id, declared));
                if missing.len() >= limit {
                    return missing;
                }
            }
        }
        missing
    }

    /// Try to satisfy a missing child from the filter's local cache.
    fn install_from_filter(
        &mut self,
        id: &NodeId,
        declared: &Hash256,
        filter: &dyn NodeFilter,
    ) -> bool {
        let Some(cached) = filter.have_node(id, declared) else {
            return false;
        };
        if Hash256::digest(&cached) != *declared {
            return false;
        }
        match TreeNode::from_bytes(&cached) {
            Ok(node) => {
                trace!("filled {} from local cache", id);
                self.nodes.insert(*id, (*declared, node));
                true
            }
            Err(_) => false,
        }
    }

    /// Whether the tree is still being assembled.
    ///
    /// True until the root is installed and every declared child of every
    /// reachable inner node is installed.
    pub fn is_synching(&self) -> bool {
        self.root_hash.is_none() || self.first_missing().is_some()
    }

    /// Whether the reachable tree is fully linked from an installed root.
    pub fn is_valid(&self) -> bool {
        self.root_hash.is_some() && self.first_missing().is_none()
    }

    /// Find one reachable-but-absent child, without consulting any cache.
    fn first_missing(&self) -> Option<NodeId> {
        let mut stack = vec![NodeId::root()];
        while let Some(id) = stack.pop() {
            let Some((_, node)) = self.nodes.get(&id) else {
                return Some(id);
            };
            if let TreeNode::Inner { children } = node {
                for branch in 0..children.len() as u8 {
                    if !children[branch as usize].is_zero() {
                        stack.push(id.child(branch));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{NullFilter, StoreFilter};
    use crate::node::BRANCH_COUNT;
    use crate::store::{MemoryNodeStore, NodeStore};
    use bytes::Bytes;

    fn leaf(tag: u8) -> (TreeNode, Vec<u8>, Hash256) {
        let node = TreeNode::Leaf {
            key: Hash256::digest(&[tag]),
            data: vec![tag; 8],
        };
        let bytes = node.to_bytes();
        let digest = Hash256::digest(&bytes);
        (node, bytes, digest)
    }

    fn inner_over(hashes: &[(u8, Hash256)]) -> (TreeNode, Vec<u8>, Hash256) {
        let mut children = [Hash256::ZERO; BRANCH_COUNT];
        for (branch, hash) in hashes {
            children[*branch as usize] = *hash;
        }
        let node = TreeNode::Inner { children };
        let bytes = node.to_bytes();
        let digest = Hash256::digest(&bytes);
        (node, bytes, digest)
    }

    #[test]
    fn test_empty_map_is_synching() {
        let map = ShaMap::new();
        assert!(map.is_synching());
        assert!(!map.is_valid());
        assert_eq!(map.root_hash(), None);
    }

    #[test]
    fn test_single_leaf_tree() {
        let (_, bytes, digest) = leaf(1);
        let mut map = ShaMap::new();
        map.add_root_node(digest, &bytes).unwrap();
        assert!(!map.is_synching());
        assert!(map.is_valid());
        assert_eq!(map.root_hash(), Some(digest));
        assert!(map.missing_nodes(128, &NullFilter).is_empty());
    }

    #[test]
    fn test_add_root_rejects_digest_mismatch() {
        let (_, bytes, _) = leaf(1);
        let mut map = ShaMap::new();
        let err = map.add_root_node(Hash256::digest(b"other"), &bytes);
        assert!(matches!(err, Err(ShaMapError::DigestMismatch { .. })));
        assert!(map.root_hash().is_none());
    }

    #[test]
    fn test_add_root_is_idempotent() {
        let (_, bytes, digest) = leaf(1);
        let mut map = ShaMap::new();
        map.add_root_node(digest, &bytes).unwrap();
        // A second root install is accepted and changes nothing,
        // whatever the declared digest.
        map.add_root_node(Hash256::digest(b"other"), &bytes).unwrap();
        assert_eq!(map.root_hash(), Some(digest));
        assert_eq!(map.node_count(), 1);
    }

    #[test]
    fn test_two_level_assembly() {
        let (_, left_bytes, left_digest) = leaf(1);
        let (_, right_bytes, right_digest) = leaf(2);
        let (_, root_bytes, root_digest) =
            inner_over(&[(0x3, left_digest), (0xc, right_digest)]);

        let mut map = ShaMap::new();
        map.add_root_node(root_digest, &root_bytes).unwrap();
        assert!(map.is_synching());
        assert!(!map.is_valid());

        let missing = map.missing_nodes(128, &NullFilter);
        assert_eq!(missing.len(), 2);
        let branches: Vec<u8> = missing.iter().map(|(id, _)| id.branch_at(0)).collect();
        assert!(branches.contains(&0x3));
        assert!(branches.contains(&0xc));

        map.add_known_node(&NodeId::root().child(0x3), &left_bytes, &NullFilter)
            .unwrap();
        assert!(map.is_synching());
        map.add_known_node(&NodeId::root().child(0xc), &right_bytes, &NullFilter)
            .unwrap();
        assert!(!map.is_synching());
        assert!(map.is_valid());
        assert_eq!(map.node_count(), 3);
    }

    #[test]
    fn test_missing_nodes_respects_limit() {
        let leaves: Vec<(TreeNode, Vec<u8>, Hash256)> = (0..5).map(leaf).collect();
        let children: Vec<(u8, Hash256)> = leaves
            .iter()
            .enumerate()
            .map(|(i, (_, _, digest))| (i as u8, *digest))
            .collect();
        let (_, root_bytes, root_digest) = inner_over(&children);

        let mut map = ShaMap::new();
        map.add_root_node(root_digest, &root_bytes).unwrap();
        assert_eq!(map.missing_nodes(3, &NullFilter).len(), 3);
        assert_eq!(map.missing_nodes(128, &NullFilter).len(), 5);
    }

    #[test]
    fn test_add_known_rejects_orphan() {
        let (_, bytes, _) = leaf(1);
        let mut map = ShaMap::new();
        let err = map.add_known_node(&NodeId::root().child(0), &bytes, &NullFilter);
        assert!(matches!(err, Err(ShaMapError::OrphanNode(_))));
    }

    #[test]
    fn test_add_known_rejects_empty_branch() {
        let (_, leaf_bytes, leaf_digest) = leaf(1);
        let (_, root_bytes, root_digest) = inner_over(&[(0x3, leaf_digest)]);
        let mut map = ShaMap::new();
        map.add_root_node(root_digest, &root_bytes).unwrap();

        let err = map.add_known_node(&NodeId::root().child(0x4), &leaf_bytes, &NullFilter);
        assert!(matches!(err, Err(ShaMapError::EmptyBranch(_))));
    }

    #[test]
    fn test_add_known_rejects_digest_mismatch() {
        let (_, _, leaf_digest) = leaf(1);
        let (_, other_bytes, _) = leaf(2);
        let (_, root_bytes, root_digest) = inner_over(&[(0x3, leaf_digest)]);
        let mut map = ShaMap::new();
        map.add_root_node(root_digest, &root_bytes).unwrap();

        let err = map.add_known_node(&NodeId::root().child(0x3), &other_bytes, &NullFilter);
        assert!(matches!(err, Err(ShaMapError::DigestMismatch { .. })));
        assert!(map.is_synching());
    }

    #[test]
    fn test_add_known_is_idempotent() {
        let (_, leaf_bytes, leaf_digest) = leaf(1);
        let (_, root_bytes, root_digest) = inner_over(&[(0x3, leaf_digest)]);
        let mut map = ShaMap::new();
        map.add_root_node(root_digest, &root_bytes).unwrap();

        let id = NodeId::root().child(0x3);
        map.add_known_node(&id, &leaf_bytes, &NullFilter).unwrap();
        map.add_known_node(&id, &leaf_bytes, &NullFilter).unwrap();
        assert_eq!(map.node_count(), 2);
    }

    #[test]
    fn test_accepted_nodes_reach_the_filter() {
        let store = MemoryNodeStore::new();
        let (_, leaf_bytes, leaf_digest) = leaf(1);
        let (_, root_bytes, root_digest) = inner_over(&[(0x3, leaf_digest)]);
        let mut map = ShaMap::new();
        map.add_root_node(root_digest, &root_bytes).unwrap();

        let filter = StoreFilter::new(&store);
        map.add_known_node(&NodeId::root().child(0x3), &leaf_bytes, &filter)
            .unwrap();
        assert_eq!(store.get(&leaf_digest).unwrap().as_ref(), &leaf_bytes[..]);
    }

    #[test]
    fn test_missing_nodes_short_circuits_through_store() {
        let store = MemoryNodeStore::new();
        let (_, left_bytes, left_digest) = leaf(1);
        let (_, _, right_digest) = leaf(2);
        let (_, root_bytes, root_digest) =
            inner_over(&[(0x0, left_digest), (0x1, right_digest)]);

        // The left leaf is already cached locally.
        store.put(left_digest, Bytes::from(left_bytes));

        let mut map = ShaMap::new();
        map.add_root_node(root_digest, &root_bytes).unwrap();
        let filter = StoreFilter::new(&store);
        let missing = map.missing_nodes(128, &filter);

        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].1, right_digest);
        // The cached leaf was installed during the walk.
        assert_eq!(map.node_count(), 2);
    }
}

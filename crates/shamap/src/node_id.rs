//! Tree-node locators.
//!
//! A [`NodeId`] addresses a node inside one tree by the path taken from
//! the root: one nibble (branch 0-15) per level. The root is the empty
//! path. On the wire a node id is a fixed 33-byte string: the 32 path
//! bytes followed by the depth.

use crate::error::{Result, ShaMapError};
use std::fmt;

/// Maximum tree depth (one nibble of the 256-bit key space per level).
pub const MAX_DEPTH: u8 = 64;

/// Length of the serialized wire form.
pub const RAW_NODE_ID_LEN: usize = 33;

/// Identifies a node inside a tree by its path from the root.
///
/// Path nibbles beyond `depth` are always zero, so ids compare and hash
/// directly on their raw representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    depth: u8,
    path: [u8; 32],
}

impl NodeId {
    /// The root id: the empty path.
    pub fn root() -> Self {
        Self {
            depth: 0,
            path: [0u8; 32],
        }
    }

    /// Whether this is the root id.
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Depth of the node (number of path nibbles).
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// The branch nibble taken at `depth` on the way to this node.
    pub fn branch_at(&self, depth: u8) -> u8 {
        let byte = self.path[depth as usize / 2];
        if depth % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0f
        }
    }

    /// The id of the child reached through `branch`.
    ///
    /// # Panics
    ///
    /// Panics if `branch` is not a nibble or the node is already at
    /// [`MAX_DEPTH`]; callers iterate branches of an inner node, which
    /// cannot sit at the bottom of the tree.
    pub fn child(&self, branch: u8) -> NodeId {
        assert!(branch < 16, "branch {branch} out of range");
        assert!(self.depth < MAX_DEPTH, "node at maximum depth has no children");
        let mut path = self.path;
        let idx = self.depth as usize / 2;
        if self.depth % 2 == 0 {
            path[idx] |= branch << 4;
        } else {
            path[idx] |= branch;
        }
        NodeId {
            depth: self.depth + 1,
            path,
        }
    }

    /// The id of this node's parent, or `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        if self.depth == 0 {
            return None;
        }
        let depth = self.depth - 1;
        let mut path = self.path;
        let idx = depth as usize / 2;
        if depth % 2 == 0 {
            path[idx] &= 0x0f;
        } else {
            path[idx] &= 0xf0;
        }
        Some(NodeId { depth, path })
    }

    /// Serialize to the 33-byte wire form.
    pub fn to_raw(&self) -> [u8; RAW_NODE_ID_LEN] {
        let mut raw = [0u8; RAW_NODE_ID_LEN];
        raw[..32].copy_from_slice(&self.path);
        raw[32] = self.depth;
        raw
    }

    /// Parse the 33-byte wire form.
    ///
    /// Rejects bad lengths, depths beyond [`MAX_DEPTH`], and paths with
    /// nonzero nibbles past the declared depth (two distinct encodings
    /// must never address the same node).
    pub fn from_raw(raw: &[u8]) -> Result<NodeId> {
        if raw.len() != RAW_NODE_ID_LEN {
            return Err(ShaMapError::InvalidNodeId(format!(
                "expected {} bytes, got {}",
                RAW_NODE_ID_LEN,
                raw.len()
            )));
        }
        let depth = raw[32];
        if depth > MAX_DEPTH {
            return Err(ShaMapError::InvalidNodeId(format!(
                "depth {depth} exceeds maximum {MAX_DEPTH}"
            )));
        }
        let mut path = [0u8; 32];
        path.copy_from_slice(&raw[..32]);

        let mut canonical = path;
        for nibble in depth..MAX_DEPTH {
            let idx = nibble as usize / 2;
            if nibble % 2 == 0 {
                canonical[idx] &= 0x0f;
            } else {
                canonical[idx] &= 0xf0;
            }
        }
        if canonical != path {
            return Err(ShaMapError::InvalidNodeId(
                "nonzero path nibbles beyond declared depth".to_string(),
            ));
        }
        Ok(NodeId { depth, path })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "root");
        }
        write!(f, "depth {}, path ", self.depth)?;
        for nibble in 0..self.depth {
            write!(f, "{:x}", self.branch_at(nibble))?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root() {
        let root = NodeId::root();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn test_child_parent_round_trip() {
        let root = NodeId::root();
        let child = root.child(0xa);
        assert_eq!(child.depth(), 1);
        assert!(!child.is_root());
        assert_eq!(child.branch_at(0), 0xa);
        assert_eq!(child.parent(), Some(root));

        let grandchild = child.child(0x3);
        assert_eq!(grandchild.depth(), 2);
        assert_eq!(grandchild.branch_at(0), 0xa);
        assert_eq!(grandchild.branch_at(1), 0x3);
        assert_eq!(grandchild.parent(), Some(child));
    }

    #[test]
    fn test_siblings_differ() {
        let root = NodeId::root();
        assert_ne!(root.child(0), root.child(1));
    }

    #[test]
    fn test_raw_round_trip() {
        let id = NodeId::root().child(0xf).child(0x1).child(0x7);
        let raw = id.to_raw();
        assert_eq!(NodeId::from_raw(&raw).unwrap(), id);

        let root_raw = NodeId::root().to_raw();
        assert_eq!(root_raw, [0u8; RAW_NODE_ID_LEN]);
        assert_eq!(NodeId::from_raw(&root_raw).unwrap(), NodeId::root());
    }

    #[test]
    fn test_from_raw_rejects_bad_length() {
        assert!(NodeId::from_raw(&[0u8; 32]).is_err());
        assert!(NodeId::from_raw(&[0u8; 34]).is_err());
    }

    #[test]
    fn test_from_raw_rejects_bad_depth() {
        let mut raw = [0u8; RAW_NODE_ID_LEN];
        raw[32] = MAX_DEPTH + 1;
        assert!(NodeId::from_raw(&raw).is_err());
    }

    #[test]
    fn test_from_raw_rejects_noncanonical_path() {
        // Depth 1 but the second nibble of the path is set.
        let mut raw = [0u8; RAW_NODE_ID_LEN];
        raw[0] = 0xab;
        raw[32] = 1;
        assert!(NodeId::from_raw(&raw).is_err());
    }
}

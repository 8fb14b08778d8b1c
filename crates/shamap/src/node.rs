//! Tree nodes and their canonical serialization.
//!
//! A node's identity is the content digest of its serialized form, so
//! the encoding is canonical: a one-byte kind tag followed by the
//! fixed-layout body. An inner node carries the digests of its sixteen
//! children (zero digest = empty branch); a leaf carries the item key
//! and the item bytes.

use crate::error::{Result, ShaMapError};
use rill_common::{ByteReader, ByteWriter, Hash256};

/// Branching factor of the tree.
pub const BRANCH_COUNT: usize = 16;

const LEAF_TAG: u8 = 0;
const INNER_TAG: u8 = 1;

/// A single node of a content-addressed tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNode {
    /// Interior node: digest of each child, zero for empty branches.
    Inner { children: [Hash256; BRANCH_COUNT] },
    /// Leaf node: item key and serialized item.
    Leaf { key: Hash256, data: Vec<u8> },
}

impl TreeNode {
    /// Serialize to the canonical byte form.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            TreeNode::Inner { children } => {
                let mut writer = ByteWriter::with_capacity(1 + BRANCH_COUNT * 32);
                writer.put_u8(INNER_TAG);
                for child in children {
                    writer.put_hash(child);
                }
                writer.into_bytes()
            }
            TreeNode::Leaf { key, data } => {
                let mut writer = ByteWriter::with_capacity(1 + 32 + data.len());
                writer.put_u8(LEAF_TAG);
                writer.put_hash(key);
                writer.put_bytes(data);
                writer.into_bytes()
            }
        }
    }

    /// Parse the canonical byte form.
    pub fn from_bytes(data: &[u8]) -> Result<TreeNode> {
        let mut reader = ByteReader::new(data);
        let tag = reader
            .read_u8()
            .map_err(|e| ShaMapError::MalformedNode(e.to_string()))?;
        match tag {
            INNER_TAG => {
                let mut children = [Hash256::ZERO; BRANCH_COUNT];
                for child in children.iter_mut() {
                    *child = reader
                        .read_hash()
                        .map_err(|e| ShaMapError::MalformedNode(e.to_string()))?;
                }
                reader
                    .finish()
                    .map_err(|e| ShaMapError::MalformedNode(e.to_string()))?;
                if children.iter().all(Hash256::is_zero) {
                    return Err(ShaMapError::MalformedNode(
                        "inner node with no children".to_string(),
                    ));
                }
                Ok(TreeNode::Inner { children })
            }
            LEAF_TAG => {
                let key = reader
                    .read_hash()
                    .map_err(|e| ShaMapError::MalformedNode(e.to_string()))?;
                let data = reader.read_rest().to_vec();
                Ok(TreeNode::Leaf { key, data })
            }
            other => Err(ShaMapError::MalformedNode(format!(
                "unknown node tag {other}"
            ))),
        }
    }

    /// Content digest of this node's canonical form.
    pub fn digest(&self) -> Hash256 {
        Hash256::digest(&self.to_bytes())
    }

    /// Whether this is an interior node.
    pub fn is_inner(&self) -> bool {
        matches!(self, TreeNode::Inner { .. })
    }

    /// The declared digest of the child at `branch`, if this is an
    /// interior node with a child there.
    pub fn child_digest(&self, branch: u8) -> Option<Hash256> {
        match self {
            TreeNode::Inner { children } => {
                let digest = children[branch as usize];
                (!digest.is_zero()).then_some(digest)
            }
            TreeNode::Leaf { .. } => None,
        }
    }
}

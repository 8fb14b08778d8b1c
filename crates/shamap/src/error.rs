//! Error types for tree assembly.

use crate::node_id::NodeId;
use thiserror::Error;

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, ShaMapError>;

/// Errors that can occur while assembling a partial tree.
#[derive(Debug, Error)]
pub enum ShaMapError {
    /// A node id could not be parsed from its wire form.
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    /// A node blob could not be parsed.
    #[error("malformed node: {0}")]
    MalformedNode(String),

    /// A node's content digest does not match the digest its parent
    /// (or the ledger header, for the root) declared for it.
    #[error("node digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// A non-root node arrived before its parent.
    #[error("node {0} has no installed parent")]
    OrphanNode(NodeId),

    /// A node was supplied for a branch its parent declares empty.
    #[error("parent declares no child at {0}")]
    EmptyBranch(NodeId),
}

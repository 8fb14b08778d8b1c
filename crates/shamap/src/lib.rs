//! Content-addressed partial Merkle tree for the rill ledger node.
//!
//! A ledger carries two 16-way Merkle trees: the transaction tree and the
//! account-state tree. Every node is identified by the content digest of
//! its serialized form, so a tree pulled from untrusted peers can be
//! verified one node at a time: each inner node declares the digests of
//! its children, and a child is accepted only if its bytes hash to the
//! declared digest.
//!
//! # Overview
//!
//! - [`NodeId`] - locates a node inside a tree by its nibble path
//! - [`TreeNode`] - an inner node (16 child digests) or a leaf (key + data)
//! - [`ShaMap`] - a partial tree assembled out of order from network data
//! - [`NodeStore`] - shared content-addressed byte cache
//! - [`NodeFilter`] - hook that records accepted nodes into the store and
//!   short-circuits fetches for nodes the store already has
//!
//! # Synchronization flow
//!
//! A syncing tree starts empty. The root node is installed first with
//! [`ShaMap::add_root_node`] against the root digest taken from the ledger
//! header. [`ShaMap::missing_nodes`] then walks the installed portion and
//! reports which children still need to be fetched; downloaded nodes are
//! installed with [`ShaMap::add_known_node`], which verifies them against
//! the parent's declared digest. The tree is complete when
//! [`ShaMap::is_synching`] turns false.

pub mod error;
pub mod filter;
pub mod node;
pub mod node_id;
pub mod store;
pub mod tree;

pub use error::{Result, ShaMapError};
pub use filter::{NodeFilter, NullFilter, StoreFilter};
pub use node::{TreeNode, BRANCH_COUNT};
pub use node_id::{NodeId, MAX_DEPTH, RAW_NODE_ID_LEN};
pub use store::{MemoryNodeStore, NodeStore};
pub use tree::ShaMap;

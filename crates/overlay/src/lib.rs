//! Peer-to-peer ledger acquisition for the rill node.
//!
//! This crate reconstructs complete ledgers — identified by the digest of
//! their header — by pulling their components from a rotating set of
//! network peers, tolerating peer loss, packet loss, and malformed
//! responses, until the ledger verifies against its digest or is
//! abandoned.
//!
//! # Components
//!
//! - [`PeerSet`] - generic substrate: a weakly-referenced set of
//!   candidate peers, a periodic timeout timer, stall detection, and
//!   single-peer request dispatch
//! - [`LedgerAcquire`] - the per-ledger state machine (header, then the
//!   two trees) built on top of [`PeerSet`]
//! - [`LedgerAcquireManager`] - process-wide registry deduplicating
//!   concurrent acquisitions and routing inbound ledger data
//! - [`wire`] - the `GetLedger`/`LedgerData` message schema
//!
//! # Locking
//!
//! Locks are small and never reentered: the registry lock is acquired
//! strictly before any acquisition lock, an acquisition's state lock is
//! acquired strictly before its peer-set lock, and completion callbacks
//! and timer hooks run outside all of them.

pub mod acquire;
pub mod error;
pub mod peer_set;
pub mod registry;
pub mod wire;

pub use acquire::{LedgerAcquire, MAX_NODES_PER_REQUEST};
pub use error::OverlayError;
pub use peer_set::{PeerSet, PeerSetHandler};
pub use registry::LedgerAcquireManager;
pub use wire::{GetLedger, LedgerData, LedgerInfoType, LedgerNode, MessageType, PackedMessage};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Result type for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Configuration for ledger acquisition.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Interval between acquisition timer ticks.
    pub timer_interval: Duration,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            timer_interval: Duration::from_secs(2),
        }
    }
}

/// Unique identifier for a peer (their public key).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Create from raw public key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string for display.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display first 8 chars of hex
        let hex = self.to_hex();
        write!(f, "{}...", &hex[..8])
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_hex())
    }
}

/// Handle to a connected peer, owned by the transport layer.
///
/// Acquisitions hold peers only through [`std::sync::Weak`] references:
/// a peer dropping out of the node must never keep an acquisition alive,
/// and vice versa. Sends are fire-and-forget into the transport's send
/// queue.
pub trait Peer: Send + Sync {
    /// Stable identity of the peer, used to deduplicate peer sets.
    fn id(&self) -> PeerId;

    /// Whether the connection is currently usable.
    fn is_alive(&self) -> bool;

    /// Queue a framed message to the peer.
    fn send(&self, message: &PackedMessage);
}

/// Shared reference to a peer handle.
pub type PeerRef = Arc<dyn Peer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_display() {
        let id = PeerId::from_bytes([0xab; 32]);
        assert_eq!(id.to_string(), "abababab...");
        assert_eq!(id.as_bytes(), &[0xab; 32]);
    }

    #[test]
    fn test_default_config() {
        let config = AcquireConfig::default();
        assert_eq!(config.timer_interval, Duration::from_secs(2));
    }
}

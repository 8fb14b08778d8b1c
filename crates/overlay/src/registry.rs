//! Process-wide acquisition registry and inbound data routing.
//!
//! The manager deduplicates concurrent acquisitions — at most one live
//! [`LedgerAcquire`] per hash, with [`LedgerAcquireManager::find_or_create`]
//! as the unique construction site — and demultiplexes inbound
//! [`LedgerData`] messages to the acquisition they belong to.
//!
//! The registry lock is acquired strictly before any acquisition lock,
//! never the reverse; completion callbacks therefore must not re-enter
//! the registry synchronously. Entries are not removed automatically:
//! whoever reacts to completion or abandonment calls
//! [`LedgerAcquireManager::drop_acquire`].

use crate::acquire::LedgerAcquire;
use crate::wire::{LedgerData, LedgerInfoType};
use crate::{AcquireConfig, PeerRef};
use parking_lot::Mutex;
use rill_common::Hash256;
use rill_shamap::{NodeId, NodeStore};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Registry of in-flight ledger acquisitions.
pub struct LedgerAcquireManager {
    config: AcquireConfig,
    store: Arc<dyn NodeStore>,
    ledgers: Mutex<HashMap<Hash256, Arc<LedgerAcquire>>>,
}

impl LedgerAcquireManager {
    /// Create a manager over the shared node store.
    pub fn new(store: Arc<dyn NodeStore>, config: AcquireConfig) -> Self {
        Self {
            config,
            store,
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the acquisition for `hash`, creating it on first demand.
    ///
    /// Two concurrent callers with the same hash observe the same
    /// acquisition. The timer of a fresh acquisition is armed only after
    /// the registry lock is released and the shared handle is published.
    pub fn find_or_create(&self, hash: Hash256) -> Arc<LedgerAcquire> {
        let (acquire, created) = {
            let mut ledgers = self.ledgers.lock();
            match ledgers.entry(hash) {
                Entry::Occupied(entry) => (entry.get().clone(), false),
                Entry::Vacant(entry) => {
                    let acquire = LedgerAcquire::new(hash, self.store.clone(), &self.config);
                    entry.insert(acquire.clone());
                    (acquire, true)
                }
            }
        };
        if created {
            acquire.reset_timer();
        }
        acquire
    }

    /// Look up the acquisition for `hash`.
    pub fn find(&self, hash: &Hash256) -> Option<Arc<LedgerAcquire>> {
        self.ledgers.lock().get(hash).cloned()
    }

    /// Whether an acquisition for `hash` is live.
    pub fn has(&self, hash: &Hash256) -> bool {
        self.ledgers.lock().contains_key(hash)
    }

    /// Remove the entry for `hash`, after completion or abandonment.
    pub fn drop_acquire(&self, hash: &Hash256) {
        self.ledgers.lock().remove(hash);
    }

    /// Number of live acquisitions.
    pub fn len(&self) -> usize {
        self.ledgers.lock().len()
    }

    /// Whether no acquisition is live.
    pub fn is_empty(&self) -> bool {
        self.ledgers.lock().is_empty()
    }

    /// Route an inbound [`LedgerData`] message to its acquisition.
    ///
    /// Returns false for structurally invalid messages and for hashes no
    /// acquisition is fetching (the latter silently — the data is simply
    /// not ours); the router itself keeps no state. `peer` identifies
    /// the sender so follow-up requests can be steered back to it.
    pub fn got_ledger_data(&self, packet: &LedgerData, peer: Option<&PeerRef>) -> bool {
        let Ok(raw_hash) = <[u8; 32]>::try_from(packet.ledger_hash.as_slice()) else {
            debug!(
                "ledger data with {}-byte hash rejected",
                packet.ledger_hash.len()
            );
            return false;
        };
        let hash = Hash256::from_bytes(raw_hash);

        let Some(acquire) = self.find(&hash) else {
            trace!("ledger data for {} which we are not acquiring", hash);
            return false;
        };

        let Ok(itype) = LedgerInfoType::try_from(packet.itype) else {
            debug!("ledger data for {} with unknown type", hash);
            return false;
        };
        match itype {
            LedgerInfoType::Base => {
                if packet.nodes.len() != 1 {
                    debug!(
                        "base data for {} with {} nodes rejected",
                        hash,
                        packet.nodes.len()
                    );
                    return false;
                }
                let Some(data) = packet.nodes[0].node_data.as_deref() else {
                    return false;
                };
                acquire.take_base(data, peer)
            }
            LedgerInfoType::TxNode | LedgerInfoType::AsNode => {
                if packet.nodes.is_empty() {
                    return false;
                }
                let mut ids = Vec::with_capacity(packet.nodes.len());
                let mut blobs = Vec::with_capacity(packet.nodes.len());
                for node in &packet.nodes {
                    let (Some(raw_id), Some(data)) =
                        (node.node_id.as_deref(), node.node_data.as_deref())
                    else {
                        return false;
                    };
                    let Ok(id) = NodeId::from_raw(raw_id) else {
                        debug!("tree data for {} with malformed node id", hash);
                        return false;
                    };
                    ids.push(id);
                    blobs.push(data.to_vec());
                }
                if itype == LedgerInfoType::TxNode {
                    acquire.take_tx_node(&ids, &blobs, peer)
                } else {
                    acquire.take_as_node(&ids, &blobs, peer)
                }
            }
        }
    }
}

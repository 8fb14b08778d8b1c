//! Single-ledger acquisition.
//!
//! A [`LedgerAcquire`] drives one ledger, identified by its header
//! digest, to completion: first the header ("base"), then the
//! transaction tree and the account-state tree, every byte verified
//! against the digest that vouches for it. Progress is reconciled by
//! [`LedgerAcquire::trigger`], which is invoked after any event that
//! might have unblocked the acquisition — a peer joining, inbound data
//! being accepted, or the timeout timer ticking.
//!
//! # Locking
//!
//! The acquisition's own state (ledger, have-flags, callbacks) lives
//! under one mutex; lifecycle flags and the peer list live in the
//! embedded [`PeerSet`]. The state lock is acquired strictly before the
//! peer-set lock and completion callbacks run outside both.

use crate::peer_set::{PeerSet, PeerSetHandler};
use crate::wire::{GetLedger, LedgerInfoType, PackedMessage};
use crate::{AcquireConfig, PeerId, PeerRef};
use parking_lot::Mutex;
use rill_common::Hash256;
use rill_ledger::Ledger;
use rill_shamap::{NodeId, NodeStore, StoreFilter};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Cap on the number of node ids enumerated in one tree request.
/// Larger deficits are closed across multiple request rounds.
pub const MAX_NODES_PER_REQUEST: usize = 128;

/// Callback invoked when an acquisition finishes (complete or failed).
pub type CompletionCallback = Box<dyn FnOnce(&Arc<LedgerAcquire>) + Send>;

/// Which of the two ledger trees an operation refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TreeKind {
    Transactions,
    AccountState,
}

impl TreeKind {
    fn info_type(self) -> LedgerInfoType {
        match self {
            TreeKind::Transactions => LedgerInfoType::TxNode,
            TreeKind::AccountState => LedgerInfoType::AsNode,
        }
    }
}

/// What a tree phase decided while the state lock was held.
enum TreePhase {
    /// Nothing to request for this tree right now.
    Settled,
    /// The tree has no root installed; request it.
    NeedRoot,
    /// These nodes are missing; request them.
    NeedNodes(Vec<NodeId>),
}

#[derive(Default)]
struct AcquireState {
    have_base: bool,
    have_tx: bool,
    have_state: bool,
    ledger: Option<Ledger>,
    done: bool,
    on_complete: Vec<CompletionCallback>,
}

/// A live attempt to reconstruct one ledger from the network.
pub struct LedgerAcquire {
    self_handle: Weak<LedgerAcquire>,
    peer_set: PeerSet,
    store: Arc<dyn NodeStore>,
    state: Mutex<AcquireState>,
}

impl PeerSetHandler for LedgerAcquire {
    fn peer_set(&self) -> &PeerSet {
        &self.peer_set
    }

    fn weak_handle(&self) -> Weak<dyn PeerSetHandler> {
        let weak: Weak<dyn PeerSetHandler> = self.self_handle.clone();
        weak
    }

    fn new_peer(&self, peer: &PeerRef) {
        self.trigger(Some(peer));
    }

    fn on_timer(&self) {
        self.trigger(None);
    }
}

impl LedgerAcquire {
    /// Create an acquisition for `hash`.
    ///
    /// The timer is not armed here — the handle is not published yet.
    /// The registry arms it once the handle is.
    pub fn new(hash: Hash256, store: Arc<dyn NodeStore>, config: &AcquireConfig) -> Arc<Self> {
        trace!("acquiring ledger {}", hash);
        Arc::new_cyclic(|self_handle| Self {
            self_handle: self_handle.clone(),
            peer_set: PeerSet::new(hash, config.timer_interval),
            store,
            state: Mutex::new(AcquireState::default()),
        })
    }

    /// The target ledger hash.
    pub fn hash(&self) -> Hash256 {
        self.peer_set.hash()
    }

    /// Offer a peer that may have data for this ledger.
    pub fn peer_has(&self, peer: &PeerRef) {
        PeerSet::peer_has(self, peer);
    }

    /// Stop using a misbehaving peer.
    pub fn bad_peer(&self, peer_id: &PeerId) {
        self.peer_set.bad_peer(peer_id);
    }

    /// Arm the timeout timer.
    pub fn reset_timer(&self) {
        PeerSet::reset_timer(self);
    }

    /// Whether the ledger fully verified.
    pub fn is_complete(&self) -> bool {
        self.peer_set.is_complete()
    }

    /// Whether the acquisition was abandoned as unverifiable.
    pub fn is_failed(&self) -> bool {
        self.peer_set.is_failed()
    }

    /// Whether the header has been accepted.
    pub fn have_base(&self) -> bool {
        self.state.lock().have_base
    }

    /// Whether the transaction tree is fully in.
    pub fn have_tx(&self) -> bool {
        self.state.lock().have_tx
    }

    /// Whether the account-state tree is fully in.
    pub fn have_state(&self) -> bool {
        self.state.lock().have_state
    }

    /// Number of stalled timer ticks observed.
    pub fn timeouts(&self) -> u32 {
        self.peer_set.timeouts()
    }

    /// Run `f` against the reconstructed ledger, if the header has been
    /// accepted.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&Ledger) -> T) -> Option<T> {
        self.state.lock().ledger.as_ref().map(f)
    }

    /// Register a callback to run when the acquisition finishes.
    ///
    /// If the acquisition already finished the callback runs
    /// immediately, exactly once, outside the lock. Callbacks must not
    /// synchronously re-enter the registry with this ledger's hash.
    pub fn add_on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Arc<LedgerAcquire>) + Send + 'static,
    {
        let callback: CompletionCallback = Box::new(callback);
        let run_now = {
            let mut state = self.state.lock();
            if state.done {
                Some(callback)
            } else {
                state.on_complete.push(callback);
                None
            }
        };
        if let Some(callback) = run_now {
            if let Some(strong) = self.self_handle.upgrade() {
                callback(&strong);
            }
        }
    }

    /// Reconcile the acquisition after an event that may have unblocked
    /// it.
    ///
    /// Sends whatever requests the current phase calls for. With a
    /// specific `peer` the first composed request goes to that peer only
    /// and reconciliation stops there, so one peer is not multiplexed
    /// across phases in a single call; without one, each request goes to
    /// the first live peer in the set and the timer is re-armed.
    pub fn trigger(&self, peer: Option<&PeerRef>) {
        if self.is_complete() || self.is_failed() {
            self.done();
            return;
        }

        let targeted = peer.is_some();
        let requests = {
            let mut state = self.state.lock();
            trace!(
                "trigger {}: base={} tx={} state={} targeted={}",
                self.hash(),
                state.have_base,
                state.have_tx,
                state.have_state,
                targeted,
            );
            self.compose_requests(&mut state, targeted)
        };

        if self.is_complete() || self.is_failed() {
            self.done();
            return;
        }

        match peer {
            Some(peer) => {
                for request in &requests {
                    self.peer_set.send_request_to(request, peer);
                }
                // A targeted reconciliation does not touch the timer;
                // the regular tick is already pending.
            }
            None => {
                for request in &requests {
                    self.peer_set.send_request(request);
                }
                self.reset_timer();
            }
        }
    }

    /// Work out what to request next. May flip have-flags and the
    /// lifecycle flags as a side effect when a tree turns out to be
    /// finished. Called with the state lock held.
    fn compose_requests(&self, state: &mut AcquireState, targeted: bool) -> Vec<PackedMessage> {
        let mut requests = Vec::new();

        if !state.have_base {
            trace!("{} needs base", self.hash());
            requests.push(PackedMessage::get_ledger(&GetLedger::base(self.hash())));
            if targeted {
                return requests;
            }
        }

        for kind in [TreeKind::Transactions, TreeKind::AccountState] {
            if !self.tree_wanted(state, kind) {
                continue;
            }
            match self.tree_phase(state, kind) {
                TreePhase::Settled => {}
                TreePhase::NeedRoot => {
                    requests.push(self.tree_request(state, kind, vec![NodeId::root()]));
                    if targeted {
                        return requests;
                    }
                }
                TreePhase::NeedNodes(ids) => {
                    requests.push(self.tree_request(state, kind, ids));
                    if targeted {
                        return requests;
                    }
                }
            }
        }

        requests
    }

    fn tree_wanted(&self, state: &AcquireState, kind: TreeKind) -> bool {
        state.have_base
            && match kind {
                TreeKind::Transactions => !state.have_tx,
                TreeKind::AccountState => !state.have_state,
            }
    }

    /// Inspect one tree: decide between requesting its root, requesting
    /// missing interior nodes, or settling it (valid or failed).
    fn tree_phase(&self, state: &mut AcquireState, kind: TreeKind) -> TreePhase {
        let Some(ledger) = state.ledger.as_mut() else {
            return TreePhase::Settled;
        };
        let map = match kind {
            TreeKind::Transactions => ledger.tx_map_mut(),
            TreeKind::AccountState => ledger.state_map_mut(),
        };
        if map.root_hash().is_none() {
            trace!("{} needs {:?} root", self.peer_set.hash(), kind);
            return TreePhase::NeedRoot;
        }

        let filter = StoreFilter::new(self.store.as_ref());
        let missing = map.missing_nodes(MAX_NODES_PER_REQUEST, &filter);
        if !missing.is_empty() {
            trace!(
                "{} needs {} {:?} nodes",
                self.peer_set.hash(),
                missing.len(),
                kind,
            );
            return TreePhase::NeedNodes(missing.into_iter().map(|(id, _)| id).collect());
        }

        if !map.is_valid() {
            warn!(
                "{} {:?} tree is structurally invalid",
                self.peer_set.hash(),
                kind
            );
            self.peer_set.set_failed();
            return TreePhase::Settled;
        }
        match kind {
            TreeKind::Transactions => {
                state.have_tx = true;
                if state.have_state {
                    self.peer_set.set_complete();
                }
            }
            TreeKind::AccountState => {
                state.have_state = true;
                if state.have_tx {
                    self.peer_set.set_complete();
                }
            }
        }
        TreePhase::Settled
    }

    fn tree_request(
        &self,
        state: &AcquireState,
        kind: TreeKind,
        ids: Vec<NodeId>,
    ) -> PackedMessage {
        let seq = state.ledger.as_ref().map(Ledger::seq).unwrap_or_default();
        let node_ids = ids.iter().map(|id| id.to_raw().to_vec()).collect();
        PackedMessage::get_ledger(&GetLedger::tree_nodes(
            self.hash(),
            seq,
            kind.info_type(),
            node_ids,
        ))
    }

    /// Accept a header blob.
    ///
    /// Returns false and changes nothing if the blob does not parse or
    /// does not hash to the target. On acceptance, trees whose declared
    /// root is the zero digest are immediately marked in; if that covers
    /// both, the acquisition completes on the spot.
    pub fn take_base(&self, data: &[u8], peer: Option<&PeerRef>) -> bool {
        trace!("got base data for {}", self.hash());
        {
            let mut state = self.state.lock();
            if state.have_base {
                return true;
            }
            let mut ledger = match Ledger::from_header_bytes(data) {
                Ok(ledger) => ledger,
                Err(err) => {
                    warn!("rejected base for {}: {}", self.hash(), err);
                    return false;
                }
            };
            if ledger.hash() != self.hash() {
                warn!("base hash mismatch: {} != {}", ledger.hash(), self.hash());
                return false;
            }
            state.have_base = true;
            self.peer_set.progress();
            if ledger.tx_root().is_zero() {
                state.have_tx = true;
            }
            if ledger.state_root().is_zero() {
                state.have_state = true;
            }
            ledger.set_acquiring();
            state.ledger = Some(ledger);
            if state.have_tx && state.have_state {
                self.peer_set.set_complete();
            }
        }
        self.trigger(peer);
        true
    }

    /// Accept transaction-tree nodes. See [`LedgerAcquire::take_tree_node`].
    pub fn take_tx_node(&self, ids: &[NodeId], data: &[Vec<u8>], peer: Option<&PeerRef>) -> bool {
        self.take_tree_node(TreeKind::Transactions, ids, data, peer)
    }

    /// Accept account-state-tree nodes. See [`LedgerAcquire::take_tree_node`].
    pub fn take_as_node(&self, ids: &[NodeId], data: &[Vec<u8>], peer: Option<&PeerRef>) -> bool {
        self.take_tree_node(TreeKind::AccountState, ids, data, peer)
    }

    /// Walk the parallel id/data sequences and install each node into
    /// the tree. Requires the base. The first rejected node aborts the
    /// batch with false; nodes installed before it stay installed and
    /// later rounds re-request whatever is still missing.
    fn take_tree_node(
        &self,
        kind: TreeKind,
        ids: &[NodeId],
        data: &[Vec<u8>],
        peer: Option<&PeerRef>,
    ) -> bool {
        trace!("got {:?} data for {}", kind, self.hash());
        {
            let mut state = self.state.lock();
            if !state.have_base {
                return false;
            }
            let finished = {
                let Some(ledger) = state.ledger.as_mut() else {
                    return false;
                };
                let expected_root = match kind {
                    TreeKind::Transactions => ledger.tx_root(),
                    TreeKind::AccountState => ledger.state_root(),
                };
                let filter = StoreFilter::new(self.store.as_ref());
                let map = match kind {
                    TreeKind::Transactions => ledger.tx_map_mut(),
                    TreeKind::AccountState => ledger.state_map_mut(),
                };
                for (id, blob) in ids.iter().zip(data.iter()) {
                    let installed = if id.is_root() {
                        map.add_root_node(expected_root, blob)
                    } else {
                        map.add_known_node(id, blob, &filter)
                    };
                    if let Err(err) = installed {
                        debug!("rejected {:?} node ({}): {}", kind, id, err);
                        return false;
                    }
                }
                !map.is_synching()
            };
            if finished {
                match kind {
                    TreeKind::Transactions => {
                        state.have_tx = true;
                        if state.have_state {
                            self.peer_set.set_complete();
                        }
                    }
                    TreeKind::AccountState => {
                        state.have_state = true;
                        if state.have_tx {
                            self.peer_set.set_complete();
                        }
                    }
                }
            }
        }
        self.trigger(peer);
        self.peer_set.progress();
        true
    }

    /// Finish the acquisition: fix the lifecycle flags and fire the
    /// completion callbacks exactly once, outside the locks.
    fn done(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            if state.done {
                return;
            }
            state.done = true;
            std::mem::take(&mut state.on_complete)
        };
        if !self.peer_set.is_failed() {
            self.peer_set.set_complete();
        }
        debug!(
            "done acquiring {} (complete={} failed={})",
            self.hash(),
            self.is_complete(),
            self.is_failed(),
        );
        let Some(strong) = self.self_handle.upgrade() else {
            return;
        };
        for callback in callbacks {
            callback(&strong);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_ledger::LedgerHeader;
    use rill_shamap::MemoryNodeStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn acquire_for(header: &LedgerHeader) -> Arc<LedgerAcquire> {
        LedgerAcquire::new(
            header.hash(),
            Arc::new(MemoryNodeStore::new()),
            &AcquireConfig::default(),
        )
    }

    fn zero_root_header() -> LedgerHeader {
        LedgerHeader {
            seq: 1,
            total_coins: 0,
            parent_hash: Hash256::digest(b"parent"),
            tx_root: Hash256::ZERO,
            state_root: Hash256::ZERO,
            close_time: 0,
            close_resolution: 10,
            close_flags: 0,
        }
    }

    #[test]
    fn test_take_base_idempotent() {
        let header = zero_root_header();
        let acquire = acquire_for(&header);
        assert!(acquire.take_base(&header.to_bytes(), None));
        assert!(acquire.take_base(&header.to_bytes(), None));
        assert!(acquire.is_complete());
    }

    #[test]
    fn test_callback_after_done_runs_immediately() {
        let header = zero_root_header();
        let acquire = acquire_for(&header);
        let fired = Arc::new(AtomicUsize::new(0));

        acquire.take_base(&header.to_bytes(), None);
        assert!(acquire.is_complete());

        let fired_clone = fired.clone();
        acquire.add_on_complete(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tree_nodes_before_base_rejected() {
        let header = zero_root_header();
        let acquire = acquire_for(&header);
        assert!(!acquire.take_tx_node(&[NodeId::root()], &[vec![0u8; 10]], None));
        assert!(!acquire.have_base());
    }
}

//! Timer-driven multi-peer fetch substrate.
//!
//! A [`PeerSet`] tracks the candidate peers for one hash-identified
//! fetch, drives a one-shot timeout timer, and detects stalled progress.
//! It dispatches a single outbound request to one peer at a time: the
//! first live peer in insertion order, with no rotation guarantee.
//!
//! The owner supplies two hooks through [`PeerSetHandler`]: `new_peer`,
//! invoked when a fresh peer joins the set, and `on_timer`, invoked on
//! every timer tick — plus `weak_handle`, through which the timer
//! reaches back into the owner without keeping it alive. Hooks are
//! always called after the peer-set lock has been released, so they are
//! free to send requests or re-enter any `PeerSet` method.
//!
//! # Timer
//!
//! The timer is one-shot; the owner re-arms it from `on_timer` while the
//! fetch is live. The scheduled task holds only the weak handle: if the
//! owner has been dropped by the time the timer fires, the tick is a
//! no-op, which is the sole mechanism by which abandoned fetches
//! quiesce. Runtime shutdown cancels pending timers silently.

use crate::wire::PackedMessage;
use crate::{Peer, PeerId, PeerRef};
use parking_lot::Mutex;
use rill_common::Hash256;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{trace, warn};

/// Hooks implemented by the owner of a [`PeerSet`].
pub trait PeerSetHandler: Send + Sync + 'static {
    /// The peer set this handler drives.
    fn peer_set(&self) -> &PeerSet;

    /// A non-owning handle to this handler, captured by scheduled
    /// timers.
    fn weak_handle(&self) -> Weak<dyn PeerSetHandler>;

    /// A fresh peer joined the set.
    fn new_peer(&self, peer: &PeerRef);

    /// The timeout timer ticked.
    fn on_timer(&self);
}

struct PeerSetInner {
    peers: Vec<Weak<dyn Peer>>,
    timeouts: u32,
    complete: bool,
    failed: bool,
    progress: bool,
}

/// Candidate peers, lifecycle flags and stall tracking for one fetch.
pub struct PeerSet {
    hash: Hash256,
    timer_interval: Duration,
    inner: Mutex<PeerSetInner>,
}

impl PeerSet {
    /// Create a peer set fetching `hash`, ticking every
    /// `timer_interval`. The timer is not armed here; the owner arms it
    /// with [`PeerSet::reset_timer`] once it is behind a shared handle.
    pub fn new(hash: Hash256, timer_interval: Duration) -> Self {
        Self {
            hash,
            timer_interval,
            inner: Mutex::new(PeerSetInner {
                peers: Vec::new(),
                timeouts: 0,
                complete: false,
                failed: false,
                // Creation counts as activity: the first tick clears
                // this instead of recording a timeout.
                progress: true,
            }),
        }
    }

    /// The hash this set is fetching.
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// The configured tick interval.
    pub fn timer_interval(&self) -> Duration {
        self.timer_interval
    }

    /// Offer a peer that claims to have data for this hash.
    ///
    /// Dead entries found during the scan are purged. If an
    /// identity-equal live entry already exists the offer is ignored;
    /// otherwise the peer is added and the owner's `new_peer` hook runs
    /// (outside the lock).
    pub fn peer_has(handler: &dyn PeerSetHandler, peer: &PeerRef) {
        let set = handler.peer_set();
        let inserted = {
            let mut inner = set.inner.lock();
            inner.peers.retain(|entry| entry.strong_count() > 0);
            let duplicate = inner
                .peers
                .iter()
                .filter_map(Weak::upgrade)
                .any(|existing| existing.id() == peer.id());
            if duplicate {
                false
            } else {
                inner.peers.push(Arc::downgrade(peer));
                true
            }
        };
        if inserted {
            trace!("peer {} has {}", peer.id(), set.hash);
            handler.new_peer(peer);
        }
    }

    /// Remove the identity-equal entry, if present. Dead entries found
    /// during the scan are purged as well.
    pub fn bad_peer(&self, peer_id: &PeerId) {
        let mut inner = self.inner.lock();
        inner.peers.retain(|entry| match entry.upgrade() {
            Some(peer) => peer.id() != *peer_id,
            None => false,
        });
    }

    /// Number of entries still backed by a live handle.
    pub fn peer_count(&self) -> usize {
        self.inner
            .lock()
            .peers
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    /// Send one request to the first live peer in insertion order.
    ///
    /// No-op if no peer is live. Expired entries are purged on the way.
    pub fn send_request(&self, message: &PackedMessage) {
        let target = {
            let mut inner = self.inner.lock();
            inner.peers.retain(|entry| entry.strong_count() > 0);
            inner
                .peers
                .iter()
                .filter_map(Weak::upgrade)
                .find(|peer| peer.is_alive())
        };
        match target {
            Some(peer) => {
                trace!("requesting {} from {}", self.hash, peer.id());
                peer.send(message);
            }
            None => trace!("no live peers to request {} from", self.hash),
        }
    }

    /// Send one request to a specific peer, bypassing selection.
    pub fn send_request_to(&self, message: &PackedMessage, peer: &PeerRef) {
        trace!("requesting {} from {} (targeted)", self.hash, peer.id());
        peer.send(message);
    }

    /// Arm the one-shot timer.
    ///
    /// The scheduled task captures the owner's weak handle; an owner
    /// dropped before the tick makes the tick a no-op. Without a tokio
    /// runtime on the current thread the timer is not armed.
    pub fn reset_timer(handler: &dyn PeerSetHandler) {
        let set = handler.peer_set();
        let interval = set.timer_interval;
        let hash = set.hash;
        let weak = handler.weak_handle();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            trace!("no runtime, timer for {} not armed", hash);
            return;
        };
        runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(handler) = weak.upgrade() {
                PeerSet::invoke_on_timer(handler.as_ref());
            }
        });
    }

    /// One timer tick: stall bookkeeping, then the owner's `on_timer`
    /// hook (outside the lock).
    ///
    /// If nothing useful arrived since the previous tick the timeout
    /// counter climbs; otherwise the progress bit is cleared so the next
    /// tick only stays quiet if fresh data arrives in the interval.
    pub fn invoke_on_timer(handler: &dyn PeerSetHandler) {
        let set = handler.peer_set();
        {
            let mut inner = set.inner.lock();
            if !inner.progress {
                inner.timeouts += 1;
                warn!("timeout {} acquiring {}", inner.timeouts, set.hash);
            } else {
                inner.progress = false;
            }
        }
        handler.on_timer();
    }

    /// Record that useful inbound data was accepted.
    pub fn progress(&self) {
        self.inner.lock().progress = true;
    }

    /// Number of stalled ticks observed so far.
    pub fn timeouts(&self) -> u32 {
        self.inner.lock().timeouts
    }

    /// Mark the fetch complete. Ignored after a failure: the two flags
    /// are mutually exclusive.
    pub fn set_complete(&self) {
        let mut inner = self.inner.lock();
        if !inner.failed {
            inner.complete = true;
        }
    }

    /// Mark the fetch failed. Ignored after completion.
    pub fn set_failed(&self) {
        let mut inner = self.inner.lock();
        if !inner.complete {
            inner.failed = true;
        }
    }

    /// Whether the fetch completed.
    pub fn is_complete(&self) -> bool {
        self.inner.lock().complete
    }

    /// Whether the fetch failed.
    pub fn is_failed(&self) -> bool {
        self.inner.lock().failed
    }
}

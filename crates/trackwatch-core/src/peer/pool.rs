//! Shared pool of known peers.

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::scheduler::TaskId;

/// A peer address, optionally owned by the task currently using it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    addr: SocketAddr,
    owner: Option<TaskId>,
}

impl Peer {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, owner: None }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn owner(&self) -> Option<TaskId> {
        self.owner
    }

    /// Tag the peer with the task that will use it. The returned claim is the
    /// only handle to the peer until it is given back with [`PeerPool::return_peer`].
    pub fn mark_owned_by(mut self, owner: TaskId) -> PeerClaim {
        self.owner = Some(owner);
        PeerClaim { peer: self, owner }
    }
}

/// Exclusive use of one peer by one task.
#[derive(Debug, PartialEq, Eq)]
pub struct PeerClaim {
    peer: Peer,
    owner: TaskId,
}

impl PeerClaim {
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn addr(&self) -> SocketAddr {
        self.peer.addr
    }

    pub fn owner(&self) -> TaskId {
        self.owner
    }
}

/// Pool of peers shared by every orchestrator and connection task of a download.
pub trait PeerPool: Send + Sync {
    /// Add a newly learned peer. Returns false if the address is already known.
    fn add_peer(&self, addr: SocketAddr) -> bool;

    /// Remove one unused peer from the pool. No other caller can get the same
    /// peer until it is returned.
    fn claim_unused_peer(&self) -> Option<Peer>;

    /// Give a claimed peer back to the unused set.
    fn return_peer(&self, claim: PeerClaim);
}

#[derive(Debug, Default)]
struct Inner {
    unused: VecDeque<Peer>,
    claimed: HashSet<SocketAddr>,
}

/// Mutex-backed [`PeerPool`]. Claims are linearizable: the pop from the unused
/// queue and the move into the claimed set happen under one lock.
#[derive(Debug, Default)]
pub struct PeerStore {
    inner: Mutex<Inner>,
}

impl PeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add several peers; returns how many were new.
    pub fn add_peers<I>(&self, addrs: I) -> usize
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        addrs.into_iter().filter(|a| self.add_peer(*a)).count()
    }

    pub fn unused_count(&self) -> usize {
        self.lock().unused.len()
    }

    pub fn claimed_count(&self) -> usize {
        self.lock().claimed.len()
    }
}

impl PeerPool for PeerStore {
    fn add_peer(&self, addr: SocketAddr) -> bool {
        let mut inner = self.lock();
        if inner.claimed.contains(&addr) || inner.unused.iter().any(|p| p.addr == addr) {
            return false;
        }
        inner.unused.push_back(Peer::new(addr));
        true
    }

    fn claim_unused_peer(&self) -> Option<Peer> {
        let mut inner = self.lock();
        let peer = inner.unused.pop_front()?;
        inner.claimed.insert(peer.addr);
        Some(peer)
    }

    fn return_peer(&self, claim: PeerClaim) {
        let mut inner = self.lock();
        let addr = claim.addr();
        if inner.claimed.remove(&addr) {
            inner.unused.push_back(Peer::new(addr));
        }
    }
}

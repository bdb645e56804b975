//! Download runtime: global halt and connected-or-connecting peer count.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::TrackwatchConfig;

/// What the bootstrap loop needs to know about the download's runtime.
pub trait RuntimeState: Send + Sync {
    /// The download's peer activity has been halted.
    fn is_halted(&self) -> bool;

    /// Fewer peers are connected or connecting than the configured minimum.
    fn below_min_peers(&self) -> bool;
}

/// Shared runtime counters for one download. The minimum-peers target is a
/// live value; it may change while a bootstrap pass is running.
#[derive(Debug)]
pub struct BtRuntime {
    halted: AtomicBool,
    connections: AtomicUsize,
    min_peers: AtomicUsize,
}

impl BtRuntime {
    pub fn new(min_peers: usize) -> Arc<Self> {
        Arc::new(Self {
            halted: AtomicBool::new(false),
            connections: AtomicUsize::new(0),
            min_peers: AtomicUsize::new(min_peers),
        })
    }

    /// Runtime with the configured peer target.
    pub fn from_config(cfg: &TrackwatchConfig) -> Arc<Self> {
        Self::new(cfg.min_peers)
    }

    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    /// Peers currently connected or connecting.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    pub fn min_peers(&self) -> usize {
        self.min_peers.load(Ordering::Acquire)
    }

    pub fn set_min_peers(&self, min_peers: usize) {
        self.min_peers.store(min_peers, Ordering::Release);
    }

    /// Count one connection until the returned slot is dropped.
    pub fn open_connection(self: &Arc<Self>) -> ConnectionSlot {
        self.connections.fetch_add(1, Ordering::AcqRel);
        ConnectionSlot {
            runtime: Arc::clone(self),
        }
    }
}

impl RuntimeState for BtRuntime {
    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    fn below_min_peers(&self) -> bool {
        self.connections() < self.min_peers()
    }
}

/// Releases its connection count when dropped.
#[derive(Debug)]
pub struct ConnectionSlot {
    runtime: Arc<BtRuntime>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.runtime.connections.fetch_sub(1, Ordering::AcqRel);
    }
}

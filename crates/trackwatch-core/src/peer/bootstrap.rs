//! Turn pooled peers into outbound connection attempts.

use std::sync::Arc;

use crate::download::Download;
use crate::scheduler::{Scheduler, Task};

use super::pool::{PeerClaim, PeerPool};
use super::runtime::RuntimeState;

/// Piece bookkeeping of the download. The bootstrap loop never looks inside;
/// it only hands a reference to every connection task it starts.
pub trait PieceStorage: Send + Sync {}

/// Everything a new peer connection task is started with.
pub struct ConnectRequest {
    /// The peer, tagged with the new task's id.
    pub claim: PeerClaim,
    pub download: Arc<Download>,
    pub runtime: Arc<dyn RuntimeState>,
    pub peers: Arc<dyn PeerPool>,
    pub pieces: Arc<dyn PieceStorage>,
}

/// Builds peer connection tasks. The connection state machine lives elsewhere.
pub trait PeerConnector {
    fn initiate(&self, request: ConnectRequest) -> Box<dyn Task>;
}

/// Shared collaborators of a download's bootstrap loop.
#[derive(Clone)]
pub struct Swarm {
    pub runtime: Arc<dyn RuntimeState>,
    pub peers: Arc<dyn PeerPool>,
    pub pieces: Arc<dyn PieceStorage>,
    pub connector: Arc<dyn PeerConnector>,
}

/// Claim unused peers and schedule a connection attempt for each, while the
/// runtime is not halted and stays below its minimum peer count. Both
/// conditions are re-read before every claim. Stops as soon as the pool has
/// nothing to give; never waits for it to refill.
///
/// Returns the number of connection tasks scheduled.
pub fn bootstrap_peers(download: &Arc<Download>, swarm: &Swarm, sched: &mut dyn Scheduler) -> usize {
    let mut spawned = 0;
    while !swarm.runtime.is_halted() && swarm.runtime.below_min_peers() {
        let Some(peer) = swarm.peers.claim_unused_peer() else {
            break;
        };
        let claim = peer.mark_owned_by(sched.new_task_id());
        tracing::debug!(
            gid = download.gid(),
            peer = %claim.addr(),
            task = %claim.owner(),
            "adding peer connection task"
        );
        let task = swarm.connector.initiate(ConnectRequest {
            claim,
            download: Arc::clone(download),
            runtime: Arc::clone(&swarm.runtime),
            peers: Arc::clone(&swarm.peers),
            pieces: Arc::clone(&swarm.pieces),
        });
        sched.schedule(task);
        spawned += 1;
    }
    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::TrackerSettings;
    use crate::peer::{BtRuntime, ConnectionSlot, PeerStore};
    use crate::scheduler::{LocalScheduler, Poll, TaskId};
    use std::net::SocketAddr;
    use std::sync::Mutex;

    struct NoPieces;

    impl PieceStorage for NoPieces {}

    struct Connecting {
        _slot: Option<ConnectionSlot>,
    }

    impl Task for Connecting {
        fn poll(&mut self, _sched: &mut dyn Scheduler) -> Poll {
            Poll::Pending
        }
    }

    /// Records every request; optionally counts the connection on the runtime
    /// and lowers the peer target after the first spawn.
    struct Recorder {
        runtime: Arc<BtRuntime>,
        count_connections: bool,
        lower_target_to: Option<usize>,
        seen: Mutex<Vec<(SocketAddr, TaskId)>>,
    }

    impl PeerConnector for Recorder {
        fn initiate(&self, request: ConnectRequest) -> Box<dyn Task> {
            self.seen
                .lock()
                .unwrap()
                .push((request.claim.addr(), request.claim.owner()));
            if let Some(n) = self.lower_target_to {
                self.runtime.set_min_peers(n);
            }
            let slot = self.count_connections.then(|| self.runtime.open_connection());
            Box::new(Connecting { _slot: slot })
        }
    }

    struct Fixture {
        download: Arc<Download>,
        runtime: Arc<BtRuntime>,
        store: Arc<PeerStore>,
        recorder: Arc<Recorder>,
        swarm: Swarm,
    }

    fn fixture(min_peers: usize, pool: u16, count_connections: bool, lower_target_to: Option<usize>) -> Fixture {
        let download = Arc::new(Download::new(1, "t", Vec::new(), TrackerSettings::default()));
        let runtime = BtRuntime::new(min_peers);
        let store = Arc::new(PeerStore::new());
        store.add_peers((1..=pool).map(|p| SocketAddr::from(([192, 0, 2, 1], p))));
        let recorder = Arc::new(Recorder {
            runtime: Arc::clone(&runtime),
            count_connections,
            lower_target_to,
            seen: Mutex::new(Vec::new()),
        });
        let swarm = Swarm {
            runtime: runtime.clone(),
            peers: store.clone(),
            pieces: Arc::new(NoPieces),
            connector: recorder.clone(),
        };
        Fixture { download, runtime, store, recorder, swarm }
    }

    #[test]
    fn stops_on_pool_exhaustion_below_target() {
        let f = fixture(5, 2, true, None);
        let mut sched = LocalScheduler::new();
        assert_eq!(bootstrap_peers(&f.download, &f.swarm, &mut sched), 2);
        assert_eq!(sched.len(), 2);
        assert_eq!(f.store.unused_count(), 0);
        assert!(f.runtime.below_min_peers());
    }

    #[test]
    fn stops_when_target_reached() {
        let f = fixture(3, 10, true, None);
        let mut sched = LocalScheduler::new();
        assert_eq!(bootstrap_peers(&f.download, &f.swarm, &mut sched), 3);
        assert_eq!(f.store.unused_count(), 7);
        assert_eq!(f.runtime.connections(), 3);
    }

    #[test]
    fn halted_runtime_spawns_nothing() {
        let f = fixture(5, 3, true, None);
        f.runtime.halt();
        let mut sched = LocalScheduler::new();
        assert_eq!(bootstrap_peers(&f.download, &f.swarm, &mut sched), 0);
        assert_eq!(f.store.unused_count(), 3);
    }

    #[test]
    fn target_is_re_read_after_every_claim() {
        let f = fixture(10, 10, false, Some(0));
        let mut sched = LocalScheduler::new();
        assert_eq!(bootstrap_peers(&f.download, &f.swarm, &mut sched), 1);
        assert_eq!(f.store.unused_count(), 9);
    }

    #[test]
    fn each_claim_gets_its_own_task_id() {
        let f = fixture(10, 4, false, None);
        let mut sched = LocalScheduler::new();
        assert_eq!(bootstrap_peers(&f.download, &f.swarm, &mut sched), 4);
        let seen = f.recorder.seen.lock().unwrap().clone();
        let mut ids: Vec<TaskId> = seen.iter().map(|(_, id)| *id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        let mut addrs: Vec<SocketAddr> = seen.iter().map(|(a, _)| *a).collect();
        addrs.sort();
        addrs.dedup();
        assert_eq!(addrs.len(), 4);
    }
}

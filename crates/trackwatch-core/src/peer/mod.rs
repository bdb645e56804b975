//! Peers: the shared unused-peer pool, the download runtime's connection
//! accounting, and the bootstrap loop that turns pooled peers into outbound
//! connection attempts.

mod bootstrap;
mod pool;
mod runtime;

pub use bootstrap::{bootstrap_peers, ConnectRequest, PeerConnector, PieceStorage, Swarm};
pub use pool::{Peer, PeerClaim, PeerPool, PeerStore};
pub use runtime::{BtRuntime, ConnectionSlot, RuntimeState};

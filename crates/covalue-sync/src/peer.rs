//! Peer identity, role, and the transport seam external adapters implement.

use crate::message::SyncMessage;
use async_trait::async_trait;
use covalue_core::CovalueError;
use std::fmt;

/// Opaque identifier for a connected peer, scoped to one [`crate::SyncManager`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a peer participates in gossip fan-out.
///
/// `Server` peers are unsolicited sync targets for every covalue we know
/// about; `Client` peers only hear about covalues they have asked for;
/// `Peer` behaves like `Server` but denotes a symmetric connection rather
/// than a client/server pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// Eligible for unsolicited sync of all known covalues.
    Server,
    /// Only told about covalues it has asked about.
    Client,
    /// Symmetric peer, treated the same as `Server` for fan-out purposes.
    Peer,
}

impl PeerRole {
    /// Whether a covalue this role hasn't asked about should still be
    /// gossiped to it unsolicited.
    pub fn receives_unsolicited(self) -> bool {
        !matches!(self, PeerRole::Client)
    }
}

/// A duplex channel to one peer, opened and reconnected by an external
/// adapter (WebSocket, QUIC stream, in-memory channel in tests) and handed
/// to [`crate::SyncManager::add_peer`]. The manager is connection-agnostic:
/// it only ever sends and receives [`SyncMessage`] values.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Send one message to this peer.
    async fn send(&self, message: SyncMessage) -> Result<(), CovalueError>;

    /// Receive the next message, or `None` once the peer has closed the
    /// channel.
    async fn recv(&self) -> Result<Option<SyncMessage>, CovalueError>;
}

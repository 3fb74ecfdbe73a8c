//! # Covalue Sync
//!
//! The peer-to-peer fact-exchange protocol: four message kinds
//! (`known`/`load`/`content`/`done`) driving gossip fan-out across
//! connections a caller opens and hands in via [`SyncManager::add_peer`].
//! Connection-agnostic — reconnection, transport framing, and discovery are
//! all external adapter concerns; this crate only ever reads and writes
//! [`message::SyncMessage`] values against a [`registry::CovalueRegistry`].

#![forbid(unsafe_code)]

pub mod backoff;
pub mod manager;
pub mod message;
pub mod peer;
pub mod registry;

pub use backoff::Backoff;
pub use manager::SyncManager;
pub use message::SyncMessage;
pub use peer::{PeerId, PeerRole, SyncTransport};
pub use registry::CovalueRegistry;

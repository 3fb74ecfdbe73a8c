//! # Covalue Node
//!
//! The node: account/group lifecycle (`withNewlyCreatedAccount`,
//! `withLoadedAccount`, `createGroup`, `acceptInvite`), the in-memory
//! covalue registry and key store, the session-establishment lock, live
//! `query` subscriptions, and node configuration.

#![forbid(unsafe_code)]

pub mod config;
pub mod invite_link;
pub mod node;
pub mod registry;
pub mod session_lock;

pub use config::NodeConfig;
pub use invite_link::InviteLink;
pub use node::{NewAccount, Node, Unsubscribe};
pub use registry::{InMemoryRegistry, KeyStore};
pub use session_lock::{InMemorySessionLocker, SessionLocker};

//! # Covalue Testkit
//!
//! An in-memory duplex [`covalue_sync::SyncTransport`] pair, for
//! cross-node sync tests without a real socket — the same role
//! `aura-testkit`'s in-memory channel fixtures play for that codebase's
//! own integration tests.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use covalue_core::CovalueError;
use covalue_sync::{SyncMessage, SyncTransport};
use tokio::sync::mpsc;

/// One end of an in-memory duplex channel.
pub struct InMemoryTransport {
    outbound: mpsc::UnboundedSender<SyncMessage>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<SyncMessage>>,
}

#[async_trait]
impl SyncTransport for InMemoryTransport {
    async fn send(&self, message: SyncMessage) -> Result<(), CovalueError> {
        self.outbound
            .send(message)
            .map_err(|_| CovalueError::ChannelClosed {
                message: "in-memory transport peer dropped".to_string(),
            })
    }

    async fn recv(&self) -> Result<Option<SyncMessage>, CovalueError> {
        Ok(self.inbound.lock().await.recv().await)
    }
}

/// Build a connected pair: messages sent on one side arrive on the other.
pub fn duplex_pair() -> (InMemoryTransport, InMemoryTransport) {
    let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
    let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();
    let a = InMemoryTransport {
        outbound: a_to_b_tx,
        inbound: tokio::sync::Mutex::new(b_to_a_rx),
    };
    let b = InMemoryTransport {
        outbound: b_to_a_tx,
        inbound: tokio::sync::Mutex::new(a_to_b_rx),
    };
    (a, b)
}

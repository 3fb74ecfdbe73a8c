//! `SyncManager`: per-peer `knownState`/`requestedState` bookkeeping and the
//! gossip protocol driving the four message kinds.

use crate::message::SyncMessage;
use crate::peer::{PeerId, PeerRole, SyncTransport};
use crate::registry::CovalueRegistry;
use covalue_content::covalue::PendingEntry;
use covalue_core::ids::{CoId, SessionId};
use covalue_core::CovalueError;
use covalue_journal::SessionEntry;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct PeerHandle {
    role: PeerRole,
    transport: Arc<dyn SyncTransport>,
    /// The peer's last-reported session lengths, per covalue — our best
    /// knowledge of their `knownState`.
    peer_known: Mutex<HashMap<CoId, HashMap<SessionId, u64>>>,
    /// Covalues a `client`-role peer has shown interest in, either by
    /// sending us a `known`/`load` for it or by us having sent it one.
    requested: Mutex<HashSet<CoId>>,
}

/// Drives the sync protocol over a set of peer channels, each supplied by
/// an external transport adapter via [`SyncManager::add_peer`].
pub struct SyncManager {
    registry: Arc<dyn CovalueRegistry>,
    peers: RwLock<HashMap<PeerId, Arc<PeerHandle>>>,
}

impl SyncManager {
    /// Build a manager backed by `registry`.
    pub fn new(registry: Arc<dyn CovalueRegistry>) -> Self {
        Self {
            registry,
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a newly connected peer and, if its role makes it an
    /// unsolicited fan-out target, send it `known` for every covalue we
    /// already have loaded.
    #[tracing::instrument(skip(self, transport), fields(peer = %id, role = ?role))]
    pub async fn add_peer(&self, id: PeerId, role: PeerRole, transport: Arc<dyn SyncTransport>) {
        let handle = Arc::new(PeerHandle {
            role,
            transport,
            peer_known: Mutex::new(HashMap::new()),
            requested: Mutex::new(HashSet::new()),
        });
        self.peers.write().insert(id.clone(), handle.clone());

        if role.receives_unsolicited() {
            for covalue_id in self.registry.loaded_ids() {
                if let Some(known) = self.registry.known_state(covalue_id) {
                    let message = SyncMessage::Known {
                        id: known.header,
                        header: self.registry.header_for(covalue_id),
                        sessions: known.sessions,
                    };
                    if let Err(error) = handle.transport.send(message).await {
                        tracing::warn!(peer = %id, %error, "failed to send initial known");
                    }
                }
            }
        }
    }

    /// Drop a peer's handle, e.g. after its transport closes.
    pub fn remove_peer(&self, id: &PeerId) {
        self.peers.write().remove(id);
    }

    /// Announce our current state for `id` to every peer that should hear
    /// about it: unsolicited targets always, `client` peers only if they
    /// have previously shown interest in `id`.
    #[tracing::instrument(skip(self))]
    pub async fn announce(&self, id: CoId) {
        let Some(known) = self.registry.known_state(id) else {
            return;
        };
        let targets: Vec<(PeerId, Arc<PeerHandle>)> = self
            .peers
            .read()
            .iter()
            .filter(|(_, handle)| handle.role.receives_unsolicited() || handle.requested.lock().contains(&id))
            .map(|(peer_id, handle)| (peer_id.clone(), handle.clone()))
            .collect();

        let header = self.registry.header_for(id);
        for (peer_id, handle) in targets {
            let message = SyncMessage::Known {
                id: known.header,
                header: header.clone(),
                sessions: known.sessions.clone(),
            };
            if let Err(error) = handle.transport.send(message).await {
                tracing::warn!(peer = %peer_id, %error, "failed to announce known state");
            }
        }
    }

    /// Process one message received from `from`.
    #[tracing::instrument(skip(self, message), fields(peer = %from))]
    pub async fn handle_message(&self, from: &PeerId, message: SyncMessage) -> Result<(), CovalueError> {
        match message {
            SyncMessage::Known { id, header, sessions } => self.on_known(from, id, header, sessions).await,
            SyncMessage::Load { id, sessions } => self.on_load(from, id, sessions).await,
            SyncMessage::Content { id, header, new } => self.on_content(from, id, header, new).await,
            SyncMessage::Done { id } => {
                tracing::debug!(peer = %from, covalue = %id, "peer finished backfill");
                Ok(())
            }
        }
    }

    async fn on_known(
        &self,
        from: &PeerId,
        id: CoId,
        header: Option<covalue_content::header::Header>,
        peer_sessions: HashMap<SessionId, u64>,
    ) -> Result<(), CovalueError> {
        let Some(handle) = self.peer_handle(from) else {
            return Ok(());
        };
        handle.requested.lock().insert(id);
        handle.peer_known.lock().insert(id, peer_sessions.clone());

        if self.registry.known_state(id).is_none() {
            if let Some(header) = header {
                self.registry.ensure_header(id, header)?;
            }
        }
        let our_known = self.registry.known_state(id);
        let our_sessions: HashMap<SessionId, u64> =
            our_known.as_ref().map(|k| k.sessions.clone()).unwrap_or_default();

        let mut new_entries: HashMap<SessionId, Vec<SessionEntry>> = HashMap::new();
        for (session, &our_len) in &our_sessions {
            let peer_len = peer_sessions.get(session).copied().unwrap_or(0);
            if our_len > peer_len {
                let slice = self.registry.session_slice(id, *session, peer_len);
                if !slice.is_empty() {
                    new_entries.insert(*session, slice);
                }
            }
        }
        if !new_entries.is_empty() {
            let message = SyncMessage::Content {
                id,
                header: self.registry.header_for(id),
                new: new_entries,
            };
            handle.transport.send(message).await?;
        }

        let we_are_behind = our_known.is_none()
            || peer_sessions
                .iter()
                .any(|(session, &peer_len)| our_sessions.get(session).copied().unwrap_or(0) < peer_len);
        if we_are_behind {
            let message = SyncMessage::Load {
                id,
                sessions: our_sessions,
            };
            handle.transport.send(message).await?;
        }
        Ok(())
    }

    async fn on_load(
        &self,
        from: &PeerId,
        id: CoId,
        their_sessions: HashMap<SessionId, u64>,
    ) -> Result<(), CovalueError> {
        let Some(handle) = self.peer_handle(from) else {
            return Ok(());
        };
        handle.requested.lock().insert(id);

        let mut new_entries: HashMap<SessionId, Vec<SessionEntry>> = HashMap::new();
        if let Some(known) = self.registry.known_state(id) {
            for (session, &our_len) in &known.sessions {
                let from_index = their_sessions.get(session).copied().unwrap_or(0);
                if from_index < our_len {
                    let slice = self.registry.session_slice(id, *session, from_index);
                    if !slice.is_empty() {
                        new_entries.insert(*session, slice);
                    }
                }
            }
        }
        if !new_entries.is_empty() {
            let message = SyncMessage::Content {
                id,
                header: self.registry.header_for(id),
                new: new_entries,
            };
            handle.transport.send(message).await?;
        }
        Ok(())
    }

    async fn on_content(
        &self,
        from: &PeerId,
        id: CoId,
        header: Option<covalue_content::header::Header>,
        new: HashMap<SessionId, Vec<SessionEntry>>,
    ) -> Result<(), CovalueError> {
        if let Some(header) = header {
            if self.registry.known_state(id).is_none() {
                self.registry.ensure_header(id, header)?;
            }
        }

        let mut any_appended = false;
        for (session, entries) in new {
            let pending: Vec<PendingEntry> = entries
                .into_iter()
                .map(|entry| PendingEntry {
                    tx: entry.tx,
                    after_hash: entry.after_hash,
                    signature: entry.signature,
                })
                .collect();
            match self.registry.try_add_transactions(id, session, pending) {
                Ok(appended) => any_appended |= appended > 0,
                Err(error) => {
                    tracing::warn!(peer = %from, covalue = %id, session = %session, %error, "dropped content");
                }
            }
        }

        if let Some(handle) = self.peer_handle(from) {
            if let Some(known) = self.registry.known_state(id) {
                handle.peer_known.lock().insert(id, known.sessions);
            }
        }

        if any_appended {
            self.announce(id).await;
        }
        Ok(())
    }

    fn peer_handle(&self, id: &PeerId) -> Option<Arc<PeerHandle>> {
        self.peers.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerRole;
    use covalue_content::covalue::{AuthorizationOracle, Covalue, KnownState as ContentKnownState};
    use covalue_content::header::{CovalueType, Header, Ruleset};
    use covalue_content::merge::KeyLookup;
    use covalue_core::ids::AgentId;
    use covalue_core::random::OsRandom;
    use covalue_core::Role;
    use covalue_crypto::AgentSecret;
    use covalue_journal::{SessionLog, Transaction};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    struct NoKeys;
    impl KeyLookup for NoKeys {
        fn key_for(&self, _key_id: covalue_core::ids::KeyId) -> Option<covalue_crypto::KeySecret> {
            None
        }
    }

    struct AllowAll;
    impl AuthorizationOracle for AllowAll {
        fn role_at(&self, _group: CoId, _agent: AgentId, _at: u64) -> Option<Role> {
            Some(Role::Admin)
        }
    }

    struct InMemoryRegistry {
        covalue: StdMutex<Covalue>,
    }

    impl CovalueRegistry for InMemoryRegistry {
        fn known_state(&self, _id: CoId) -> Option<ContentKnownState> {
            let covalue = self.covalue.lock().unwrap();
            covalue.id().ok().map(|_| covalue.known_state())
        }

        fn header_for(&self, _id: CoId) -> Option<Header> {
            Some(self.covalue.lock().unwrap().header().clone())
        }

        fn session_slice(&self, _id: CoId, session: SessionId, from_index: u64) -> Vec<SessionEntry> {
            self.covalue.lock().unwrap().session_slice(session, from_index).to_vec()
        }

        fn ensure_header(&self, _id: CoId, _header: Header) -> Result<(), CovalueError> {
            Ok(())
        }

        fn try_add_transactions(
            &self,
            _id: CoId,
            session: SessionId,
            entries: Vec<PendingEntry>,
        ) -> Result<usize, CovalueError> {
            self.covalue.lock().unwrap().try_add_transactions(session, entries, &AllowAll)
        }

        fn loaded_ids(&self) -> Vec<CoId> {
            self.covalue.lock().unwrap().id().ok().into_iter().collect()
        }
    }

    struct ChannelTransport {
        outbound: mpsc::UnboundedSender<SyncMessage>,
    }

    #[async_trait::async_trait]
    impl SyncTransport for ChannelTransport {
        async fn send(&self, message: SyncMessage) -> Result<(), CovalueError> {
            self.outbound
                .send(message)
                .map_err(|_| CovalueError::internal("test channel closed"))
        }

        async fn recv(&self) -> Result<Option<SyncMessage>, CovalueError> {
            unreachable!("test transport is send-only")
        }
    }

    fn unsafe_header() -> Header {
        Header {
            covalue_type: CovalueType::Comap,
            ruleset: Ruleset::UnsafeAllowAll,
            meta: None,
            created_at: 0,
            uniqueness_salt: [0u8; 16],
        }
    }

    fn covalue_with_one_write() -> Covalue {
        let secret = AgentSecret::generate(&OsRandom);
        let session = SessionId::new(secret.id(), 0);
        let tx = Transaction::Trusting {
            changes: vec![serde_json::json!({"op": "set", "key": "k", "value": "v"})],
            made_at: 1,
        };
        let (after_hash, signature) = {
            let mut scratch = SessionLog::new(session);
            scratch.sign(tx.clone(), &secret).unwrap()
        };
        let mut covalue = Covalue::new(unsafe_header());
        covalue
            .try_add_transactions(
                session,
                vec![PendingEntry { tx, after_hash, signature }],
                &AllowAll,
            )
            .unwrap();
        covalue
    }

    #[tokio::test]
    async fn known_from_a_behind_peer_triggers_content() {
        let covalue = covalue_with_one_write();
        let id = covalue.id().unwrap();
        let registry = Arc::new(InMemoryRegistry { covalue: StdMutex::new(covalue) });
        let manager = SyncManager::new(registry);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = PeerId("peer-a".to_string());
        manager
            .add_peer(peer.clone(), PeerRole::Server, Arc::new(ChannelTransport { outbound: tx }))
            .await;

        manager
            .handle_message(
                &peer,
                SyncMessage::Known {
                    id,
                    header: None,
                    sessions: HashMap::new(),
                },
            )
            .await
            .unwrap();

        let sent = rx.recv().await.unwrap();
        match sent {
            SyncMessage::Content { new, .. } => assert_eq!(new.values().map(Vec::len).sum::<usize>(), 1),
            other => panic!("expected Content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn content_from_a_peer_is_applied_and_reannounced() {
        let covalue = Covalue::new(unsafe_header());
        let id = covalue.id().unwrap();
        let registry = Arc::new(InMemoryRegistry { covalue: StdMutex::new(covalue) });
        let manager = SyncManager::new(registry.clone());

        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let peer_a = PeerId("peer-a".to_string());
        manager
            .add_peer(peer_a.clone(), PeerRole::Server, Arc::new(ChannelTransport { outbound: tx_a }))
            .await;

        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let peer_b = PeerId("peer-b".to_string());
        manager
            .add_peer(peer_b.clone(), PeerRole::Server, Arc::new(ChannelTransport { outbound: tx_b }))
            .await;

        let secret = AgentSecret::generate(&OsRandom);
        let session = SessionId::new(secret.id(), 0);
        let tx = Transaction::Trusting {
            changes: vec![serde_json::json!({"op": "set", "key": "k", "value": "v"})],
            made_at: 1,
        };
        let (after_hash, signature) = {
            let mut scratch = SessionLog::new(session);
            scratch.sign(tx.clone(), &secret).unwrap()
        };
        let mut new = HashMap::new();
        new.insert(
            session,
            vec![SessionEntry { tx, after_hash, signature }],
        );

        manager
            .handle_message(&peer_a, SyncMessage::Content { id, header: None, new })
            .await
            .unwrap();

        assert_eq!(registry.known_state(id).unwrap().sessions.get(&session), Some(&1));
        let reannounced = rx_b.recv().await.unwrap();
        assert!(matches!(reannounced, SyncMessage::Known { .. }));
    }
}

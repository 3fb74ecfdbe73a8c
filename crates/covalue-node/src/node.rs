//! The node: account/group lifecycle, loading, and live queries, wiring the
//! registry, the sync manager, and the session lock into one handle.

use crate::config::NodeConfig;
use crate::registry::{BootstrapOracle, InMemoryRegistry, NoOracle};
use crate::session_lock::{InMemorySessionLocker, SessionLocker};
use covalue_auth::GroupWriter;
use covalue_content::header::{CovalueType, Header, Ruleset};
use covalue_content::Content;
use covalue_core::ids::{AgentId, CoId, SessionId};
use covalue_core::{Clock, CovalueError, Role, SecureRandom, SystemClock};
use covalue_core::random::OsRandom;
use covalue_crypto::AgentSecret;
use covalue_sync::{PeerId, PeerRole, SyncManager, SyncTransport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{timeout, Duration};

/// Handle returned by [`Node::with_newly_created_account`].
pub struct NewAccount {
    /// The running node.
    pub node: Node,
    /// The account covalue's id.
    pub account_id: CoId,
    /// The agent secret speaking for this account's first session.
    pub account_secret: AgentSecret,
    /// The session established for `account_secret`.
    pub session_id: SessionId,
    /// The account's profile covalue.
    pub profile_id: CoId,
}

/// A running node: the local covalue table, the sync manager fanning
/// changes out to connected peers, and the effects (clock, randomness,
/// session lock) every write goes through.
pub struct Node {
    registry: Arc<InMemoryRegistry>,
    sync: Arc<SyncManager>,
    session_locker: Arc<dyn SessionLocker>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn SecureRandom>,
    config: NodeConfig,
    changed: broadcast::Sender<CoId>,
    /// Background protocol loops spawned by [`Self::add_peer`], kept so
    /// [`Self::done`] can tear them down along with their peer's channel.
    peer_tasks: Mutex<HashMap<PeerId, tokio::task::JoinHandle<()>>>,
    /// `(account, slot)` pairs acquired through [`Self::establish_session`],
    /// released by [`Self::done`].
    sessions: Mutex<Vec<(AgentId, u64)>>,
}

fn random_salt(rng: &dyn SecureRandom) -> [u8; 16] {
    let mut salt = [0u8; 16];
    rng.fill(&mut salt);
    salt
}

impl Node {
    /// Build a fresh node from `config`, with production effects
    /// (`SystemClock`, OS randomness, an in-process session lock).
    pub fn new(config: NodeConfig) -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        let sync = Arc::new(SyncManager::new(registry.clone()));
        let (changed, _) = broadcast::channel(1024);
        Self {
            registry,
            sync,
            session_locker: Arc::new(InMemorySessionLocker::new()),
            clock: Arc::new(SystemClock),
            rng: Arc::new(OsRandom),
            config,
            changed,
            peer_tasks: Mutex::new(HashMap::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// This node's sync manager, for wiring up peer transports.
    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    /// This node's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// This node's covalue table, for callers creating ad hoc
    /// covalues outside the account/group lifecycle (plain maps, lists,
    /// streams a group or account then references by id).
    pub fn registry(&self) -> &Arc<InMemoryRegistry> {
        &self.registry
    }

    /// Notify local subscribers and peers that `id` changed, after a
    /// caller has written to it directly through [`Self::registry`].
    pub async fn notify_changed(&self, id: CoId) {
        let _ = self.changed.send(id);
        self.sync.announce(id).await;
    }

    /// Connect a new peer and let the sync manager drive its protocol
    /// loop until the channel closes or goes idle past the configured
    /// timeout.
    pub async fn add_peer(&self, id: PeerId, role: PeerRole, transport: Arc<dyn SyncTransport>) {
        self.sync.add_peer(id.clone(), role, transport.clone()).await;
        let sync = self.sync.clone();
        let changed = self.changed.clone();
        let idle = Duration::from_millis(self.config.sync_idle_timeout_ms);
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            loop {
                match timeout(idle, transport.recv()).await {
                    Ok(Ok(Some(message))) => {
                        let covalue_id = message.covalue_id();
                        if let Err(error) = sync.handle_message(&id, message).await {
                            tracing::warn!(peer = %id, %error, "dropped message");
                        }
                        let _ = changed.send(covalue_id);
                    }
                    Ok(Ok(None)) | Err(_) => {
                        tracing::debug!(peer = %id, "peer channel closed or idle");
                        sync.remove_peer(&id);
                        break;
                    }
                    Ok(Err(error)) => {
                        tracing::warn!(peer = %id, %error, "peer channel error");
                        sync.remove_peer(&id);
                        break;
                    }
                }
            }
        });
        self.peer_tasks.lock().insert(task_id, handle);
    }

    fn establish_session(&self, account: AgentId) -> Result<SessionId, CovalueError> {
        let slot = self.session_locker.acquire(account, self.config.session_lock_slots)?;
        self.sessions.lock().push((account, slot));
        Ok(SessionId::new(account, slot))
    }

    /// Close every peer channel and release every session lock this node
    /// holds. After `done()`, the node's background protocol loops have
    /// been aborted and its acquired session slots are free for another
    /// handle (in this process or another) to reacquire.
    pub fn done(&self) {
        for (id, handle) in self.peer_tasks.lock().drain() {
            handle.abort();
            self.sync.remove_peer(&id);
        }
        for (account, slot) in self.sessions.lock().drain(..) {
            self.session_locker.release(account, slot);
        }
    }

    /// Generate (or adopt) an agent, create its account covalue and profile
    /// subcovalue, and establish its first session.
    pub fn with_newly_created_account(
        config: NodeConfig,
        name: &str,
        initial_agent_secret: Option<AgentSecret>,
    ) -> Result<NewAccount, CovalueError> {
        let node = Self::new(config);
        let account_secret = initial_agent_secret.unwrap_or_else(|| AgentSecret::generate(node.rng.as_ref()));
        let session_id = node.establish_session(account_secret.id())?;
        let now = node.clock.now_millis();

        let account_header = Header {
            covalue_type: CovalueType::Comap,
            ruleset: Ruleset::Account,
            meta: None,
            created_at: now,
            uniqueness_salt: random_salt(node.rng.as_ref()),
        };
        let account_id = node.registry.create(account_header)?;
        node.registry.append_trusting(
            account_id,
            session_id,
            &account_secret,
            now,
            vec![serde_json::json!({"op": "set", "key": account_secret.id().to_string(), "value": true})],
            &NoOracle,
        )?;

        let profile_header = Header {
            covalue_type: CovalueType::Comap,
            ruleset: Ruleset::UnsafeAllowAll,
            meta: None,
            created_at: now,
            uniqueness_salt: random_salt(node.rng.as_ref()),
        };
        let profile_id = node.registry.create(profile_header)?;
        node.registry.append_trusting(
            profile_id,
            session_id,
            &account_secret,
            now,
            vec![serde_json::json!({"op": "set", "key": "name", "value": name})],
            &NoOracle,
        )?;
        node.registry.append_trusting(
            account_id,
            session_id,
            &account_secret,
            now,
            vec![serde_json::json!({"op": "set", "key": "profile", "value": profile_id.to_string()})],
            &NoOracle,
        )?;

        let _ = node.changed.send(account_id);
        let _ = node.changed.send(profile_id);

        Ok(NewAccount {
            node,
            account_id,
            account_secret,
            session_id,
            profile_id,
        })
    }

    /// Load an account covalue from connected peers rather than creating a
    /// new one, waiting up to the sync idle timeout for content to arrive.
    pub async fn with_loaded_account(
        config: NodeConfig,
        account_id: CoId,
        account_secret: AgentSecret,
        peers: Vec<(PeerId, Arc<dyn SyncTransport>)>,
    ) -> Result<(Self, SessionId), CovalueError> {
        let node = Self::new(config);
        let session_id = node.establish_session(account_secret.id())?;
        for (peer_id, transport) in peers {
            node.add_peer(peer_id, PeerRole::Server, transport).await;
        }
        match node.load(account_id).await? {
            Content::Map(_) => Ok((node, session_id)),
            _ => Err(CovalueError::Unavailable { id: account_id.to_string() }),
        }
    }

    /// Create a new group, bootstrapping `admin` as its first admin and
    /// minting the group's sealing keypair.
    pub fn create_group(&self, admin: &AgentSecret) -> Result<(CoId, AgentSecret), CovalueError> {
        let header = Header {
            covalue_type: CovalueType::Comap,
            ruleset: Ruleset::Group,
            meta: None,
            created_at: self.clock.now_millis(),
            uniqueness_salt: random_salt(self.rng.as_ref()),
        };
        let group_id = self.registry.create(header)?;
        let group_identity = AgentSecret::generate(self.rng.as_ref());
        let writer = GroupWriter {
            admin,
            group_identity: &group_identity,
            clock: self.clock.as_ref(),
            rng: self.rng.as_ref(),
        };
        self.registry.with_self_governing(group_id, |group, _oracle| {
            writer.add_member(group, self.registry.keys(), &BootstrapOracle, admin.id(), Role::Admin)
        })??;
        let _ = self.changed.send(group_id);
        Ok((group_id, group_identity))
    }

    /// Return a loaded covalue's current content if present, waiting for
    /// peers to supply it (via `known`/`load`) up to the sync idle timeout
    /// otherwise.
    pub async fn load(&self, id: CoId) -> Result<Content, CovalueError> {
        if let Some(content) = self.registry.content(id) {
            return Ok(content);
        }
        self.sync.announce(id).await;
        let mut receiver = self.changed.subscribe();
        let idle = Duration::from_millis(self.config.sync_idle_timeout_ms);
        let deadline = tokio::time::Instant::now() + idle;
        loop {
            if let Some(content) = self.registry.content(id) {
                return Ok(content);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(CovalueError::Unavailable { id: id.to_string() });
            }
            match timeout(remaining, receiver.recv()).await {
                Ok(Ok(changed_id)) if changed_id == id => continue,
                Ok(Ok(_)) => continue,
                Ok(Err(_)) | Err(_) => return Err(CovalueError::Unavailable { id: id.to_string() }),
            }
        }
    }

    /// Subscribe to `id`'s materialized content, re-invoking `on_change`
    /// with a fresh snapshot after every local or synced mutation until
    /// the returned handle is dropped or [`Unsubscribe::cancel`] is called.
    /// `on_change` receives `None` while `id` has never been loaded.
    pub fn query<F>(&self, id: CoId, mut on_change: F) -> Unsubscribe
    where
        F: FnMut(Option<Content>) + Send + 'static,
    {
        let registry = self.registry.clone();
        let mut receiver = self.changed.subscribe();
        on_change(registry.content(id));
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(changed_id) if changed_id == id => on_change(registry.content(id)),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => on_change(registry.content(id)),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Unsubscribe { handle: Some(handle) }
    }

    /// Redeem an invite minted by `create_group`'s admin, adding `caller`
    /// at the role the invite encodes.
    pub fn accept_invite(
        &self,
        group_id: CoId,
        group_identity: &AgentSecret,
        admin: &AgentSecret,
        invite_secret: &AgentSecret,
        caller: AgentId,
    ) -> Result<Role, CovalueError> {
        let writer = GroupWriter {
            admin,
            group_identity,
            clock: self.clock.as_ref(),
            rng: self.rng.as_ref(),
        };
        let role = self.registry.with_self_governing(group_id, |group, oracle| {
            writer.accept_invite(group, self.registry.keys(), oracle, invite_secret, caller)
        })??;
        let _ = self.changed.send(group_id);
        Ok(role)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.done();
    }
}

/// Cancels a [`Node::query`] subscription on drop or explicit call.
pub struct Unsubscribe {
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Unsubscribe {
    /// Stop receiving further callbacks.
    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::random::OsRandom;

    #[test]
    fn done_releases_session_locks_for_reacquisition() {
        let mut config = NodeConfig::default();
        config.session_lock_slots = 1;
        let node = Node::new(config);
        let account = AgentSecret::generate(&OsRandom).id();

        node.establish_session(account).unwrap();
        assert!(node.establish_session(account).is_err(), "only one slot configured");

        node.done();

        node.establish_session(account)
            .expect("done() should have released the slot held above");
    }

    #[tokio::test]
    async fn done_clears_tracked_peer_tasks() {
        let node = Node::new(NodeConfig::default());
        let (transport, _other) = covalue_testkit::duplex_pair();
        node.add_peer(PeerId("peer-a".to_string()), PeerRole::Peer, Arc::new(transport))
            .await;
        assert_eq!(node.peer_tasks.lock().len(), 1);

        node.done();

        assert!(node.peer_tasks.lock().is_empty());
        assert!(node.sessions.lock().is_empty());
    }
}

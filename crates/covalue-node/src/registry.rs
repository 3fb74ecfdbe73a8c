//! The in-memory table of loaded covalues, and the [`covalue_sync::CovalueRegistry`]
//! / key-lookup / group-lookup seams over it.

use covalue_auth::{GroupLookup, GroupOracle};
use covalue_content::covalue::{AuthorizationOracle, Covalue, KnownState, PendingEntry};
use covalue_content::header::Header;
use covalue_content::merge::KeyLookup;
use covalue_content::Content;
use covalue_core::ids::{AgentId, CoId, KeyId, SessionId};
use covalue_core::{CovalueError, Role};
use covalue_crypto::KeySecret;
use covalue_journal::SessionEntry;
use covalue_sync::CovalueRegistry;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read keys this node currently holds, across every group it has resolved
/// one from. Shared by every covalue's materialization.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: RwLock<HashMap<KeyId, KeySecret>>,
}

impl KeyStore {
    /// An empty key store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `secret` under its own id, so future materialization can
    /// decrypt transactions sealed to it.
    pub fn insert(&self, secret: KeySecret) {
        self.keys.write().insert(secret.id(), secret);
    }
}

impl KeyLookup for KeyStore {
    fn key_for(&self, key_id: KeyId) -> Option<KeySecret> {
        self.keys.read().get(&key_id).cloned()
    }
}

/// A read-only view of the covalue table that authorizes against a single
/// covalue's own (not-yet-updated) content when that covalue is
/// self-governing, and against the table otherwise — see
/// [`InMemoryRegistry::try_add_transactions`] for why this split exists.
struct Lookup<'a> {
    table: &'a HashMap<CoId, Covalue>,
    self_governing: Option<(CoId, &'a Covalue)>,
}

impl<'a> GroupLookup for Lookup<'a> {
    fn group(&self, id: CoId) -> Option<&Covalue> {
        if let Some((self_id, covalue)) = self.self_governing {
            if self_id == id {
                return Some(covalue);
            }
        }
        self.table.get(&id)
    }
}

/// An oracle that authorizes everything — used only for the single
/// bootstrap write that makes a brand-new group's creator its first admin,
/// before any role entry exists for anyone to be checked against.
pub struct BootstrapOracle;

impl AuthorizationOracle for BootstrapOracle {
    fn role_at(&self, _group: CoId, _agent: AgentId, _at: u64) -> Option<Role> {
        Some(Role::Admin)
    }
}

/// An oracle that authorizes nothing — used for rulesets that never
/// consult it (`unsafeAllowAll`, `account`), where passing it is a
/// formality `try_add_transactions` skips over.
pub struct NoOracle;

impl AuthorizationOracle for NoOracle {
    fn role_at(&self, _group: CoId, _agent: AgentId, _at: u64) -> Option<Role> {
        None
    }
}

/// Every covalue this node has loaded, plus the keys it can decrypt with.
pub struct InMemoryRegistry {
    table: RwLock<HashMap<CoId, Covalue>>,
    keys: KeyStore,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            keys: KeyStore::new(),
        }
    }

    /// This node's key store, for resolving and caching group read keys.
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Start a brand-new covalue from `header`, installing it empty.
    pub fn create(&self, header: Header) -> Result<CoId, CovalueError> {
        let id = header.id()?;
        self.table.write().entry(id).or_insert_with(|| Covalue::new(header));
        Ok(id)
    }

    /// Whether `id` has been loaded (even if empty).
    pub fn contains(&self, id: CoId) -> bool {
        self.table.read().contains_key(&id)
    }

    /// The covalue's current materialized content, or `None` if not loaded.
    pub fn content(&self, id: CoId) -> Option<Content> {
        let mut table = self.table.write();
        let covalue = table.get_mut(&id)?;
        Some(covalue.get_current_content(&self.keys).clone())
    }

    /// Append a locally authored transaction to `id`'s session, replaying
    /// the session's existing tail so the hash chain lines up — the same
    /// pattern `covalue-auth::group::GroupWriter` uses for group writes.
    pub fn append_trusting(
        &self,
        id: CoId,
        session: SessionId,
        signer: &covalue_crypto::AgentSecret,
        made_at: u64,
        changes: Vec<serde_json::Value>,
        oracle: &dyn AuthorizationOracle,
    ) -> Result<(), CovalueError> {
        let mut table = self.table.write();
        let covalue = table
            .get_mut(&id)
            .ok_or_else(|| CovalueError::invalid(format!("{id} is not loaded")))?;
        let tx = covalue_journal::Transaction::Trusting { changes, made_at };
        let (after_hash, signature) = {
            let mut scratch = covalue_journal::SessionLog::new(session);
            for entry in covalue.session_slice(session, 0) {
                scratch.try_add(entry.tx.clone(), entry.after_hash, entry.signature)?;
            }
            scratch.sign(tx.clone(), signer)?
        };
        covalue.try_add_transactions(
            session,
            vec![PendingEntry { tx, after_hash, signature }],
            oracle,
        )?;
        Ok(())
    }

    /// Run `f` against `id`'s covalue, treating it as self-governing for
    /// the duration of the call (so `covalue-auth` group writes to a
    /// brand-new group can check roles against the group's own
    /// not-yet-committed content rather than a copy already evicted from
    /// the table to satisfy the borrow checker).
    pub fn with_self_governing<R>(
        &self,
        id: CoId,
        f: impl FnOnce(&mut Covalue, &dyn AuthorizationOracle) -> R,
    ) -> Result<R, CovalueError> {
        let mut table = self.table.write();
        let mut covalue = table
            .remove(&id)
            .ok_or_else(|| CovalueError::invalid(format!("{id} is not loaded")))?;
        let lookup = Lookup {
            table: &table,
            self_governing: Some((id, &covalue)),
        };
        let oracle = GroupOracle { groups: &lookup, keys: &self.keys };
        let result = f(&mut covalue, &oracle);
        table.insert(id, covalue);
        Ok(result)
    }
}

impl CovalueRegistry for InMemoryRegistry {
    fn known_state(&self, id: CoId) -> Option<KnownState> {
        let table = self.table.read();
        let covalue = table.get(&id)?;
        Some(covalue.known_state())
    }

    fn header_for(&self, id: CoId) -> Option<Header> {
        self.table.read().get(&id).map(|covalue| covalue.header().clone())
    }

    fn session_slice(&self, id: CoId, session: SessionId, from_index: u64) -> Vec<SessionEntry> {
        self.table
            .read()
            .get(&id)
            .map(|covalue| covalue.session_slice(session, from_index).to_vec())
            .unwrap_or_default()
    }

    fn ensure_header(&self, id: CoId, header: Header) -> Result<(), CovalueError> {
        let mut table = self.table.write();
        if table.contains_key(&id) {
            return Ok(());
        }
        let computed = header.id()?;
        if computed != id {
            return Err(CovalueError::InvalidHeader {
                message: format!("header hashes to {computed}, expected {id}"),
            });
        }
        table.insert(id, Covalue::new(header));
        Ok(())
    }

    fn try_add_transactions(
        &self,
        id: CoId,
        session: SessionId,
        entries: Vec<PendingEntry>,
    ) -> Result<usize, CovalueError> {
        let mut table = self.table.write();
        let mut covalue = table
            .remove(&id)
            .ok_or_else(|| CovalueError::invalid(format!("{id} is not loaded")))?;
        let lookup = Lookup {
            table: &table,
            self_governing: Some((id, &covalue)),
        };
        let oracle = GroupOracle { groups: &lookup, keys: &self.keys };
        let result = covalue.try_add_transactions(session, entries, &oracle);
        table.insert(id, covalue);
        result
    }

    fn loaded_ids(&self) -> Vec<CoId> {
        self.table.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_content::header::{CovalueType, Ruleset};
    use covalue_core::random::OsRandom;
    use covalue_crypto::AgentSecret;

    #[test]
    fn create_then_append_then_read_content() {
        let registry = InMemoryRegistry::new();
        let header = Header {
            covalue_type: CovalueType::Comap,
            ruleset: Ruleset::UnsafeAllowAll,
            meta: None,
            created_at: 0,
            uniqueness_salt: [1u8; 16],
        };
        let id = registry.create(header).unwrap();
        let secret = AgentSecret::generate(&OsRandom);
        let session = SessionId::new(secret.id(), 0);
        registry
            .append_trusting(
                id,
                session,
                &secret,
                1,
                vec![serde_json::json!({"op": "set", "key": "k", "value": "v"})],
                &NoOracle,
            )
            .unwrap();

        match registry.content(id).unwrap() {
            Content::Map(map) => assert_eq!(map.get("k"), Some(&serde_json::json!("v"))),
            other => panic!("expected Map, got {other:?}"),
        }
    }

    #[test]
    fn unknown_covalue_append_errors() {
        let registry = InMemoryRegistry::new();
        let secret = AgentSecret::generate(&OsRandom);
        let session = SessionId::new(secret.id(), 0);
        let result = registry.append_trusting(CoId::from_hash([9u8; 32]), session, &secret, 1, vec![], &NoOracle);
        assert!(result.is_err());
    }
}

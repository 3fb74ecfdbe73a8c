//! `Covalue`: a header plus the per-session logs that mutate it, with a
//! materialization cache over the deterministic merge order.

use crate::crdt::Content;
use crate::header::{Header, Ruleset};
use crate::merge::{merge_sessions, KeyLookup};
use covalue_core::ids::{AgentId, CoId, SessionId};
use covalue_core::{CovalueError, Role};
use covalue_journal::{SessionLog, Transaction};
use std::collections::HashMap;

/// What a peer reports it already has for a covalue, used to compute sync diffs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownState {
    /// The covalue's id.
    pub header: CoId,
    /// Each session's current entry count.
    pub sessions: HashMap<SessionId, u64>,
}

/// Answers "does `agent` hold at least `minimum` role in `group`, as of
/// `at`?" — the hook `covalue-content` calls into group/permission state
/// without depending on the crate that materializes it. A real
/// implementation backs this with a `Covalue` whose own content is a group
/// (role/key/invite map); tests can stub it directly.
pub trait AuthorizationOracle {
    /// Look up `agent`'s role in `group` at time `at`, if it holds one.
    fn role_at(&self, group: CoId, agent: AgentId, at: u64) -> Option<Role>;
}

/// One signed, hash-chained entry pending insertion into a session log.
pub struct PendingEntry {
    /// The transaction itself.
    pub tx: Transaction,
    /// The hash chain value after this entry.
    pub after_hash: [u8; 32],
    /// The session's signature over this entry.
    pub signature: covalue_crypto::Signature,
}

/// A covalue: its immutable header plus the mutable session logs whose
/// merge produces its current content.
pub struct Covalue {
    header: Header,
    sessions: HashMap<SessionId, SessionLog>,
    /// `(total entry count across all sessions, materialized content)` —
    /// invalidated whenever that count no longer matches.
    cache: Option<(u64, Content)>,
}

impl Covalue {
    /// Start a new, empty covalue from its header.
    pub fn new(header: Header) -> Self {
        Self {
            header,
            sessions: HashMap::new(),
            cache: None,
        }
    }

    /// This covalue's content-addressed id.
    pub fn id(&self) -> Result<CoId, CovalueError> {
        self.header.id()
    }

    /// The covalue's header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The raw per-session logs, for callers that need to fold a custom
    /// point-in-time view (e.g. group role history) rather than the
    /// cached current materialization.
    pub fn sessions(&self) -> &HashMap<SessionId, SessionLog> {
        &self.sessions
    }

    /// The group governing writes to this covalue, if its ruleset names
    /// one: `ownedByGroup` names an external group; `group` means the
    /// covalue governs itself.
    pub fn governing_group(&self) -> Option<CoId> {
        match &self.header.ruleset {
            Ruleset::OwnedByGroup { group } => Some(*group),
            Ruleset::Group => self.id().ok(),
            Ruleset::UnsafeAllowAll | Ruleset::Account => None,
        }
    }

    fn required_role(&self) -> Option<Role> {
        match &self.header.ruleset {
            // A group covalue is its own permission record; only admins may
            // change it.
            Ruleset::Group => Some(Role::Admin),
            Ruleset::OwnedByGroup { .. } => Some(Role::Writer),
            Ruleset::UnsafeAllowAll | Ruleset::Account => None,
        }
    }

    /// Append `entries` to `session_id`'s log, after checking that its
    /// agent was authorized to write at each entry's `madeAt`. Entries that
    /// turn out to be replays of already-seen transactions are accepted as
    /// no-ops rather than errors; any other rejection (bad hash chain, bad
    /// signature, missing authorization) aborts the whole batch and leaves
    /// the log untouched for the entries not yet applied.
    pub fn try_add_transactions(
        &mut self,
        session_id: SessionId,
        entries: Vec<PendingEntry>,
        oracle: &dyn AuthorizationOracle,
    ) -> Result<usize, CovalueError> {
        if let (Some(minimum), Some(group)) = (self.required_role(), self.governing_group()) {
            for entry in &entries {
                let role = oracle.role_at(group, session_id.agent, entry.tx.made_at());
                if !role.is_some_and(|role| role.at_least(minimum)) {
                    return Err(CovalueError::Unauthorized {
                        message: format!(
                            "{} lacks {:?} in {} at {}",
                            session_id,
                            minimum,
                            group,
                            entry.tx.made_at()
                        ),
                    });
                }
            }
        }

        let log = self
            .sessions
            .entry(session_id)
            .or_insert_with(|| SessionLog::new(session_id));

        let mut appended = 0;
        for entry in entries {
            match log.try_add(entry.tx, entry.after_hash, entry.signature)? {
                covalue_journal::AppendOutcome::Appended => appended += 1,
                covalue_journal::AppendOutcome::Duplicate => {}
            }
        }
        if appended > 0 {
            self.cache = None;
        }
        Ok(appended)
    }

    /// The covalue's current materialized content, recomputing it from the
    /// full merge order if any session has grown since the last call.
    pub fn get_current_content(&mut self, keys: &dyn KeyLookup) -> &Content {
        let total_len: u64 = self.sessions.values().map(SessionLog::len).sum();
        let stale = match &self.cache {
            Some((cached_len, _)) => *cached_len != total_len,
            None => true,
        };
        if stale {
            let mut content = Content::new_for(self.header.covalue_type);
            for merged in merge_sessions(&self.sessions, keys) {
                content.apply(&merged.change, merged.ctx);
            }
            self.cache = Some((total_len, content));
        }
        &self.cache.as_ref().expect("just populated above").1
    }

    /// What this covalue currently holds, for a sync peer's `known` message.
    pub fn known_state(&self) -> KnownState {
        KnownState {
            header: self.id().unwrap_or_else(|_| CoId::from_hash([0u8; 32])),
            sessions: self
                .sessions
                .iter()
                .map(|(session, log)| (*session, log.len()))
                .collect(),
        }
    }

    /// A session's current length, `0` if this covalue has never seen it.
    pub fn session_length(&self, session: SessionId) -> u64 {
        self.sessions.get(&session).map_or(0, SessionLog::len)
    }

    /// The slice of `session`'s entries from `from_index` onward, for
    /// answering a peer's `load`/sending a `content` message.
    pub fn session_slice(&self, session: SessionId, from_index: u64) -> &[covalue_journal::SessionEntry] {
        self.sessions
            .get(&session)
            .map(|log| log.slice(from_index))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::CovalueType;
    use crate::merge::KeyLookup;
    use covalue_core::ids::KeyId;
    use covalue_core::random::OsRandom;
    use covalue_crypto::AgentSecret;

    struct NoKeys;
    impl KeyLookup for NoKeys {
        fn key_for(&self, _key_id: KeyId) -> Option<covalue_crypto::KeySecret> {
            None
        }
    }

    struct AllowAll;
    impl AuthorizationOracle for AllowAll {
        fn role_at(&self, _group: CoId, _agent: AgentId, _at: u64) -> Option<Role> {
            Some(Role::Admin)
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

    #[test]
    fn unsafe_allow_all_never_consults_the_oracle() {
        struct DenyAll;
        impl AuthorizationOracle for DenyAll {
            fn role_at(&self, _group: CoId, _agent: AgentId, _at: u64) -> Option<Role> {
                None
            }
        }

        let mut covalue = Covalue::new(unsafe_header());
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

        let appended = covalue
            .try_add_transactions(
                session,
                vec![PendingEntry {
                    tx,
                    after_hash,
                    signature,
                }],
                &DenyAll,
            )
            .unwrap();
        assert_eq!(appended, 1);

        let content = covalue.get_current_content(&NoKeys);
        match content {
            Content::Map(map) => assert_eq!(map.get("k"), Some(&serde_json::json!("v"))),
            other => panic!("expected Map content, got {other:?}"),
        }
    }

    #[test]
    fn owned_by_group_rejects_writers_without_role() {
        struct DenyAll;
        impl AuthorizationOracle for DenyAll {
            fn role_at(&self, _group: CoId, _agent: AgentId, _at: u64) -> Option<Role> {
                None
            }
        }

        let header = Header {
            covalue_type: CovalueType::Comap,
            ruleset: Ruleset::OwnedByGroup {
                group: CoId::from_hash([1u8; 32]),
            },
            meta: None,
            created_at: 0,
            uniqueness_salt: [0u8; 16],
        };
        let mut covalue = Covalue::new(header);
        let secret = AgentSecret::generate(&OsRandom);
        let session = SessionId::new(secret.id(), 0);
        let tx = Transaction::Trusting {
            changes: vec![],
            made_at: 1,
        };
        let (after_hash, signature) = {
            let mut scratch = SessionLog::new(session);
            scratch.sign(tx.clone(), &secret).unwrap()
        };

        let result = covalue.try_add_transactions(
            session,
            vec![PendingEntry {
                tx,
                after_hash,
                signature,
            }],
            &DenyAll,
        );
        assert!(matches!(result, Err(CovalueError::Unauthorized { .. })));
    }

    #[test]
    fn cache_is_reused_until_a_new_transaction_is_appended() {
        let mut covalue = Covalue::new(unsafe_header());
        let secret = AgentSecret::generate(&OsRandom);
        let session = SessionId::new(secret.id(), 0);
        let tx = Transaction::Trusting {
            changes: vec![serde_json::json!({"op": "set", "key": "k", "value": "v1"})],
            made_at: 1,
        };
        let (after_hash, signature) = {
            let mut scratch = SessionLog::new(session);
            scratch.sign(tx.clone(), &secret).unwrap()
        };
        covalue
            .try_add_transactions(
                session,
                vec![PendingEntry {
                    tx,
                    after_hash,
                    signature,
                }],
                &AllowAll,
            )
            .unwrap();

        let _ = covalue.get_current_content(&NoKeys);
        assert!(covalue.cache.is_some());
        let cached_len = covalue.cache.as_ref().unwrap().0;
        assert_eq!(cached_len, 1);
    }
}

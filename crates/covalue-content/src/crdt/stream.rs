//! Stream: an unordered multiset partitioned by session, each session's own
//! pushes kept in the order they were made. Derived views (`perSession`,
//! `perAccount`, `last`) fold that partition without discarding the
//! partitioning itself.

use super::ApplyContext;
use covalue_core::ids::{AgentId, SessionId};
use std::collections::BTreeMap;

/// One session's linear push sequence within a stream.
#[derive(Debug, Clone, Default)]
pub struct SessionEntries {
    values: Vec<serde_json::Value>,
}

impl SessionEntries {
    /// All values this session has pushed, oldest first.
    pub fn all(&self) -> &[serde_json::Value] {
        &self.values
    }

    /// The most recently pushed value, if any.
    pub fn last(&self) -> Option<&serde_json::Value> {
        self.values.last()
    }
}

/// Append-only multiset content, partitioned by writing session.
#[derive(Debug, Clone, Default)]
pub struct StreamContent {
    by_session: BTreeMap<SessionId, SessionEntries>,
}

impl StreamContent {
    /// Build an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one change into this stream.
    pub fn apply(&mut self, change: &super::Change, ctx: ApplyContext) {
        match change {
            super::Change::Push { value } => {
                self.by_session
                    .entry(ctx.session)
                    .or_default()
                    .values
                    .push(value.clone());
            }
            _ => {
                tracing::warn!("ignoring non-stream change applied to a stream covalue");
            }
        }
    }

    /// This session's own sequence, if it has pushed anything.
    pub fn per_session(&self, session: SessionId) -> Option<&SessionEntries> {
        self.by_session.get(&session)
    }

    /// Every session that has pushed, keyed by session id.
    pub fn sessions(&self) -> impl Iterator<Item = (&SessionId, &SessionEntries)> {
        self.by_session.iter()
    }

    /// Fold every session belonging to `agent` into one sequence, ordered by
    /// session id — a stable but otherwise arbitrary tiebreak among an
    /// account's concurrent devices.
    pub fn per_account(&self, agent: AgentId) -> Vec<&serde_json::Value> {
        self.by_session
            .iter()
            .filter(|(session, _)| session.agent == agent)
            .flat_map(|(_, entries)| entries.values.iter())
            .collect()
    }

    /// The most recent push made by any session of `agent`.
    ///
    /// Since sessions don't carry a cross-session causal order, "most
    /// recent" is the caller's own current session's last push when
    /// `current` is supplied; otherwise the lexicographically last
    /// session's last value is used as a deterministic fallback.
    pub fn last_for_account(&self, agent: AgentId, current: Option<SessionId>) -> Option<&serde_json::Value> {
        if let Some(session) = current {
            if session.agent == agent {
                if let Some(value) = self.by_session.get(&session).and_then(SessionEntries::last) {
                    return Some(value);
                }
            }
        }
        self.by_session
            .iter()
            .filter(|(session, _)| session.agent == agent)
            .filter_map(|(_, entries)| entries.last())
            .last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::Change;

    fn ctx(session: SessionId, made_at: u64) -> ApplyContext {
        ApplyContext {
            session,
            made_at,
            tx_index: 0,
            change_seq: 0,
        }
    }

    fn session(nonce: u64) -> SessionId {
        SessionId::new(AgentId::new([7u8; 32], [7u8; 32]), nonce)
    }

    #[test]
    fn per_session_and_per_account_and_me_last_views() {
        let mut stream = StreamContent::new();
        let s = session(0);
        stream.apply(
            &Change::Push {
                value: serde_json::json!("hello"),
            },
            ctx(s, 1),
        );
        stream.apply(
            &Change::Push {
                value: serde_json::json!("world"),
            },
            ctx(s, 2),
        );

        assert_eq!(
            stream.per_session(s).unwrap().all(),
            &[serde_json::json!("hello"), serde_json::json!("world")]
        );
        assert_eq!(
            stream.per_account(s.agent),
            vec![&serde_json::json!("hello"), &serde_json::json!("world")]
        );
        assert_eq!(
            stream.last_for_account(s.agent, Some(s)),
            Some(&serde_json::json!("world"))
        );
    }

    #[test]
    fn per_account_folds_multiple_sessions_of_one_account() {
        let mut stream = StreamContent::new();
        let s1 = session(0);
        let s2 = session(1);
        stream.apply(
            &Change::Push {
                value: serde_json::json!("from-device-1"),
            },
            ctx(s1, 1),
        );
        stream.apply(
            &Change::Push {
                value: serde_json::json!("from-device-2"),
            },
            ctx(s2, 2),
        );
        let folded = stream.per_account(s1.agent);
        assert_eq!(folded.len(), 2);
    }
}

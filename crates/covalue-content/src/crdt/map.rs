//! Map: last-writer-wins per key under the session-interleaving merge order.

use super::{ApplyContext, Change};
use covalue_core::ids::AgentId;
use std::collections::BTreeMap;

/// One key's most recent edit, retained for UI/audit.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    /// Who made this edit.
    pub by: AgentId,
    /// When the edit was made (`madeAt`).
    pub made_at: u64,
    /// Index of the transaction that carried the edit, within its session.
    pub tx_index: u64,
}

/// One key's current state: either a live value or an explicit tombstone.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// The key currently holds `value`.
    Present(serde_json::Value),
    /// The key was explicitly deleted (`delete` is a change, not absence).
    Deleted,
}

/// Last-writer-wins map content.
#[derive(Debug, Clone, Default)]
pub struct MapContent {
    entries: BTreeMap<String, Entry>,
    last_edit: BTreeMap<String, Edit>,
}

impl MapContent {
    /// Build an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one change into this map. Later calls (in merge order) win
    /// ties over earlier ones for the same key — that is what makes this
    /// "last-writer-wins under the merge order" rather than under wall-clock
    /// arrival order.
    pub fn apply(&mut self, change: &Change, ctx: ApplyContext) {
        match change {
            Change::Set { key, value } => {
                self.entries.insert(key.clone(), Entry::Present(value.clone()));
                self.last_edit.insert(
                    key.clone(),
                    Edit {
                        by: ctx.by(),
                        made_at: ctx.made_at,
                        tx_index: ctx.tx_index,
                    },
                );
            }
            Change::Delete { key } => {
                self.entries.insert(key.clone(), Entry::Deleted);
                self.last_edit.insert(
                    key.clone(),
                    Edit {
                        by: ctx.by(),
                        made_at: ctx.made_at,
                        tx_index: ctx.tx_index,
                    },
                );
            }
            _ => {
                tracing::warn!("ignoring non-map change applied to a map covalue");
            }
        }
    }

    /// The current value of `key`, or `None` if absent or deleted.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        match self.entries.get(key) {
            Some(Entry::Present(value)) => Some(value),
            _ => None,
        }
    }

    /// Whether `key` currently holds a live (non-deleted) value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate over all live (non-deleted) keys and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.entries.iter().filter_map(|(k, v)| match v {
            Entry::Present(value) => Some((k.as_str(), value)),
            Entry::Deleted => None,
        })
    }

    /// The most recent edit recorded for `key`, present or deleted.
    pub fn last_edit_at(&self, key: &str) -> Option<&Edit> {
        self.last_edit.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::ids::SessionId;

    fn ctx(made_at: u64, session: SessionId) -> ApplyContext {
        ApplyContext {
            session,
            made_at,
            tx_index: 0,
            change_seq: 0,
        }
    }

    fn test_session() -> SessionId {
        SessionId::new(AgentId::new([1u8; 32], [2u8; 32]), 0)
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut map = MapContent::new();
        let session = test_session();
        map.apply(
            &Change::Set {
                key: "foo".into(),
                value: serde_json::json!("bar"),
            },
            ctx(1, session),
        );
        assert_eq!(map.get("foo"), Some(&serde_json::json!("bar")));
        assert_eq!(map.last_edit_at("foo").unwrap().by, session.agent);
    }

    #[test]
    fn delete_is_explicit_not_absence() {
        let mut map = MapContent::new();
        let session = test_session();
        map.apply(
            &Change::Set {
                key: "foo".into(),
                value: serde_json::json!("bar"),
            },
            ctx(1, session),
        );
        map.apply(&Change::Delete { key: "foo".into() }, ctx(2, session));
        assert_eq!(map.get("foo"), None);
        assert!(map.last_edit_at("foo").is_some());
    }

    #[test]
    fn later_merge_order_wins_over_earlier() {
        let mut map = MapContent::new();
        let session = test_session();
        map.apply(
            &Change::Set {
                key: "foo".into(),
                value: serde_json::json!("first"),
            },
            ctx(1, session),
        );
        map.apply(
            &Change::Set {
                key: "foo".into(),
                value: serde_json::json!("second"),
            },
            ctx(2, session),
        );
        assert_eq!(map.get("foo"), Some(&serde_json::json!("second")));
    }
}

//! List (RGA-style): each element anchored to its insertion predecessor,
//! concurrent inserts at the same anchor ordered by `(madeAt, sessionID)`.

use super::{ApplyContext, Change, ElementId, Position};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Element {
    value: serde_json::Value,
    tombstoned: bool,
}

/// RGA-style ordered list content.
#[derive(Debug, Clone, Default)]
pub struct ListContent {
    elements: HashMap<ElementId, Element>,
    /// Children of each anchor, kept sorted ascending by `(madeAt,
    /// sessionID)`, the tiebreak for concurrent inserts at the same
    /// predecessor.
    children: HashMap<Position, Vec<ElementId>>,
}

impl ListContent {
    /// Build an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one change into this list.
    pub fn apply(&mut self, change: &Change, ctx: ApplyContext) {
        match change {
            Change::Insert { after, value } => {
                let id = ElementId {
                    made_at: ctx.made_at,
                    session: ctx.session,
                    seq: ctx.change_seq,
                };
                self.elements.insert(
                    id,
                    Element {
                        value: value.clone(),
                        tombstoned: false,
                    },
                );
                // Tiebreak on the session's rendered `<agentID>_session_<nonce>`
                // string (lexicographic), not `SessionId`'s derived `Ord` over
                // raw key bytes — see `covalue_content::merge` for why.
                let siblings = self.children.entry(*after).or_default();
                let pos = siblings
                    .binary_search_by(|existing| {
                        (existing.made_at, existing.session.to_string())
                            .cmp(&(id.made_at, id.session.to_string()))
                    })
                    .unwrap_or_else(|insert_at| insert_at);
                siblings.insert(pos, id);
            }
            Change::Remove { at } => {
                if let Some(element) = self.elements.get_mut(at) {
                    element.tombstoned = true;
                } else {
                    tracing::warn!(?at, "remove referenced an unknown list element");
                }
            }
            _ => {
                tracing::warn!("ignoring non-list change applied to a list covalue");
            }
        }
    }

    /// Render the list's current live values, in document order.
    pub fn values(&self) -> Vec<&serde_json::Value> {
        let mut out = Vec::with_capacity(self.elements.len());
        self.walk(Position::Start, &mut out);
        out
    }

    /// Number of live (non-tombstoned) elements.
    pub fn len(&self) -> usize {
        self.elements.values().filter(|e| !e.tombstoned).count()
    }

    /// Whether the list has no live elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn walk<'a>(&'a self, anchor: Position, out: &mut Vec<&'a serde_json::Value>) {
        let Some(children) = self.children.get(&anchor) else {
            return;
        };
        for child_id in children {
            let element = self
                .elements
                .get(child_id)
                .expect("children index always points at a live entry in `elements`");
            if !element.tombstoned {
                out.push(&element.value);
            }
            self.walk(Position::After(*child_id), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::ids::{AgentId, SessionId};

    fn ctx(made_at: u64, session: SessionId, seq: u32) -> ApplyContext {
        ApplyContext {
            session,
            made_at,
            tx_index: 0,
            change_seq: seq,
        }
    }

    fn session_a() -> SessionId {
        SessionId::new(AgentId::new([1u8; 32], [1u8; 32]), 0)
    }

    #[test]
    fn sequential_inserts_render_in_order() {
        let mut list = ListContent::new();
        let s = session_a();
        list.apply(
            &Change::Insert {
                after: Position::Start,
                value: serde_json::json!("a"),
            },
            ctx(1, s, 0),
        );
        let a_id = ElementId {
            made_at: 1,
            session: s,
            seq: 0,
        };
        list.apply(
            &Change::Insert {
                after: Position::After(a_id),
                value: serde_json::json!("b"),
            },
            ctx(2, s, 0),
        );
        assert_eq!(
            list.values(),
            vec![&serde_json::json!("a"), &serde_json::json!("b")]
        );
    }

    #[test]
    fn concurrent_inserts_at_same_anchor_order_by_made_at_then_session() {
        // Same agent, two sessions differing only by nonce 9 vs 10: as
        // `SessionId`'s derived byte `Ord`, 9 < 10, but as the rendered
        // `..._session_9` / `..._session_10` strings the spec's tiebreak
        // actually compares, "..._session_10" < "..._session_9" (`'1'` sorts
        // before `'9'` at the first differing character). This exercises
        // that divergence directly, rather than deferring to whatever the
        // implementation happens to produce.
        let agent = AgentId::new([4u8; 32], [4u8; 32]);
        let session_nine = SessionId::new(agent, 9);
        let session_ten = SessionId::new(agent, 10);
        assert!(session_nine < session_ten, "test assumes derived Ord orders by nonce");
        assert!(
            session_ten.to_string() < session_nine.to_string(),
            "test assumes lexicographic string order diverges from derived Ord here"
        );

        let mut list = ListContent::new();
        // Both "x" (session nonce 9) and "y" (session nonce 10) are
        // inserted after Start concurrently, at the same madeAt.
        list.apply(
            &Change::Insert {
                after: Position::Start,
                value: serde_json::json!("x"),
            },
            ctx(5, session_nine, 0),
        );
        list.apply(
            &Change::Insert {
                after: Position::Start,
                value: serde_json::json!("y"),
            },
            ctx(5, session_ten, 0),
        );

        // "y" (nonce 10) renders first: its session string sorts first.
        assert_eq!(
            list.values(),
            vec![&serde_json::json!("y"), &serde_json::json!("x")]
        );
    }

    #[test]
    fn remove_tombstones_without_removing_the_anchor() {
        let mut list = ListContent::new();
        let s = session_a();
        list.apply(
            &Change::Insert {
                after: Position::Start,
                value: serde_json::json!("a"),
            },
            ctx(1, s, 0),
        );
        let a_id = ElementId {
            made_at: 1,
            session: s,
            seq: 0,
        };
        list.apply(
            &Change::Insert {
                after: Position::After(a_id),
                value: serde_json::json!("b"),
            },
            ctx(2, s, 0),
        );
        list.apply(&Change::Remove { at: a_id }, ctx(3, s, 0));
        // "b" stays reachable through its anchor on the tombstoned "a".
        assert_eq!(list.values(), vec![&serde_json::json!("b")]);
        assert_eq!(list.len(), 1);
    }
}

//! CRDT content types: Map, List, Stream, BinaryStream.
//!
//! Each type exposes one method, `apply`, that folds a single [`Change`]
//! into its current state given the [`ApplyContext`] (which session/tx it
//! came from). The merge order itself — interleaving every session's
//! transactions by `(madeAt, sessionID)` — lives in `crate::merge`, not
//! here; these types only need to apply changes in whatever order they are
//! handed, because that order is already the deterministic merge order by
//! the time it reaches them.

pub mod binary_stream;
pub mod change;
pub mod list;
pub mod map;
pub mod stream;

pub use binary_stream::BinaryStreamContent;
pub use change::{BinaryStreamMeta, Change, ElementId, Position};
pub use list::ListContent;
pub use map::MapContent;
pub use stream::StreamContent;

use covalue_core::ids::SessionId;

/// Provenance of one change being folded into a content type: which
/// transaction it came from, so content types can retain "who, when, tx
/// pointer" for each mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyContext {
    /// The session whose transaction carried this change.
    pub session: SessionId,
    /// The transaction's `madeAt`.
    pub made_at: u64,
    /// Index of this transaction within its session log.
    pub tx_index: u64,
    /// Index of this change within its transaction's change list — the
    /// last component of a list element's [`ElementId`], since a
    /// transaction's `madeAt`/session alone can't disambiguate multiple
    /// `insert`s it carries.
    pub change_seq: u32,
}

impl ApplyContext {
    /// The agent that authored this change.
    pub fn by(&self) -> covalue_core::ids::AgentId {
        self.session.agent
    }
}

/// The dynamic shape a covalue's merged content takes: a tagged variant
/// rather than a family of static generic types, since which shape applies
/// is only known once the header is read.
#[derive(Debug, Clone, Default)]
pub enum Content {
    /// No content type has been determined yet (header not yet loaded).
    #[default]
    Unknown,
    /// Last-writer-wins map.
    Map(MapContent),
    /// RGA-style ordered list.
    List(ListContent),
    /// Per-session append-only multiset.
    Stream(StreamContent),
    /// Chunked binary upload stream.
    BinaryStream(BinaryStreamContent),
}

impl Content {
    /// Build the empty content value matching `covalue_type`.
    pub fn new_for(covalue_type: crate::header::CovalueType) -> Self {
        use crate::header::CovalueType;
        match covalue_type {
            CovalueType::Comap => Content::Map(MapContent::new()),
            CovalueType::Colist => Content::List(ListContent::new()),
            CovalueType::Costream => Content::Stream(StreamContent::new()),
            CovalueType::BinaryCostream => Content::BinaryStream(BinaryStreamContent::new()),
        }
    }

    /// Fold one change into this content, ignoring changes whose shape
    /// doesn't match (each content type already logs a warning for that).
    pub fn apply(&mut self, change: &Change, ctx: ApplyContext) {
        match self {
            Content::Unknown => {
                tracing::warn!("applying a change before the covalue's type is known");
            }
            Content::Map(map) => map.apply(change, ctx),
            Content::List(list) => list.apply(change, ctx),
            Content::Stream(stream) => stream.apply(change, ctx),
            Content::BinaryStream(binary) => binary.apply(change, ctx),
        }
    }
}

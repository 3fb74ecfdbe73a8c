//! `Change`: one CRDT operation inside a transaction.

use covalue_core::ids::SessionId;
use serde::{Deserialize, Serialize};

/// A position in a list, anchored to the element it was inserted after.
///
/// `Start` is the virtual head of the list. Every real element's position
/// is `After(element_id)` where `element_id` identifies the element it
/// followed at insertion time — the classic RGA anchor, which stays valid
/// even if that predecessor is later deleted (the tombstone keeps its slot
/// in the anchor chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Position {
    /// Insert at the very front of the list.
    Start,
    /// Insert immediately after the given element.
    After(ElementId),
}

/// The identity of one list element: unique because `(made_at, session)`
/// is the transaction's ordering key and `seq` disambiguates multiple
/// `insert`/`del` changes carried in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId {
    /// The inserting transaction's `madeAt`.
    pub made_at: u64,
    /// The inserting transaction's session.
    pub session: SessionId,
    /// Index of the `insert` change within its transaction.
    pub seq: u32,
}

/// Metadata carried by a binary stream's opening `start` change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryStreamMeta {
    /// MIME type of the binary payload.
    pub mime_type: String,
    /// Total size in bytes, if known up front.
    pub total_size_bytes: Option<u64>,
    /// Suggested file name, if any.
    pub file_name: Option<String>,
}

/// One CRDT operation. The containing transaction's privacy (trusting vs.
/// private) determines whether this change was ever visible in the clear
/// on the wire; `Change` itself carries no privacy flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Change {
    /// Map: last-writer-wins assignment of `key`.
    Set {
        /// The map key.
        key: String,
        /// The new value.
        value: serde_json::Value,
    },
    /// Map: an explicit tombstone for `key` (absence is not a delete).
    Delete {
        /// The map key.
        key: String,
    },
    /// List: insert `value` immediately after `after`.
    Insert {
        /// The anchor position this element follows.
        after: Position,
        /// The inserted value.
        value: serde_json::Value,
    },
    /// List: tombstone the element at `at`.
    Remove {
        /// The element being deleted.
        at: ElementId,
    },
    /// Stream: append `value` to this session's sequence.
    Push {
        /// The pushed value.
        value: serde_json::Value,
    },
    /// Binary stream: open a new chunked upload.
    Start {
        /// The upload's declared metadata.
        meta: BinaryStreamMeta,
    },
    /// Binary stream: one chunk of the payload.
    Chunk {
        /// Raw chunk bytes.
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    /// Binary stream: marks the upload complete.
    End,
}

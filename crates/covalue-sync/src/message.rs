//! The four-message wire protocol: `known`, `load`, `content`, `done`.

use covalue_content::header::Header;
use covalue_core::ids::{CoId, SessionId};
use covalue_journal::SessionEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One record exchanged on a peer's duplex sync channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SyncMessage {
    /// "Here is what I have for `id`."
    Known {
        /// The covalue this message concerns.
        id: CoId,
        /// The covalue's header, if the sender already has it.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        header: Option<Header>,
        /// Each session's length as seen by the sender.
        sessions: HashMap<SessionId, u64>,
    },
    /// "Send me `id` starting from these indices."
    Load {
        /// The covalue requested.
        id: CoId,
        /// The index to start each session from.
        sessions: HashMap<SessionId, u64>,
    },
    /// "Here are transactions you lacked."
    Content {
        /// The covalue these entries belong to.
        id: CoId,
        /// The header, attached when the receiver might not have it yet.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        header: Option<Header>,
        /// New entries per session, starting wherever the receiver's
        /// `known`/`load` indicated it was missing.
        new: HashMap<SessionId, Vec<SessionEntry>>,
    },
    /// Optional acknowledgement after a backfill completes.
    Done {
        /// The covalue that has finished backfilling.
        id: CoId,
    },
}

impl SyncMessage {
    /// The covalue id every variant carries.
    pub fn covalue_id(&self) -> CoId {
        match self {
            SyncMessage::Known { id, .. }
            | SyncMessage::Load { id, .. }
            | SyncMessage::Content { id, .. }
            | SyncMessage::Done { id, .. } => *id,
        }
    }
}

//! Binary stream: a chunked upload built from `start`, `chunk`, `end`
//! transactions, specialized from the same per-session stream shape.

use super::{ApplyContext, BinaryStreamMeta, Change};
use covalue_core::ids::SessionId;

/// Transactions carrying a single chunked upload are expected to stay under
/// this size; larger payloads should be split across multiple `chunk`
/// changes so no single transaction blocks the cooperative scheduler for
/// long.
pub const MAX_RECOMMENDED_TX_SIZE: usize = 100 * 1024;

/// The fully or partially assembled output of a binary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryChunks {
    /// Chunk payloads, in push order.
    pub chunks: Vec<Vec<u8>>,
    /// The MIME type declared by `start`.
    pub mime_type: String,
}

#[derive(Debug, Clone, Default)]
struct Upload {
    meta: Option<BinaryStreamMeta>,
    chunks: Vec<Vec<u8>>,
    ended: bool,
    /// The session whose `start` opened this upload: subsequent `chunk`s
    /// from other sessions are out of protocol and ignored.
    opened_by: Option<SessionId>,
}

/// Chunked binary upload content.
#[derive(Debug, Clone, Default)]
pub struct BinaryStreamContent {
    upload: Upload,
}

impl BinaryStreamContent {
    /// Build an empty (not-yet-started) binary stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one change into this upload.
    pub fn apply(&mut self, change: &Change, ctx: ApplyContext) {
        match change {
            Change::Start { meta } => {
                if self.upload.meta.is_some() {
                    tracing::warn!("ignoring duplicate start on an already-opened binary stream");
                    return;
                }
                self.upload.meta = Some(meta.clone());
                self.upload.opened_by = Some(ctx.session);
            }
            Change::Chunk { bytes } => {
                if self.upload.opened_by != Some(ctx.session) {
                    tracing::warn!("ignoring chunk from a session that did not open this upload");
                    return;
                }
                if self.upload.ended {
                    tracing::warn!("ignoring chunk received after end");
                    return;
                }
                self.upload.chunks.push(bytes.clone());
            }
            Change::End => {
                if self.upload.opened_by != Some(ctx.session) {
                    tracing::warn!("ignoring end from a session that did not open this upload");
                    return;
                }
                self.upload.ended = true;
            }
            _ => {
                tracing::warn!("ignoring non-binary-stream change applied to a binary stream");
            }
        }
    }

    /// Whether `start` has been observed yet.
    pub fn is_started(&self) -> bool {
        self.upload.meta.is_some()
    }

    /// Whether `end` has been observed.
    pub fn is_finished(&self) -> bool {
        self.upload.ended
    }

    /// The declared upload metadata, once `start` has been applied.
    pub fn meta(&self) -> Option<&BinaryStreamMeta> {
        self.upload.meta.as_ref()
    }

    /// Assemble the chunks received so far.
    ///
    /// Returns `None` if `start` has not yet been applied. If `end` has not
    /// yet arrived, returns `None` unless `allow_unfinished` is set, in
    /// which case the partial chunk set is returned anyway.
    pub fn get_binary_chunks(&self, allow_unfinished: bool) -> Option<BinaryChunks> {
        let meta = self.upload.meta.as_ref()?;
        if !self.upload.ended && !allow_unfinished {
            return None;
        }
        Some(BinaryChunks {
            chunks: self.upload.chunks.clone(),
            mime_type: meta.mime_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::ids::AgentId;

    fn ctx(session: SessionId, made_at: u64) -> ApplyContext {
        ApplyContext {
            session,
            made_at,
            tx_index: 0,
            change_seq: 0,
        }
    }

    fn session() -> SessionId {
        SessionId::new(AgentId::new([9u8; 32], [9u8; 32]), 0)
    }

    #[test]
    fn not_started_returns_none() {
        let upload = BinaryStreamContent::new();
        assert_eq!(upload.get_binary_chunks(true), None);
    }

    #[test]
    fn unfinished_upload_withheld_unless_explicitly_allowed() {
        let mut upload = BinaryStreamContent::new();
        let s = session();
        upload.apply(
            &Change::Start {
                meta: BinaryStreamMeta {
                    mime_type: "image/png".into(),
                    total_size_bytes: Some(4),
                    file_name: None,
                },
            },
            ctx(s, 1),
        );
        upload.apply(
            &Change::Chunk {
                bytes: vec![1, 2, 3, 4],
            },
            ctx(s, 2),
        );
        assert_eq!(upload.get_binary_chunks(false), None);
        let partial = upload.get_binary_chunks(true).unwrap();
        assert_eq!(partial.chunks, vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn finished_upload_assembles_chunks_in_order() {
        let mut upload = BinaryStreamContent::new();
        let s = session();
        upload.apply(
            &Change::Start {
                meta: BinaryStreamMeta {
                    mime_type: "application/octet-stream".into(),
                    total_size_bytes: None,
                    file_name: Some("blob.bin".into()),
                },
            },
            ctx(s, 1),
        );
        upload.apply(&Change::Chunk { bytes: vec![1] }, ctx(s, 2));
        upload.apply(&Change::Chunk { bytes: vec![2] }, ctx(s, 3));
        upload.apply(&Change::End, ctx(s, 4));

        let chunks = upload.get_binary_chunks(false).unwrap();
        assert_eq!(chunks.chunks, vec![vec![1], vec![2]]);
        assert_eq!(chunks.mime_type, "application/octet-stream");
        assert!(upload.is_finished());
    }

    #[test]
    fn chunk_from_a_different_session_is_ignored() {
        let mut upload = BinaryStreamContent::new();
        let opener = session();
        let intruder = SessionId::new(AgentId::new([10u8; 32], [10u8; 32]), 0);
        upload.apply(
            &Change::Start {
                meta: BinaryStreamMeta {
                    mime_type: "text/plain".into(),
                    total_size_bytes: None,
                    file_name: None,
                },
            },
            ctx(opener, 1),
        );
        upload.apply(&Change::Chunk { bytes: vec![9] }, ctx(intruder, 2));
        assert_eq!(upload.get_binary_chunks(true).unwrap().chunks, Vec::<Vec<u8>>::new());
    }
}

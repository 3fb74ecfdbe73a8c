//! `SessionLog`: the append-only signed chain for one (covalue, session)
//! pair. Purely local — it does not know about peers; sync pushes
//! entries through [`SessionLog::try_add`] exactly as a local writer would.

use crate::transaction::Transaction;
use covalue_core::ids::SessionId;
use covalue_core::CovalueError;
use covalue_crypto::{sign_bytes, verify_bytes, AgentSecret, Signature};
use serde::{Deserialize, Serialize};

/// One appended `(tx, after-hash, signature)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// The transaction itself.
    pub tx: Transaction,
    /// Rolling hash of all transactions in this session up to and
    /// including `tx`: `H(previous-after-hash ‖ canonical(tx))`.
    pub after_hash: [u8; 32],
    /// Signature over `after_hash` by the session's agent's signing key.
    pub signature: Signature,
}

/// Outcome of a successful [`SessionLog::try_add`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was new and has been appended.
    Appended,
    /// The exact same `(tx, after_hash, signature)` triple was already
    /// present at this index — replaying it is idempotent, not an error.
    Duplicate,
}

/// The append-only log for one (covalue, session) pair.
#[derive(Debug, Clone)]
pub struct SessionLog {
    session: SessionId,
    entries: Vec<SessionEntry>,
}

impl SessionLog {
    /// Start an empty log for `session`.
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            entries: Vec::new(),
        }
    }

    /// The session this log belongs to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Number of entries currently in the log.
    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Whether the log has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries themselves, in append order.
    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    /// The rolling hash after the last entry, or the zero hash if empty —
    /// the genesis value every session's first `after_hash` chains from.
    pub fn last_hash(&self) -> [u8; 32] {
        self.entries.last().map(|e| e.after_hash).unwrap_or([0u8; 32])
    }

    /// The signature over [`Self::last_hash`], if any entries exist.
    pub fn last_signature(&self) -> Option<Signature> {
        self.entries.last().map(|e| e.signature)
    }

    /// Entries from `from_index` onward — used by sync to answer "after N".
    pub fn slice(&self, from_index: u64) -> &[SessionEntry] {
        let start = (from_index as usize).min(self.entries.len());
        &self.entries[start..]
    }

    /// Compute the next rolling hash for `tx` given the current tail.
    fn next_after_hash(&self, tx: &Transaction) -> Result<[u8; 32], CovalueError> {
        let canonical = covalue_crypto::canonical_bytes(tx)?;
        let mut material = Vec::with_capacity(32 + canonical.len());
        material.extend_from_slice(&self.last_hash());
        material.extend_from_slice(&canonical);
        Ok(covalue_crypto::hash_bytes(&material))
    }

    /// Sign and append `tx` as this session's own agent, returning the new
    /// `(after_hash, signature)` pair. Used when this node owns the session.
    ///
    /// `madeAt` is non-decreasing within a session (Invariant 5): if `tx`'s
    /// timestamp would regress behind the previous entry's, it is clamped
    /// to `prev + 1` before signing.
    #[tracing::instrument(skip(self, signer), fields(session = %self.session))]
    pub fn sign(
        &mut self,
        tx: Transaction,
        signer: &AgentSecret,
    ) -> Result<([u8; 32], Signature), CovalueError> {
        let tx = self.clamp_made_at(tx);
        let after_hash = self.next_after_hash(&tx)?;
        let signature = sign_bytes(signer, &after_hash);
        self.entries.push(SessionEntry {
            tx,
            after_hash,
            signature,
        });
        Ok((after_hash, signature))
    }

    /// Clamp `tx`'s `madeAt` to `prev + 1` if it would otherwise regress
    /// behind the log's current tail.
    fn clamp_made_at(&self, tx: Transaction) -> Transaction {
        let Some(prev) = self.entries.last().map(|e| e.tx.made_at()) else {
            return tx;
        };
        if tx.made_at() > prev {
            return tx;
        }
        let clamped = prev + 1;
        tracing::debug!(session = %self.session, requested = tx.made_at(), clamped, "clamped regressing madeAt");
        match tx {
            Transaction::Trusting { changes, .. } => Transaction::Trusting {
                changes,
                made_at: clamped,
            },
            Transaction::Private { ciphertext, key_id, .. } => Transaction::Private {
                ciphertext,
                key_id,
                made_at: clamped,
            },
        }
    }

    /// Verify and append a `(tx, after_hash, signature)` triple received
    /// from a peer or a storage adapter.
    ///
    /// Recomputes the rolling hash from the current tail and verifies the
    /// signature under this session's agent's signing key (Invariant 2).
    /// Replaying an already-applied triple at the current tail index
    /// returns [`AppendOutcome::Duplicate`] rather than an error —
    /// verification is deterministic and idempotent.
    #[tracing::instrument(skip(self, tx, signature), fields(session = %self.session))]
    pub fn try_add(
        &mut self,
        tx: Transaction,
        after_hash: [u8; 32],
        signature: Signature,
    ) -> Result<AppendOutcome, CovalueError> {
        if let Some(last) = self.entries.last() {
            if last.after_hash == after_hash && last.signature == signature {
                return Ok(AppendOutcome::Duplicate);
            }
        }

        let expected_hash = self.next_after_hash(&tx)?;
        if expected_hash != after_hash {
            tracing::warn!(session = %self.session, "rejected entry: hash chain mismatch");
            return Err(CovalueError::InvalidHashChain {
                session: self.session.to_string(),
                index: self.len(),
            });
        }

        if !verify_bytes(&signature, &after_hash, &self.session.agent) {
            tracing::warn!(session = %self.session, "rejected entry: signature does not verify");
            return Err(CovalueError::InvalidSignature {
                session: self.session.to_string(),
            });
        }

        self.entries.push(SessionEntry {
            tx,
            after_hash,
            signature,
        });
        Ok(AppendOutcome::Appended)
    }
}

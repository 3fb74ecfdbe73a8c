//! `Transaction`: one unit of mutation, trusting or private.

use covalue_core::ids::KeyId;
use serde::{Deserialize, Serialize};

/// One signed unit of mutation within a session.
///
/// `Trusting` carries plaintext changes and is used when the ruleset is
/// `unsafeAllowAll`, or for broadcasting group/admin state that every
/// member must be able to read without holding a current key. `Private`
/// carries ciphertext plus the id of the key it was encrypted under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "privacy", rename_all = "camelCase")]
pub enum Transaction {
    /// Plaintext list of changes (still serialized, but never encrypted).
    Trusting {
        /// The raw CRDT changes, encoded as opaque JSON (the schema is
        /// owned by `covalue-content`, not by the log).
        changes: Vec<serde_json::Value>,
        /// Milliseconds since the Unix epoch; non-decreasing within a session.
        made_at: u64,
    },
    /// Ciphertext of a list of changes, encrypted under `key_id`.
    Private {
        /// `encrypt_for_transaction` output.
        #[serde(with = "serde_bytes")]
        ciphertext: Vec<u8>,
        /// The read key this ciphertext was encrypted under.
        key_id: KeyId,
        /// Milliseconds since the Unix epoch; non-decreasing within a session.
        made_at: u64,
    },
}

impl Transaction {
    /// This transaction's `madeAt` timestamp, regardless of variant.
    pub fn made_at(&self) -> u64 {
        match self {
            Transaction::Trusting { made_at, .. } => *made_at,
            Transaction::Private { made_at, .. } => *made_at,
        }
    }
}

//! The immutable covalue header.

use covalue_core::ids::CoId;
use covalue_core::CovalueError;
use serde::{Deserialize, Serialize};

/// Which CRDT shape a covalue's current content materializes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CovalueType {
    /// Last-writer-wins map.
    Comap,
    /// RGA-style ordered list.
    Colist,
    /// Per-session append-only multiset.
    Costream,
    /// A stream specialized for chunked binary payloads.
    BinaryCostream,
}

/// The rule governing who may write to a covalue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Ruleset {
    /// This covalue *is* a group: its own content is the role/key/invite map.
    Group,
    /// Writers must hold at least `writer` role in the referenced group.
    OwnedByGroup {
        /// The group covalue that governs this one.
        group: CoId,
    },
    /// Any agent may write (used for local-only or test scenarios).
    UnsafeAllowAll,
    /// This covalue is an account: its content lists the agent ids that
    /// speak for it.
    Account,
}

/// The immutable, content-addressed header of a covalue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// The CRDT shape this covalue materializes into.
    pub covalue_type: CovalueType,
    /// Who may write to this covalue.
    pub ruleset: Ruleset,
    /// Opaque, application-defined metadata.
    pub meta: Option<serde_json::Value>,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Random salt ensuring two headers with otherwise-identical fields
    /// still hash to different ids.
    pub uniqueness_salt: [u8; 16],
}

impl Header {
    /// `co_z<hash-of-header>` — this header's id.
    pub fn id(&self) -> Result<CoId, CovalueError> {
        let hash = covalue_crypto::secure_hash(self)?;
        Ok(CoId::from_hash(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(salt: u8) -> Header {
        Header {
            covalue_type: CovalueType::Comap,
            ruleset: Ruleset::UnsafeAllowAll,
            meta: None,
            created_at: 1000,
            uniqueness_salt: [salt; 16],
        }
    }

    #[test]
    fn id_is_hash_of_canonical_header() {
        let header = sample_header(1);
        let id = header.id().unwrap();
        let expected = covalue_crypto::secure_hash(&header).unwrap();
        assert_eq!(id, CoId::from_hash(expected));
    }

    #[test]
    fn different_salts_yield_different_ids() {
        let a = sample_header(1).id().unwrap();
        let b = sample_header(2).id().unwrap();
        assert_ne!(a, b);
    }
}

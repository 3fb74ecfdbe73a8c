//! Typed, self-describing string identifiers.
//!
//! Every identifier in the engine round-trips through a short, prefixed
//! string so that binary material of different kinds (a hash, a public key,
//! a signature) can never be confused for one another even after they've
//! been serialized into a JSON record. Short binary material uses base58
//! (no padding, no visually-ambiguous characters); longer ciphertexts use
//! base64url (see `covalue-crypto::envelope` for `sealed_U...`).

use crate::error::CovalueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn encode_b58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

fn decode_b58(s: &str) -> Result<Vec<u8>, CovalueError> {
    bs58::decode(s)
        .into_vec()
        .map_err(|e| CovalueError::invalid(format!("bad base58: {e}")))
}

fn split_prefix<'a>(s: &'a str, prefix: &str) -> Result<&'a str, CovalueError> {
    s.strip_prefix(prefix)
        .ok_or_else(|| CovalueError::invalid(format!("expected `{prefix}` prefix, got {s}")))
}

/// `co_z<base58 blake3(canonical(header))>` — the id of a covalue.
///
/// Per Invariant 1, a covalue's id is entirely determined by the hash of its
/// (immutable) header, so `CoId` carries only the hash bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CoId(pub [u8; 32]);

impl CoId {
    /// Build a `CoId` directly from a 32-byte header hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }
}

impl fmt::Display for CoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "co_z{}", encode_b58(&self.0))
    }
}

impl FromStr for CoId {
    type Err = CovalueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = split_prefix(s, "co_z")?;
        let bytes = decode_b58(rest)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CovalueError::invalid("co_z id is not 32 bytes"))?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for CoId {
    type Error = CovalueError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CoId> for String {
    fn from(value: CoId) -> Self {
        value.to_string()
    }
}

/// `key_z<base58 shortHash(pubMaterial)>` — the id of a symmetric read key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(pub [u8; 16]);

impl KeyId {
    /// Build a `KeyId` from a 16-byte short hash.
    pub fn from_short_hash(hash: [u8; 16]) -> Self {
        Self(hash)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key_z{}", encode_b58(&self.0))
    }
}

impl FromStr for KeyId {
    type Err = CovalueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = split_prefix(s, "key_z")?;
        let bytes = decode_b58(rest)?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| CovalueError::invalid("key_z id is not 16 bytes"))?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for KeyId {
    type Error = CovalueError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyId> for String {
    fn from(value: KeyId) -> Self {
        value.to_string()
    }
}

/// `sealer_z<...>/signer_z<...>` — the composite public identity of an agent.
///
/// An agent is a keypair pair: a signing identity (Ed25519) used to author
/// session-log transactions, and a sealing identity (X25519) used as the
/// target of `seal`/key-wrapping. `AgentId` bundles both public halves; the
/// matching `AgentSecret` (private halves) lives in `covalue-crypto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId {
    /// X25519 public key used for `seal`/`unseal` and key wrapping.
    pub sealer: [u8; 32],
    /// Ed25519 public key used for transaction signatures.
    pub signer: [u8; 32],
}

impl AgentId {
    /// Build an `AgentId` from its two public key halves.
    pub fn new(sealer: [u8; 32], signer: [u8; 32]) -> Self {
        Self { sealer, signer }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sealer_z{}/signer_z{}",
            encode_b58(&self.sealer),
            encode_b58(&self.signer)
        )
    }
}

impl FromStr for AgentId {
    type Err = CovalueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sealer_part, signer_part) = s
            .split_once('/')
            .ok_or_else(|| CovalueError::invalid("agent id missing '/' separator"))?;
        let sealer_b58 = split_prefix(sealer_part, "sealer_z")?;
        let signer_b58 = split_prefix(signer_part, "signer_z")?;
        let sealer: [u8; 32] = decode_b58(sealer_b58)?
            .try_into()
            .map_err(|_| CovalueError::invalid("sealer_z is not 32 bytes"))?;
        let signer: [u8; 32] = decode_b58(signer_b58)?
            .try_into()
            .map_err(|_| CovalueError::invalid("signer_z is not 32 bytes"))?;
        Ok(Self { sealer, signer })
    }
}

impl TryFrom<String> for AgentId {
    type Error = CovalueError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        value.to_string()
    }
}

/// `<agentID>_session_<nonce>` — one linear writing context.
///
/// An agent may hold many concurrent sessions (one per device/tab); the
/// nonce disambiguates them. Concurrent writes by the same account in
/// different sessions are allowed and merged deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId {
    /// The agent that owns this session.
    pub agent: AgentId,
    /// Disambiguates concurrent sessions of the same agent.
    pub nonce: u64,
}

impl SessionId {
    /// Build a `SessionId` for `agent` with the given nonce.
    pub fn new(agent: AgentId, nonce: u64) -> Self {
        Self { agent, nonce }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_session_{}", self.agent, self.nonce)
    }
}

impl FromStr for SessionId {
    type Err = CovalueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (agent_part, nonce_part) = s
            .rsplit_once("_session_")
            .ok_or_else(|| CovalueError::invalid("session id missing '_session_' marker"))?;
        let agent: AgentId = agent_part.parse()?;
        let nonce: u64 = nonce_part
            .parse()
            .map_err(|_| CovalueError::invalid("session nonce is not a u64"))?;
        Ok(Self { agent, nonce })
    }
}

impl TryFrom<String> for SessionId {
    type Error = CovalueError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coid_round_trips_through_display_and_parse() {
        let id = CoId::from_hash([7u8; 32]);
        let text = id.to_string();
        assert!(text.starts_with("co_z"));
        assert_eq!(text.parse::<CoId>().unwrap(), id);
    }

    #[test]
    fn keyid_round_trips() {
        let id = KeyId::from_short_hash([3u8; 16]);
        assert_eq!(id.to_string().parse::<KeyId>().unwrap(), id);
    }

    #[test]
    fn agent_id_round_trips() {
        let id = AgentId::new([1u8; 32], [2u8; 32]);
        let text = id.to_string();
        assert!(text.contains("sealer_z"));
        assert!(text.contains("signer_z"));
        assert_eq!(text.parse::<AgentId>().unwrap(), id);
    }

    #[test]
    fn session_id_round_trips() {
        let agent = AgentId::new([9u8; 32], [8u8; 32]);
        let sid = SessionId::new(agent, 42);
        let text = sid.to_string();
        assert!(text.ends_with("_session_42"));
        assert_eq!(text.parse::<SessionId>().unwrap(), sid);
    }

    #[test]
    fn coid_rejects_wrong_prefix() {
        assert!("wrong_z123".parse::<CoId>().is_err());
    }
}

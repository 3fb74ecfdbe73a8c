//! Ed25519 signatures over canonicalized payloads.

use crate::agent::AgentSecret;
use crate::canonical::canonical_bytes;
use covalue_core::{AgentId, CovalueError};
use ed25519_dalek::{Signature as DalekSignature, Signer, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `signature_z<base58>` — an Ed25519 signature over a canonicalized payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(pub [u8; 64]);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signature_z{}", bs58::encode(&self.0).into_string())
    }
}

impl FromStr for Signature {
    type Err = CovalueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("signature_z")
            .ok_or_else(|| CovalueError::invalid("signature missing `signature_z` prefix"))?;
        let bytes = bs58::decode(rest)
            .into_vec()
            .map_err(|e| CovalueError::invalid(format!("bad base58 signature: {e}")))?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CovalueError::invalid("signature is not 64 bytes"))?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for Signature {
    type Error = CovalueError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(value: Signature) -> Self {
        value.to_string()
    }
}

/// Sign the canonical encoding of `payload` with `signer`.
pub fn sign<T: Serialize>(signer: &AgentSecret, payload: &T) -> Result<Signature, CovalueError> {
    let bytes = canonical_bytes(payload)?;
    let sig: DalekSignature = signer.signing.sign(&bytes);
    Ok(Signature(sig.to_bytes()))
}

/// Verify `signature` over the canonical encoding of `payload` under `signer_id`.
///
/// Returns `false` rather than an error on any failure (bad signature,
/// malformed key) — signature verification is a predicate, not a fallible
/// operation.
pub fn verify<T: Serialize>(signature: &Signature, payload: &T, signer_id: &AgentId) -> bool {
    let Ok(bytes) = canonical_bytes(payload) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&signer_id.signer) else {
        return false;
    };
    let dalek_sig = DalekSignature::from_bytes(&signature.0);
    verifying_key.verify(&bytes, &dalek_sig).is_ok()
}

/// Verify a signature over raw bytes (the session log's rolling hash is
/// already a fixed-size digest, not a value to canonicalize again).
pub fn verify_bytes(signature: &Signature, bytes: &[u8], signer_id: &AgentId) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&signer_id.signer) else {
        return false;
    };
    let dalek_sig = DalekSignature::from_bytes(&signature.0);
    verifying_key.verify(bytes, &dalek_sig).is_ok()
}

/// Sign raw bytes directly (counterpart to [`verify_bytes`]).
pub fn sign_bytes(signer: &AgentSecret, bytes: &[u8]) -> Signature {
    let sig: DalekSignature = signer.signing.sign(bytes);
    Signature(sig.to_bytes())
}

//! `secureHash`/`shortHash`: blake3 over the canonical encoding.

use crate::canonical::canonical_bytes;
use covalue_core::CovalueError;
use serde::Serialize;

/// `blake3(canonical(value))`, the full 32-byte digest.
pub fn secure_hash<T: Serialize>(value: &T) -> Result<[u8; 32], CovalueError> {
    let bytes = canonical_bytes(value)?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

/// The first 16 bytes of [`secure_hash`], used for `KeyId`.
pub fn short_hash<T: Serialize>(value: &T) -> Result<[u8; 16], CovalueError> {
    let full = secure_hash(value)?;
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[..16]);
    Ok(out)
}

/// Hash raw bytes directly, for the session-log rolling hash
/// (`H(previous-after-hash ‖ canonical(tx))`, see Invariant 2) where the
/// input is already a concatenation of byte strings rather than a single
/// serializable value.
pub fn hash_bytes(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

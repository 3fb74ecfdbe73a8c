//! `encryptKeySecret`/`decryptKeySecret`: wrapping one read key under
//! another, for a group's previous-key chain (`<oldKeyID>
//! _wrapped_in_<newKeyID> = encryptKeySecret(old, new)`), so that a member
//! holding only the current key can unwrap every predecessor.

use crate::key_secret::KeySecret;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use covalue_core::{ids::KeyId, CovalueError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A key secret wrapped under another key secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WrappedKey(pub Vec<u8>);

impl fmt::Display for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        write!(f, "wrapped_Z{}", URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl FromStr for WrappedKey {
    type Err = CovalueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let rest = s
            .strip_prefix("wrapped_Z")
            .ok_or_else(|| CovalueError::invalid("wrapped key missing `wrapped_Z` prefix"))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(rest)
            .map_err(|e| CovalueError::invalid(format!("bad base64url wrapped key: {e}")))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for WrappedKey {
    type Error = CovalueError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WrappedKey> for String {
    fn from(value: WrappedKey) -> Self {
        value.to_string()
    }
}

/// The nonce is derived from the two (public) key ids involved, not from
/// the plaintext key material — a member unwrapping a predecessor key
/// knows its id from the group record's field name
/// (`<oldKeyID>_wrapped_in_<newKeyID>`) long before it knows the key itself.
fn wrap_nonce(old_key_id: KeyId, encrypting_id: KeyId) -> XNonce {
    let mut material = Vec::with_capacity(32);
    material.extend_from_slice(&old_key_id.0);
    material.extend_from_slice(&encrypting_id.0);
    let digest = blake3::hash(&material);
    *XNonce::from_slice(&digest.as_bytes()[..24])
}

/// Wrap `to_encrypt` so that only a holder of `encrypting` can recover it.
pub fn encrypt_key_secret(
    to_encrypt: &KeySecret,
    encrypting: &KeySecret,
) -> Result<WrappedKey, CovalueError> {
    let nonce = wrap_nonce(to_encrypt.id(), encrypting.id());
    let cipher = XChaCha20Poly1305::new((&encrypting.0).into());
    let ciphertext = cipher
        .encrypt(&nonce, Payload::from(to_encrypt.0.as_slice()))
        .map_err(|_| CovalueError::internal("encrypt_key_secret: AEAD encryption failed"))?;
    Ok(WrappedKey(ciphertext))
}

/// Unwrap a key previously wrapped with [`encrypt_key_secret`], identified
/// by its public `old_key_id`, using `encrypting` to recover it.
///
/// Returns `None` on MAC failure, per the same sentinel-not-exception
/// policy as [`crate::transaction::decrypt_for_transaction`].
pub fn decrypt_key_secret(
    wrapped: &WrappedKey,
    old_key_id: KeyId,
    encrypting: &KeySecret,
) -> Option<KeySecret> {
    let nonce = wrap_nonce(old_key_id, encrypting.id());
    let cipher = XChaCha20Poly1305::new((&encrypting.0).into());
    let plaintext = cipher.decrypt(&nonce, Payload::from(wrapped.0.as_slice())).ok()?;
    let arr: [u8; 32] = plaintext.try_into().ok()?;
    Some(KeySecret(arr))
}

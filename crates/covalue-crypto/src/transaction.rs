//! `encryptForTransaction`/`decryptForTransaction`: the AEAD used for
//! private transaction bodies.

use crate::canonical::canonical_bytes;
use crate::key_secret::KeySecret;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use covalue_core::CovalueError;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn nonce_from_material<N: Serialize>(nonce_material: &N) -> Result<XNonce, CovalueError> {
    let bytes = canonical_bytes(nonce_material)?;
    let digest = blake3::hash(&bytes);
    Ok(*XNonce::from_slice(&digest.as_bytes()[..24]))
}

/// Encrypt a transaction's list of changes under `key`.
///
/// `nonce_material` is typically `(session_id, tx_index)` — anything that
/// is unique per transaction within the key's lifetime, so the same
/// plaintext never reuses a nonce under the same key.
pub fn encrypt_for_transaction<T: Serialize, N: Serialize>(
    changes: &T,
    key: &KeySecret,
    nonce_material: &N,
) -> Result<Vec<u8>, CovalueError> {
    let plaintext = canonical_bytes(changes)?;
    let nonce = nonce_from_material(nonce_material)?;
    let cipher = XChaCha20Poly1305::new((&key.0).into());
    cipher
        .encrypt(&nonce, Payload::from(plaintext.as_slice()))
        .map_err(|_| CovalueError::internal("encrypt_for_transaction: AEAD encryption failed"))
}

/// Decrypt a transaction's ciphertext under `key`.
///
/// Returns `None` on MAC failure (wrong key, tampered ciphertext) rather
/// than an error: decryption of attacker-controllable ciphertext must never
/// raise. The caller keeps the transaction in the log and retries once the
/// right key arrives; it never surfaces this as a hard error.
pub fn decrypt_for_transaction<T: DeserializeOwned, N: Serialize>(
    ciphertext: &[u8],
    key: &KeySecret,
    nonce_material: &N,
) -> Result<Option<T>, CovalueError> {
    let nonce = nonce_from_material(nonce_material)?;
    let cipher = XChaCha20Poly1305::new((&key.0).into());
    let Ok(plaintext) = cipher.decrypt(&nonce, Payload::from(ciphertext)) else {
        return Ok(None);
    };
    let value = serde_json::from_slice(&plaintext)
        .map_err(|e| CovalueError::serialization(format!("decrypt_for_transaction: {e}")))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::random::OsRandom;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let key = KeySecret::generate(&OsRandom);
        let changes = vec!["set(foo, bar)".to_string()];
        let nonce_material = ("session-1", 0u64);
        let ct = encrypt_for_transaction(&changes, &key, &nonce_material).unwrap();
        let pt: Option<Vec<String>> =
            decrypt_for_transaction(&ct, &key, &nonce_material).unwrap();
        assert_eq!(pt, Some(changes));
    }

    #[test]
    fn decrypt_with_wrong_key_returns_none() {
        let key = KeySecret::generate(&OsRandom);
        let wrong_key = KeySecret::generate(&OsRandom);
        let changes = vec!["set(foo, bar)".to_string()];
        let nonce_material = ("session-1", 0u64);
        let ct = encrypt_for_transaction(&changes, &key, &nonce_material).unwrap();
        let pt: Option<Vec<String>> =
            decrypt_for_transaction(&ct, &wrong_key, &nonce_material).unwrap();
        assert_eq!(pt, None);
    }
}

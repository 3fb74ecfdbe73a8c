//! `seal`/`unseal`: X25519 ECDH → XChaCha20-Poly1305 AEAD.
//!
//! XChaCha20Poly1305 stands in for XSalsa20-Poly1305 here: its 24-byte
//! nonce is an exact fit for deriving the nonce as the first 24 bytes of
//! `blake3(canonical(nonceMaterial))`, and it's the AEAD already available
//! in this dependency stack (see DESIGN.md for the substitution note).

use crate::agent::AgentSecret;
use crate::canonical::canonical_bytes;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use covalue_core::{AgentId, CovalueError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// `sealed_U<base64url>` — ciphertext produced by [`seal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sealed(pub Vec<u8>);

impl fmt::Display for Sealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        write!(f, "sealed_U{}", URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl FromStr for Sealed {
    type Err = CovalueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let rest = s
            .strip_prefix("sealed_U")
            .ok_or_else(|| CovalueError::invalid("sealed value missing `sealed_U` prefix"))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(rest)
            .map_err(|e| CovalueError::invalid(format!("bad base64url sealed value: {e}")))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Sealed {
    type Error = CovalueError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sealed> for String {
    fn from(value: Sealed) -> Self {
        value.to_string()
    }
}

fn nonce_from_material<N: Serialize>(nonce_material: &N) -> Result<XNonce, CovalueError> {
    let bytes = canonical_bytes(nonce_material)?;
    let digest = blake3::hash(&bytes);
    Ok(*XNonce::from_slice(&digest.as_bytes()[..24]))
}

fn shared_key(from: &AgentSecret, to: &AgentId) -> XChaCha20Poly1305 {
    let their_public = x25519_dalek::PublicKey::from(to.sealer);
    let shared = from.sealing.diffie_hellman(&their_public);
    let derived = blake3::derive_key("covalue-seal-v1", shared.as_bytes());
    XChaCha20Poly1305::new((&derived).into())
}

/// Seal `message` from `from` to `to`, using `nonce_material` to derive a
/// deterministic nonce both parties can reconstruct.
pub fn seal<T: Serialize, N: Serialize>(
    message: &T,
    from: &AgentSecret,
    to: &AgentId,
    nonce_material: &N,
) -> Result<Sealed, CovalueError> {
    let plaintext = canonical_bytes(message)?;
    let nonce = nonce_from_material(nonce_material)?;
    let cipher = shared_key(from, to);
    let ciphertext = cipher
        .encrypt(&nonce, Payload::from(plaintext.as_slice()))
        .map_err(|_| CovalueError::internal("seal: AEAD encryption failed"))?;
    Ok(Sealed(ciphertext))
}

/// Unseal a value addressed to `to_secret` that was sealed by `from`.
///
/// Fails with [`CovalueError::WrongTag`] on MAC failure — a forged or
/// tampered `Sealed` value, or the wrong recipient keypair, is a fault the
/// caller must be able to see and act on, not a silent `None`. Contrast
/// `covalue_crypto::transaction::decrypt_for_transaction`, whose failure
/// mode is deliberately silent because an undecryptable transaction is
/// routine (no key yet) rather than exceptional.
pub fn unseal<T: DeserializeOwned, N: Serialize>(
    sealed: &Sealed,
    to_secret: &AgentSecret,
    from: &AgentId,
    nonce_material: &N,
) -> Result<T, CovalueError> {
    let nonce = nonce_from_material(nonce_material)?;
    let their_public = x25519_dalek::PublicKey::from(from.sealer);
    let shared = to_secret.sealing.diffie_hellman(&their_public);
    let derived = blake3::derive_key("covalue-seal-v1", shared.as_bytes());
    let cipher = XChaCha20Poly1305::new((&derived).into());
    let plaintext = cipher
        .decrypt(&nonce, Payload::from(sealed.0.as_slice()))
        .map_err(|_| CovalueError::wrong_tag("unseal: AEAD tag did not verify"))?;
    let value = serde_json::from_slice(&plaintext)
        .map_err(|e| CovalueError::serialization(format!("unseal: {e}")))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::random::OsRandom;

    #[test]
    fn seal_then_unseal_round_trips() {
        let sender = AgentSecret::generate(&OsRandom);
        let receiver = AgentSecret::generate(&OsRandom);
        let nonce_material = "ctx-1";
        let sealed = seal(&"hello", &sender, &receiver.id(), &nonce_material).unwrap();
        let opened: String = unseal(&sealed, &receiver, &sender.id(), &nonce_material).unwrap();
        assert_eq!(opened, "hello");
    }

    #[test]
    fn unseal_with_wrong_receiver_raises_wrong_tag() {
        let sender = AgentSecret::generate(&OsRandom);
        let receiver = AgentSecret::generate(&OsRandom);
        let impostor = AgentSecret::generate(&OsRandom);
        let nonce_material = "ctx-1";
        let sealed = seal(&"hello", &sender, &receiver.id(), &nonce_material).unwrap();
        let result: Result<String, CovalueError> =
            unseal(&sealed, &impostor, &sender.id(), &nonce_material);
        assert!(matches!(result, Err(CovalueError::WrongTag { .. })));
    }

    #[test]
    fn unseal_of_tampered_ciphertext_raises_wrong_tag() {
        let sender = AgentSecret::generate(&OsRandom);
        let receiver = AgentSecret::generate(&OsRandom);
        let nonce_material = "ctx-1";
        let mut sealed = seal(&"hello", &sender, &receiver.id(), &nonce_material).unwrap();
        let last = sealed.0.len() - 1;
        sealed.0[last] ^= 0xff;
        let result: Result<String, CovalueError> =
            unseal(&sealed, &receiver, &sender.id(), &nonce_material);
        assert!(matches!(result, Err(CovalueError::WrongTag { .. })));
    }
}

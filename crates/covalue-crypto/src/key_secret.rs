//! `KeySecret`: a 32-byte symmetric read key, plus its id derivation.

use covalue_core::{ids::KeyId, SecureRandom};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A symmetric key under which private transactions are encrypted.
///
/// Rotated on permission changes; older keys are wrapped under newer
/// ones (see [`crate::key_wrap`]) so a current member can derive all
/// predecessors without the key ever appearing in the clear on the wire.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeySecret(pub [u8; 32]);

impl KeySecret {
    /// Generate a fresh key secret using `rng`.
    pub fn generate(rng: &dyn SecureRandom) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes);
        Self(bytes)
    }

    /// `key_z<shortHash(pubMaterial)>` — the id derived from this key's bytes.
    ///
    /// The "public material" hashed to form the id is the key bytes
    /// themselves; an observer of the id alone cannot recover the key
    /// (blake3 is one-way), but two nodes holding the same key agree on
    /// its id without any further negotiation.
    pub fn id(&self) -> KeyId {
        let full = blake3::hash(&self.0);
        let mut short = [0u8; 16];
        short.copy_from_slice(&full.as_bytes()[..16]);
        KeyId::from_short_hash(short)
    }
}

impl std::fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySecret").field("id", &self.id()).finish()
    }
}

impl PartialEq for KeySecret {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for KeySecret {}

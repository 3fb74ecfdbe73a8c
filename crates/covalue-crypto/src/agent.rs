//! Agent keypairs: the private halves behind an [`covalue_core::AgentId`].

use covalue_core::{AgentId, SecureRandom};
use ed25519_dalek::SigningKey;
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

/// An agent's private signing and sealing key material.
///
/// Bundles both private halves (Ed25519 signing key, X25519 static secret);
/// the matching [`AgentId`] bundles both public halves.
#[derive(Clone)]
pub struct AgentSecret {
    pub(crate) signing: SigningKey,
    pub(crate) sealing: StaticSecret,
}

impl AgentSecret {
    /// Generate a fresh agent secret using `rng`.
    pub fn generate(rng: &dyn SecureRandom) -> Self {
        let mut signing_bytes = [0u8; 32];
        rng.fill(&mut signing_bytes);
        let mut sealing_bytes = [0u8; 32];
        rng.fill(&mut sealing_bytes);
        let secret = Self {
            signing: SigningKey::from_bytes(&signing_bytes),
            sealing: StaticSecret::from(sealing_bytes),
        };
        signing_bytes.zeroize();
        sealing_bytes.zeroize();
        secret
    }

    /// Rebuild an `AgentSecret` from raw key bytes (used by test fixtures
    /// and by account-restore flows that load credentials from storage).
    pub fn from_bytes(signing: [u8; 32], sealing: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&signing),
            sealing: StaticSecret::from(sealing),
        }
    }

    /// The public [`AgentId`] this secret speaks for.
    pub fn id(&self) -> AgentId {
        let sealer_pub = x25519_dalek::PublicKey::from(&self.sealing);
        AgentId::new(sealer_pub.to_bytes(), self.signing.verifying_key().to_bytes())
    }

    /// The raw `(signing, sealing)` key bytes, for persisting credentials or
    /// encoding an invite link. The inverse of [`Self::from_bytes`].
    pub fn to_bytes(&self) -> ([u8; 32], [u8; 32]) {
        (self.signing.to_bytes(), self.sealing.to_bytes())
    }
}

impl std::fmt::Debug for AgentSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSecret").field("id", &self.id()).finish()
    }
}

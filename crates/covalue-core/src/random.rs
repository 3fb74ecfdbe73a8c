//! Randomness as an injected effect, mirroring [`crate::clock::Clock`].

/// Source of cryptographically secure random bytes.
pub trait SecureRandom: Send + Sync + std::fmt::Debug {
    /// Fill `buf` with random bytes.
    fn fill(&self, buf: &mut [u8]);
}

/// Production randomness backed by the OS CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        use rand::RngCore;
        rand::rngs::OsRng.fill_bytes(buf);
    }
}

//! # Covalue Crypto
//!
//! Cryptographic primitives behind the covalue engine: canonical encoding,
//! hashing, Ed25519 signatures, X25519 sealing, and the two AEAD
//! constructions used for private transactions and read-key wrapping.
//! Every algorithm here is fixed and versioned by its id prefix
//! (`signature_z`, `sealed_U`, `key_z`, ...) so a future scheme upgrade
//! multiplexes on the prefix rather than breaking existing data.

#![forbid(unsafe_code)]

pub mod agent;
pub mod canonical;
pub mod hash;
pub mod key_secret;
pub mod key_wrap;
pub mod sealing;
pub mod signing;
pub mod transaction;

pub use agent::AgentSecret;
pub use canonical::canonical_bytes;
pub use hash::{hash_bytes, secure_hash, short_hash};
pub use key_secret::KeySecret;
pub use key_wrap::{decrypt_key_secret, encrypt_key_secret, WrappedKey};
pub use sealing::{seal, unseal, Sealed};
pub use signing::{sign, sign_bytes, verify, verify_bytes, Signature};
pub use transaction::{decrypt_for_transaction, encrypt_for_transaction};

//! Unified error type for the covalue engine.
//!
//! One enum covers every caller-visible fault across crates, following the
//! same "single, simple error type" shape the wider codebase uses elsewhere.
//! Most decryption failures still bypass this type: a `Private` transaction
//! that won't decrypt under its claimed key (see `covalue-crypto::
//! decrypt_for_transaction`) returns `Option`, since missing the key is a
//! routine, retried condition during materialization. `unseal`, used for
//! one-shot addressed messages rather than bulk transaction content, is the
//! exception — a forged or wrong-key `Sealed` value there is a fault the
//! caller must see, so it raises `CovalueError::WrongTag` instead.

use serde::{Deserialize, Serialize};

/// Errors surfaced by covalue operations.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq, Eq)]
pub enum CovalueError {
    /// A received covalue body did not hash to its claimed id.
    #[error("invalid header: {message}")]
    InvalidHeader {
        /// Description of the mismatch.
        message: String,
    },

    /// A session log entry's signature did not verify.
    #[error("invalid signature in session {session}")]
    InvalidSignature {
        /// The offending session id.
        session: String,
    },

    /// A session log entry's rolling hash did not match the recomputed chain.
    #[error("invalid hash chain in session {session} at index {index}")]
    InvalidHashChain {
        /// The offending session id.
        session: String,
        /// The index within the session log where the chain broke.
        index: u64,
    },

    /// The same entry was already present in the log.
    #[error("duplicate entry in session {session} at index {index}")]
    Duplicate {
        /// The offending session id.
        session: String,
        /// The index at which the duplicate was offered.
        index: u64,
    },

    /// The signer did not hold the required role at the transaction's `madeAt`.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Description of the missing authorization.
        message: String,
    },

    /// A requested covalue could not be obtained from any peer in time.
    #[error("covalue {id} unavailable")]
    Unavailable {
        /// The covalue id that could not be loaded.
        id: String,
    },

    /// `unseal` rejected a ciphertext whose AEAD tag did not verify — a
    /// forged or tampered `Sealed` value, or the wrong recipient keypair.
    #[error("wrong tag: {message}")]
    WrongTag {
        /// Description of what was being unsealed.
        message: String,
    },

    /// A `Private` transaction's ciphertext could not be recovered under
    /// its claimed key — missing key, tampered ciphertext, or a genuine
    /// AEAD tag mismatch. Distinct from `WrongTag`: this path is reached
    /// during content materialization, where the transaction is simply
    /// skipped and retried later rather than surfaced as a hard error.
    #[error("undecryptable transaction: {message}")]
    UndecryptableTransaction {
        /// Description of why the transaction could not be decrypted.
        message: String,
    },

    /// A peer channel ended.
    #[error("channel closed: {message}")]
    ChannelClosed {
        /// Description of why the channel ended.
        message: String,
    },

    /// Input was structurally invalid (bad id prefix, malformed encoding, ...).
    #[error("invalid: {message}")]
    Invalid {
        /// Description of what was invalid.
        message: String,
    },

    /// Encoding/decoding failure not covered by a more specific variant.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An invariant the caller cannot recover from was violated internally.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal fault.
        message: String,
    },
}

impl CovalueError {
    /// Build an [`CovalueError::Invalid`] from anything `Display`-able.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Build a [`CovalueError::Serialization`] from anything `Display`-able.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Build an [`CovalueError::Internal`] from anything `Display`-able.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Build a [`CovalueError::WrongTag`] from anything `Display`-able.
    pub fn wrong_tag(message: impl Into<String>) -> Self {
        Self::WrongTag {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, CovalueError>;

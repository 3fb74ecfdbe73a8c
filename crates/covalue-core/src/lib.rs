//! # Covalue Core — Foundation
//!
//! Single source of truth for the identifier scheme, the unified error type,
//! and the two effect traits (`Clock`, `SecureRandom`) that every other
//! covalue crate is built against instead of calling `SystemTime::now()` or
//! the OS RNG directly.
//!
//! This crate has zero dependencies on any other covalue crate.

#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod ids;
pub mod random;
pub mod role;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CovalueError, Result};
pub use ids::{AgentId, CoId, KeyId, SessionId};
pub use random::SecureRandom;
pub use role::Role;

//! # Covalue Content
//!
//! The covalue header, the CRDT content types it can materialize into
//! (Map/List/Stream/BinaryStream), the deterministic merge order over
//! session logs, and the `Covalue` aggregate that ties a header to its
//! session logs and caches their materialization.
//!
//! This crate depends on `covalue-journal` for the signed per-session log
//! and on `covalue-crypto` for hashing and private-transaction decryption,
//! but knows nothing about groups or sync — `AuthorizationOracle` and
//! `KeyLookup` are the seams `covalue-node` fills in with `covalue-auth`.

#![forbid(unsafe_code)]

pub mod covalue;
pub mod crdt;
pub mod header;
pub mod merge;

pub use covalue::{AuthorizationOracle, Covalue, KnownState, PendingEntry};
pub use crdt::Content;
pub use header::{CovalueType, Header, Ruleset};
pub use merge::{merge_sessions, KeyLookup, MergedChange};
